//! Client error types

use linecast_protocol::ProtocolError;

/// Result type for uplink operations
pub type Result<T> = std::result::Result<T, UplinkError>;

/// Errors from the ingester-to-collector connection
///
/// None of the transport variants are fatal to the ingester: every one of
/// them tears down the current connection and schedules a reconnect. Only
/// replay setup can fail outright.
#[derive(Debug, thiserror::Error)]
pub enum UplinkError {
    /// Connect failed
    #[error("connection failed to {target}: {source}")]
    ConnectionFailed {
        target: String,
        #[source]
        source: std::io::Error,
    },

    /// Connect or write did not finish in time
    #[error("{0} timed out")]
    Timeout(&'static str),

    /// Operation needs a connection and there is none
    #[error("not connected")]
    NotConnected,

    /// Peer closed the connection
    #[error("connection closed by peer")]
    Closed,

    /// Write or read failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Framing error
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Replay file name does not carry a source id
    #[error("cannot derive source id from log file name: {0}")]
    InvalidLogName(String),

    /// Replay file could not be opened
    #[error("failed to open {path}: {source}")]
    ReplayOpen {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
