//! Source error types

use linecast_protocol::ProtocolError;

/// Result type for source operations
pub type Result<T> = std::result::Result<T, SourceError>;

/// Errors raised by serial and network sources
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// Failed to bind the request listener
    #[error("failed to bind to {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to open the serial device
    #[error("failed to open serial port {port}: {source}")]
    SerialOpen {
        port: String,
        #[source]
        source: serialport::Error,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Framing error on a request connection
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The collector stopped taking inbound batches
    #[error("inbound channel closed")]
    ChannelClosed,
}

impl SourceError {
    /// Whether the error only means the peer went away
    pub fn is_disconnect(&self) -> bool {
        let io = match self {
            Self::Io(e) => e,
            Self::Protocol(ProtocolError::Io(e)) => e,
            _ => return false,
        };
        matches!(
            io.kind(),
            std::io::ErrorKind::UnexpectedEof
                | std::io::ErrorKind::ConnectionReset
                | std::io::ErrorKind::BrokenPipe
        )
    }
}
