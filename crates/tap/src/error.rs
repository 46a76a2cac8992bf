//! Error types for the tap crate

use std::io;

use linecast_protocol::ProtocolError;
use thiserror::Error;

/// Errors that can occur on the publish/subscribe side
#[derive(Error, Debug)]
pub enum TapError {
    /// Failed to bind the publish endpoint
    #[error("failed to bind to {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: io::Error,
    },

    /// Failed to reach an upstream publisher
    #[error("connection failed to {address}: {source}")]
    Connect {
        address: String,
        #[source]
        source: io::Error,
    },

    /// I/O error (socket operations)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Framing error on a publish stream
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Maximum subscribers reached
    #[error("maximum subscribers reached ({max})")]
    MaxSubscribers { max: usize },

    /// Subscriber not found
    #[error("subscriber not found: {id}")]
    SubscriberNotFound { id: u64 },

    /// The collector stopped taking upstream lines
    #[error("channel closed")]
    ChannelClosed,
}

/// Result type for tap operations
pub type Result<T> = std::result::Result<T, TapError>;
