//! Sink error types

use std::path::PathBuf;

use thiserror::Error;

/// Result type for sink operations
pub type Result<T> = std::result::Result<T, SinkError>;

/// Errors from the persistence sinks
///
/// The collector logs and counts these; none of them stop the loop.
#[derive(Debug, Error)]
pub enum SinkError {
    /// Log file could not be opened or created
    #[error("failed to open {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Active file could not be moved aside at the day boundary
    #[error("failed to rotate {}: {source}", path.display())]
    Rotate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Write or flush failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Line is not a wire line
    #[error("malformed line: {0}")]
    Malformed(String),
}

impl SinkError {
    /// Create a malformed-line error
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::Malformed(msg.into())
    }
}
