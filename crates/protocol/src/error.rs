//! Protocol error types
//!
//! Errors that can occur when parsing wire lines or transport frames.

use std::io;

use thiserror::Error;

/// Errors that can occur during protocol operations
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Wire line does not have the expected token layout
    #[error("malformed wire line: {0}")]
    MalformedLine(String),

    /// Sequence token is not a hex number
    #[error("invalid sequence number: {0:?}")]
    InvalidSequence(String),

    /// Timestamp token does not match the wire timestamp format
    #[error("invalid timestamp: {0:?}")]
    InvalidTimestamp(String),

    /// Quoted line is not a valid quoted literal
    #[error("invalid quoting at byte {position}: {reason}")]
    InvalidQuoting { position: usize, reason: &'static str },

    /// Frame exceeds maximum size
    #[error("frame too large: {size} bytes exceeds maximum {max}")]
    FrameTooLarge { size: usize, max: usize },

    /// Transport I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl ProtocolError {
    /// Create a malformed line error
    #[inline]
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedLine(msg.into())
    }

    /// Create an invalid quoting error
    #[inline]
    pub fn quoting(position: usize, reason: &'static str) -> Self {
        Self::InvalidQuoting { position, reason }
    }

    /// Create a frame too large error
    #[inline]
    pub fn too_large(size: usize, max: usize) -> Self {
        Self::FrameTooLarge { size, max }
    }
}
