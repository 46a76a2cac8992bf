//! Linecast Protocol - Wire types shared by ingesters and collectors
//!
//! This crate provides the text wire format that flows between the serial
//! ingester and the collector:
//! - `LineRecord` - One captured serial line with its timestamps
//! - `WireLine` - Borrowed, parsed view of a wire-format line
//! - `SourceId` - `<hostname>_<portname>` source identification
//! - `quote` / `unquote` - Escaping of the original line bytes
//! - Batch helpers - newline-joined groups of wire lines
//! - Frame codec - length-prefixed transport messages
//!
//! # Wire Format
//!
//! ```text
//! <source_id> <sequence:06X> [x]<YYYY-MM-DDTHH:MM:SS.mmm>Z <quoted-original-line>
//!
//! koerkana1_1 00002A 2015-01-14T13:41:37.903Z 'Hello world'
//! koerkana1_4 00002B x2015-01-14T13:41:38.112Z 'Hello wo'
//! ```
//!
//! The `x` prefix marks a broken line: the newline never arrived, or the
//! device timestamp could not be trusted.

mod batch;
mod error;
mod frame;
mod line;
mod quote;
mod source;

pub use batch::{ACK_PAYLOAD, BatchBuilder, LINE_DELIMITER, split_batch};
pub use error::ProtocolError;
pub use frame::{
    FrameDecoder, LENGTH_PREFIX_SIZE, MAX_FRAME_SIZE, encode_frame, read_frame, write_frame,
};
pub use line::{LineRecord, TIMESTAMP_FORMAT, WireLine, format_timestamp, parse_timestamp};
pub use quote::{quote, unquote};
pub use source::SourceId;

// Re-export bytes for convenience
pub use bytes::{Bytes, BytesMut};

/// Result type for protocol operations
pub type Result<T> = std::result::Result<T, ProtocolError>;

#[cfg(test)]
mod quote_test;
