//! Batches of wire lines
//!
//! A batch is one transport message holding one or more wire lines joined by
//! `\n`. The receiver is stateless per batch: it never tracks partial
//! batches, so the sender resends whole batches until acknowledged.

use bytes::Bytes;

use crate::line::LineRecord;

/// Delimiter between lines, both on the serial link and inside a batch
pub const LINE_DELIMITER: u8 = b'\n';

/// Reply payload the collector sends for every accepted batch
pub const ACK_PAYLOAD: &[u8] = b"got it";

/// Builder for a newline-joined batch
#[derive(Debug, Default)]
pub struct BatchBuilder {
    buf: String,
    count: usize,
}

impl BatchBuilder {
    /// Create an empty batch builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a builder with preallocated capacity in bytes
    pub fn with_capacity(bytes: usize) -> Self {
        Self {
            buf: String::with_capacity(bytes),
            count: 0,
        }
    }

    /// Append an already-serialized wire line
    pub fn push_line(&mut self, line: &str) {
        self.separate();
        self.buf.push_str(line);
    }

    /// Serialize and append a line record
    pub fn push_record(&mut self, record: &LineRecord) {
        self.separate();
        record.write_wire(&mut self.buf);
    }

    /// Number of lines in the batch
    #[inline]
    pub fn count(&self) -> usize {
        self.count
    }

    /// Whether no line has been added
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Finish the batch
    pub fn finish(self) -> Bytes {
        Bytes::from(self.buf.into_bytes())
    }

    fn separate(&mut self) {
        if self.count > 0 {
            self.buf.push(LINE_DELIMITER as char);
        }
        self.count += 1;
    }
}

/// Split a batch payload into its lines
///
/// Empty segments (e.g. a trailing delimiter) are skipped. The returned
/// slices share the payload's buffer.
pub fn split_batch(payload: &Bytes) -> impl Iterator<Item = Bytes> + '_ {
    let mut start = 0;
    let mut done = false;

    std::iter::from_fn(move || {
        while !done {
            let end = match payload[start..].iter().position(|&b| b == LINE_DELIMITER) {
                Some(pos) => start + pos,
                None => {
                    done = true;
                    payload.len()
                }
            };
            let segment = payload.slice(start..end);
            start = end + 1;
            if !segment.is_empty() {
                return Some(segment);
            }
        }
        None
    })
}
