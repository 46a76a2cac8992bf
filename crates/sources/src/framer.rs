//! Line framer
//!
//! Turns an arbitrary serial byte stream into delimiter-terminated lines.
//! Reads may split a line anywhere, so bytes are accumulated until a `\n`
//! arrives. A device that stops mid-line (crash, garbage, missing newline)
//! would otherwise hold its last bytes forever; [`LineFramer::take_stale`]
//! hands them out once the link has been idle for long enough.

use std::time::Duration;

use bytes::{Bytes, BytesMut};
use chrono::{DateTime, TimeDelta, Utc};
use linecast_protocol::LINE_DELIMITER;

/// Default idle window before a partial line is flushed
pub const DEFAULT_IDLE_FLUSH: Duration = Duration::from_millis(200);

/// Splits a byte stream on `\n`
#[derive(Debug, Default)]
pub struct LineFramer {
    buf: BytesMut,
    last_data: Option<DateTime<Utc>>,
}

impl LineFramer {
    /// Create an empty framer
    pub fn new() -> Self {
        Self::default()
    }

    /// Append received bytes
    ///
    /// `at` is the arrival time, used for idle detection. Empty reads do not
    /// count as activity.
    pub fn put(&mut self, data: &[u8], at: DateTime<Utc>) {
        if data.is_empty() {
            return;
        }
        self.buf.extend_from_slice(data);
        self.last_data = Some(at);
    }

    /// Take the next complete line, without its delimiter
    pub fn next_line(&mut self) -> Option<Bytes> {
        let pos = self.buf.iter().position(|&b| b == LINE_DELIMITER)?;
        let mut line = self.buf.split_to(pos + 1);
        line.truncate(pos);
        Some(line.freeze())
    }

    /// Iterate over the complete lines currently buffered
    ///
    /// The iterator consumes lines as it goes; stopping early leaves the
    /// rest for the next call.
    pub fn lines(&mut self) -> Lines<'_> {
        Lines { framer: self }
    }

    /// Emit the partial line if nothing arrived for longer than `idle`
    ///
    /// Returns the whole accumulator (which then becomes empty). The caller
    /// marks it broken.
    pub fn take_stale(&mut self, now: DateTime<Utc>, idle: Duration) -> Option<Bytes> {
        if self.buf.is_empty() {
            return None;
        }
        let last = self.last_data?;
        let idle = TimeDelta::from_std(idle).unwrap_or(TimeDelta::MAX);
        if now.signed_duration_since(last) > idle {
            Some(self.buf.split().freeze())
        } else {
            None
        }
    }

    /// Take the partial line regardless of idle time
    ///
    /// Used when the device goes away mid-line. The caller marks it broken.
    pub fn take_partial(&mut self) -> Option<Bytes> {
        self.last_data = None;
        if self.buf.is_empty() {
            return None;
        }
        Some(self.buf.split().freeze())
    }

    /// Bytes waiting for a delimiter
    #[inline]
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    /// Drop everything buffered
    pub fn reset(&mut self) {
        self.buf.clear();
        self.last_data = None;
    }
}

/// Iterator returned by [`LineFramer::lines`]
pub struct Lines<'a> {
    framer: &'a mut LineFramer,
}

impl Iterator for Lines<'_> {
    type Item = Bytes;

    fn next(&mut self) -> Option<Bytes> {
        self.framer.next_line()
    }
}

#[cfg(test)]
#[path = "framer_test.rs"]
mod framer_test;
