//! Line records and the wire-line text format
//!
//! A `LineRecord` is created by the ingester for every framed serial line and
//! is serialized once per transmission attempt. Serialization is a pure
//! function of the record, so a resent batch is byte-identical to the
//! original send.

use std::fmt::Write as _;

use bytes::Bytes;
use chrono::{DateTime, NaiveDateTime, Utc};

use crate::error::ProtocolError;
use crate::quote::{quote, unquote};
use crate::source::SourceId;
use crate::Result;

/// chrono format for wire timestamps (UTC, millisecond precision)
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// Marker prepended to the timestamp token of a broken line
const BROKEN_MARKER: char = 'x';

/// Format a timestamp the way it appears on the wire
#[inline]
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

/// Parse a wire timestamp (without the broken marker)
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|_| ProtocolError::InvalidTimestamp(s.to_string()))
}

/// One captured serial line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineRecord {
    /// Originating device/port
    pub source_id: SourceId,

    /// Per-source sequence number (wraps at `u32::MAX`)
    pub sequence: u32,

    /// Line bytes without the delimiter
    pub raw_text: Bytes,

    /// Wall-clock time the line was framed
    pub capture_time: DateTime<Utc>,

    /// Device-corrected time (equals `capture_time` when no correction applies)
    pub corrected_time: DateTime<Utc>,

    /// Framing or time correction could not be completed with confidence
    pub broken: bool,
}

impl LineRecord {
    /// Serialize to a wire line (no trailing delimiter)
    pub fn to_wire(&self) -> String {
        let mut out = String::with_capacity(self.raw_text.len() + 64);
        self.write_wire(&mut out);
        out
    }

    /// Append the wire line to `out` (no trailing delimiter)
    pub fn write_wire(&self, out: &mut String) {
        // Writing to a String cannot fail
        let _ = write!(
            out,
            "{} {:06X} {}{} {}",
            self.source_id,
            self.sequence,
            if self.broken { "x" } else { "" },
            self.corrected_time.format(TIMESTAMP_FORMAT),
            quote(&self.raw_text),
        );
    }
}

/// Parsed, borrowed view of a wire line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireLine<'a> {
    /// Source identifier token
    pub source_id: &'a str,

    /// Sequence number
    pub sequence: u32,

    /// Whether the timestamp carried the broken marker
    pub broken: bool,

    /// Timestamp (corrected time on the ingester side)
    pub timestamp: DateTime<Utc>,

    /// Quoted original line, still escaped
    pub quoted: &'a str,

    /// Everything after the sequence token (`[x]timestamp quoted`)
    pub body: &'a str,
}

impl<'a> WireLine<'a> {
    /// Parse a complete wire line
    ///
    /// # Errors
    ///
    /// Returns an error if any of the four header tokens is missing or
    /// malformed. The quoted part is only checked for presence; use
    /// [`WireLine::text`] to decode it.
    pub fn parse(line: &'a str) -> Result<Self> {
        let (source_id, sequence, body) = Self::split_header(line)
            .ok_or_else(|| ProtocolError::malformed("expected source, sequence and body"))?;

        let sequence = u32::from_str_radix(sequence, 16)
            .map_err(|_| ProtocolError::InvalidSequence(sequence.to_string()))?;

        let (timestamp, quoted) = body
            .split_once(' ')
            .ok_or_else(|| ProtocolError::malformed("missing quoted line"))?;

        let (broken, timestamp) = match timestamp.strip_prefix(BROKEN_MARKER) {
            Some(rest) => (true, rest),
            None => (false, timestamp),
        };

        Ok(Self {
            source_id,
            sequence,
            broken,
            timestamp: parse_timestamp(timestamp)?,
            quoted,
            body,
        })
    }

    /// Split a wire line into `(source_id, sequence, body)` without
    /// validating the tokens
    ///
    /// Returns `None` if the line has fewer than three space-separated parts.
    pub fn split_header(line: &'a str) -> Option<(&'a str, &'a str, &'a str)> {
        let mut parts = line.splitn(3, ' ');
        let source = parts.next().filter(|s| !s.is_empty())?;
        let sequence = parts.next().filter(|s| !s.is_empty())?;
        let body = parts.next().filter(|s| !s.is_empty())?;
        Some((source, sequence, body))
    }

    /// Decode the original line bytes
    pub fn text(&self) -> Result<Vec<u8>> {
        unquote(self.quoted)
    }
}
