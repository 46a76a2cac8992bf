//! Boot-relative timestamp reconstruction
//!
//! Devices prefix their trace output with a hex millisecond counter that
//! starts at zero on every boot. A boot marker line (`<hex> B|BOOT...`)
//! pins that counter to wall-clock time; later trace lines
//! (`<hex> D|...`, `I|`, `W|`, `E|`) are then stamped relative to it.
//!
//! A trace line is flagged broken when no marker has been seen yet or when
//! the reconstructed time drifts more than [`DEFAULT_TOLERANCE`] from the
//! arrival time (usually a missed reboot).

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use once_cell::sync::Lazy;
use regex::bytes::Regex;

/// Maximum accepted distance between corrected and arrival time
pub const DEFAULT_TOLERANCE: Duration = Duration::from_secs(1);

static BOOT_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([0-9a-f]*) B\|BOOT").expect("boot marker pattern"));

static TRACE_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([0-9a-f]*) [DIWE]\|").expect("trace line pattern"));

/// Shape of a line as far as time correction is concerned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    /// Boot marker with its millisecond offset (`None` if the token is empty)
    BootMarker(Option<u64>),
    /// Trace line with its millisecond offset (`None` if the token is empty)
    ///
    /// Offsets too large for `u64` saturate to `u64::MAX`.
    Trace(Option<u64>),
    /// Anything else
    Other,
}

impl LineKind {
    /// Classify a raw line by its leading hex token
    pub fn classify(line: &[u8]) -> Self {
        if let Some(caps) = BOOT_MARKER.captures(line) {
            return Self::BootMarker(parse_offset(&caps[1]));
        }
        if let Some(caps) = TRACE_LINE.captures(line) {
            return Self::Trace(parse_offset(&caps[1]));
        }
        Self::Other
    }
}

fn parse_offset(token: &[u8]) -> Option<u64> {
    if token.is_empty() {
        return None;
    }
    // The pattern only admits hex digits, so the sole failure left is overflow
    let token = std::str::from_utf8(token).ok()?;
    Some(u64::from_str_radix(token, 16).unwrap_or(u64::MAX))
}

/// Time assigned to one line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stamp {
    /// Corrected (or arrival) time
    pub time: DateTime<Utc>,
    /// Time could not be established with confidence
    pub broken: bool,
}

impl Stamp {
    fn trusted(time: DateTime<Utc>) -> Self {
        Self {
            time,
            broken: false,
        }
    }

    fn broken(time: DateTime<Utc>) -> Self {
        Self { time, broken: true }
    }
}

/// Per-source boot epoch tracker
#[derive(Debug, Clone)]
pub struct BootClock {
    enabled: bool,
    tolerance: TimeDelta,
    epoch: Option<DateTime<Utc>>,
}

impl Default for BootClock {
    fn default() -> Self {
        Self::new()
    }
}

impl BootClock {
    /// Create an enabled clock with no epoch
    pub fn new() -> Self {
        Self {
            enabled: true,
            tolerance: TimeDelta::milliseconds(DEFAULT_TOLERANCE.as_millis() as i64),
            epoch: None,
        }
    }

    /// Create a clock that stamps every line with its arrival time
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::new()
        }
    }

    /// Override the drift tolerance
    #[must_use]
    pub fn with_tolerance(mut self, tolerance: Duration) -> Self {
        self.tolerance = TimeDelta::from_std(tolerance).unwrap_or(TimeDelta::MAX);
        self
    }

    /// Whether correction is active
    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Wall-clock time of the current device boot, if known
    #[inline]
    pub fn epoch(&self) -> Option<DateTime<Utc>> {
        self.epoch
    }

    /// Forget the epoch (device state unknown, e.g. after a port reopen)
    pub fn reset(&mut self) {
        self.epoch = None;
    }

    /// Stamp a framed line that arrived at `arrival`
    pub fn observe(&mut self, line: &[u8], arrival: DateTime<Utc>) -> Stamp {
        if !self.enabled {
            return Stamp::trusted(arrival);
        }
        match LineKind::classify(line) {
            LineKind::BootMarker(offset) => self.observe_boot_marker(offset, arrival),
            LineKind::Trace(offset) => self.observe_trace_line(offset, arrival),
            LineKind::Other => Stamp::trusted(arrival),
        }
    }

    /// Replace the epoch from a boot marker
    ///
    /// The marker itself is stamped with its arrival time. An unparseable
    /// offset leaves the previous epoch in place.
    pub fn observe_boot_marker(&mut self, offset_ms: Option<u64>, arrival: DateTime<Utc>) -> Stamp {
        match offset_ms.and_then(|ms| back_by(arrival, ms)) {
            Some(epoch) => {
                tracing::info!(
                    arrival = %arrival,
                    offset_ms = offset_ms.unwrap_or_default(),
                    epoch = %epoch,
                    "device boot"
                );
                self.epoch = Some(epoch);
            }
            None => {
                tracing::warn!(arrival = %arrival, "boot marker with unusable offset");
            }
        }
        Stamp::trusted(arrival)
    }

    /// Correct a trace line against the current epoch
    ///
    /// A trace line without an offset keeps its arrival time. It is only
    /// broken when no epoch is known.
    pub fn observe_trace_line(&self, offset_ms: Option<u64>, arrival: DateTime<Utc>) -> Stamp {
        let Some(epoch) = self.epoch else {
            return Stamp::broken(arrival);
        };
        let Some(offset_ms) = offset_ms else {
            tracing::debug!(arrival = %arrival, "trace line without offset");
            return Stamp::trusted(arrival);
        };
        let Some(corrected) = forward_by(epoch, offset_ms) else {
            return Stamp::broken(arrival);
        };

        let drift = corrected.signed_duration_since(arrival).abs();
        if drift > self.tolerance {
            tracing::debug!(
                arrival = %arrival,
                corrected = %corrected,
                drift_ms = drift.num_milliseconds(),
                "trace time out of tolerance"
            );
            Stamp::broken(corrected)
        } else {
            Stamp::trusted(corrected)
        }
    }
}

fn back_by(t: DateTime<Utc>, ms: u64) -> Option<DateTime<Utc>> {
    let ms = i64::try_from(ms).ok()?;
    t.checked_sub_signed(TimeDelta::try_milliseconds(ms)?)
}

fn forward_by(t: DateTime<Utc>, ms: u64) -> Option<DateTime<Utc>> {
    let ms = i64::try_from(ms).ok()?;
    t.checked_add_signed(TimeDelta::try_milliseconds(ms)?)
}

#[cfg(test)]
#[path = "boot_clock_test.rs"]
mod boot_clock_test;
