//! Serial port input
//!
//! The port is opened 8N1 without flow control and with DTR held low, so
//! boards that wire DTR to reset are not rebooted by the ingester. Reads
//! never wait for data: only the bytes already queued by the driver are
//! taken.
//!
//! A missing or unplugged device is not an error. [`SerialLink`] keeps
//! retrying the open every `reopen_delay` and reports
//! [`SerialRead::Reopened`] when the port comes back, so the caller can
//! drop per-device state.

use std::io::Read;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serialport::{ClearBuffer, DataBits, FlowControl, Parity, SerialPort, StopBits};

use crate::error::{Result, SourceError};

/// Default delay between open attempts
pub const DEFAULT_REOPEN_DELAY: Duration = Duration::from_millis(100);

/// Driver read timeout; reads are only issued for bytes already queued
const READ_TIMEOUT: Duration = Duration::from_millis(1);

/// Result of one poll of a byte source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SerialRead {
    /// `n` bytes were written to the buffer
    Data(usize),
    /// Port open, nothing queued
    Empty,
    /// Port was (re)opened during this poll; device state is unknown
    Reopened,
    /// Port closed, waiting for the next open attempt
    Unavailable,
}

/// Non-blocking byte input polled by the ingester loop
pub trait ByteSource {
    /// Read whatever is available into `buf`
    fn poll_read(&mut self, buf: &mut [u8], now: DateTime<Utc>) -> SerialRead;
}

/// Open a serial port for line capture
///
/// # Errors
///
/// Returns `SerialOpen` if the device cannot be opened or configured.
pub fn open_port(path: &str, baud: u32) -> Result<Box<dyn SerialPort>> {
    let serial_err = |source| SourceError::SerialOpen {
        port: path.to_string(),
        source,
    };

    let mut port = serialport::new(path, baud)
        .data_bits(DataBits::Eight)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .flow_control(FlowControl::None)
        .timeout(READ_TIMEOUT)
        .open()
        .map_err(serial_err)?;

    port.write_data_terminal_ready(false).map_err(serial_err)?;
    port.clear(ClearBuffer::Input).map_err(serial_err)?;

    Ok(port)
}

/// Self-reopening serial port
pub struct SerialLink {
    path: String,
    baud: u32,
    reopen_delay: TimeDelta,
    port: Option<Box<dyn SerialPort>>,
    next_open: Option<DateTime<Utc>>,
    warned: bool,
}

impl SerialLink {
    /// Create a link; the port is opened on the first poll
    pub fn new(path: impl Into<String>, baud: u32) -> Self {
        Self {
            path: path.into(),
            baud,
            reopen_delay: TimeDelta::milliseconds(DEFAULT_REOPEN_DELAY.as_millis() as i64),
            port: None,
            next_open: None,
            warned: false,
        }
    }

    /// Set the delay between open attempts
    #[must_use]
    pub fn with_reopen_delay(mut self, delay: Duration) -> Self {
        self.reopen_delay = TimeDelta::from_std(delay).unwrap_or(self.reopen_delay);
        self
    }

    /// Device path
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Whether the port is currently open
    pub fn is_open(&self) -> bool {
        self.port.is_some()
    }

    fn try_open(&mut self, now: DateTime<Utc>) -> SerialRead {
        if self.next_open.is_some_and(|at| now < at) {
            return SerialRead::Unavailable;
        }

        match open_port(&self.path, self.baud) {
            Ok(port) => {
                tracing::info!(port = %self.path, baud = self.baud, "serial port opened");
                self.port = Some(port);
                self.next_open = None;
                self.warned = false;
                SerialRead::Reopened
            }
            Err(e) => {
                // Log once per outage, the open is retried every few ms
                if !self.warned {
                    tracing::warn!(error = %e, "serial port unavailable, retrying");
                    self.warned = true;
                }
                self.next_open = Some(now + self.reopen_delay);
                SerialRead::Unavailable
            }
        }
    }

    fn close(&mut self, now: DateTime<Utc>, error: &std::io::Error) {
        tracing::warn!(port = %self.path, error = %error, "serial port lost");
        self.port = None;
        self.next_open = Some(now + self.reopen_delay);
    }
}

impl ByteSource for SerialLink {
    fn poll_read(&mut self, buf: &mut [u8], now: DateTime<Utc>) -> SerialRead {
        let Some(port) = self.port.as_mut() else {
            return self.try_open(now);
        };

        let queued = match port.bytes_to_read() {
            Ok(0) => return SerialRead::Empty,
            Ok(n) => (n as usize).min(buf.len()),
            Err(e) => {
                let e = std::io::Error::other(e);
                self.close(now, &e);
                return SerialRead::Unavailable;
            }
        };

        match port.read(&mut buf[..queued]) {
            Ok(0) => SerialRead::Empty,
            Ok(n) => SerialRead::Data(n),
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => SerialRead::Empty,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => SerialRead::Empty,
            Err(e) => {
                self.close(now, &e);
                SerialRead::Unavailable
            }
        }
    }
}

#[cfg(test)]
#[path = "serial_test.rs"]
mod serial_test;
