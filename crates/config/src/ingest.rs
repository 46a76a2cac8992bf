//! Serial ingester configuration
//!
//! Settings for reading one serial port and delivering its lines to a
//! collector. The retry and retention values are policy knobs; the defaults
//! suit a device logging a few lines per second over a flaky uplink.

use std::time::Duration;

use serde::Deserialize;

/// Ingester configuration
///
/// # Example
///
/// ```toml
/// [ingest]
/// server = "logs.local:14999"
/// port = "/dev/ttyUSB0"
/// baud = 115200
/// idle_flush = "200ms"
/// ack_timeout = "60s"
/// retention = "30m"
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Collector request endpoint (host:port)
    /// Default: "localhost:14999"
    pub server: String,

    /// Serial device path
    /// Default: "/dev/ttyUSB0"
    pub port: String,

    /// Serial baud rate
    /// Default: 115200
    pub baud: u32,

    /// Port name used in the source id
    /// Default: last character of `port`
    pub portname: Option<String>,

    /// Reconstruct timestamps from device boot-relative counters
    /// Default: true
    pub boot_time: bool,

    /// Emit a partial line as broken after this long without a delimiter
    /// Default: 200ms
    #[serde(with = "humantime_serde")]
    pub idle_flush: Duration,

    /// Reconnect if a sent batch is not acknowledged within this time
    /// Default: 60s
    #[serde(with = "humantime_serde")]
    pub ack_timeout: Duration,

    /// Drop buffered lines older than this, acknowledged or not
    /// Default: 30m
    #[serde(with = "humantime_serde")]
    pub retention: Duration,

    /// First reconnect delay after a connection failure
    /// Default: 1s
    #[serde(with = "humantime_serde")]
    pub reconnect_interval: Duration,

    /// Upper bound for the growing reconnect delay
    /// Default: 60s
    #[serde(with = "humantime_serde")]
    pub reconnect_interval_max: Duration,

    /// TCP connect timeout
    /// Default: 5s
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,

    /// Timeout for writing one batch
    /// Default: 10s
    #[serde(with = "humantime_serde")]
    pub write_timeout: Duration,

    /// Ingest loop period
    /// Default: 10ms
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,

    /// Delay between attempts to (re)open the serial port
    /// Default: 100ms
    #[serde(with = "humantime_serde")]
    pub serial_reopen_delay: Duration,

    /// Maximum bytes taken from the serial port per read
    /// Default: 1000
    pub read_chunk: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            server: "localhost:14999".into(),
            port: "/dev/ttyUSB0".into(),
            baud: 115_200,
            portname: None,
            boot_time: true,
            idle_flush: Duration::from_millis(200),
            ack_timeout: Duration::from_secs(60),
            retention: Duration::from_secs(30 * 60),
            reconnect_interval: Duration::from_secs(1),
            reconnect_interval_max: Duration::from_secs(60),
            connect_timeout: Duration::from_secs(5),
            write_timeout: Duration::from_secs(10),
            poll_interval: Duration::from_millis(10),
            serial_reopen_delay: Duration::from_millis(100),
            read_chunk: 1000,
        }
    }
}

impl IngestConfig {
    /// Port name that goes into the source id
    ///
    /// Falls back to the last character of the device path
    /// (`/dev/ttyUSB0` -> `0`).
    pub fn effective_portname(&self) -> String {
        match &self.portname {
            Some(name) if !name.is_empty() => name.clone(),
            _ => self
                .port
                .chars()
                .last()
                .map(String::from)
                .unwrap_or_else(|| "0".into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = IngestConfig::default();
        assert_eq!(config.server, "localhost:14999");
        assert_eq!(config.baud, 115_200);
        assert!(config.boot_time);
        assert_eq!(config.idle_flush, Duration::from_millis(200));
        assert_eq!(config.ack_timeout, Duration::from_secs(60));
        assert_eq!(config.retention, Duration::from_secs(1800));
        assert_eq!(config.reconnect_interval, Duration::from_secs(1));
        assert_eq!(config.reconnect_interval_max, Duration::from_secs(60));
        assert_eq!(config.read_chunk, 1000);
    }

    #[test]
    fn test_portname_defaults_to_last_char() {
        let config = IngestConfig {
            port: "/dev/ttyUSB3".into(),
            ..Default::default()
        };
        assert_eq!(config.effective_portname(), "3");
    }

    #[test]
    fn test_portname_override() {
        let config = IngestConfig {
            portname: Some("gps".into()),
            ..Default::default()
        };
        assert_eq!(config.effective_portname(), "gps");
    }

    #[test]
    fn test_portname_empty_override_falls_back() {
        let config = IngestConfig {
            port: "COM7".into(),
            portname: Some(String::new()),
            ..Default::default()
        };
        assert_eq!(config.effective_portname(), "7");
    }

    #[test]
    fn test_deserialize_durations() {
        let toml = r#"
idle_flush = "1s"
poll_interval = "5ms"
retention = "1h"
"#;
        let config: IngestConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.idle_flush, Duration::from_secs(1));
        assert_eq!(config.poll_interval, Duration::from_millis(5));
        assert_eq!(config.retention, Duration::from_secs(3600));
    }
}
