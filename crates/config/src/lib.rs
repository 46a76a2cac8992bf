//! Linecast Configuration
//!
//! TOML-based configuration loading with sensible defaults.
//! Minimal config should just work - only specify what you need to change.
//!
//! # Parsing
//!
//! Use the `FromStr` trait to parse configuration:
//!
//! ```
//! use linecast_config::Config;
//! use std::str::FromStr;
//!
//! let config = Config::from_str("[ingest]\nserver = \"logs.local:14999\"").unwrap();
//! assert_eq!(config.ingest.server, "logs.local:14999");
//! ```
//!
//! # Example Config
//!
//! ```toml
//! [log]
//! level = "info"
//!
//! [ingest]
//! server = "logs.local:14999"
//! port = "/dev/ttyUSB0"
//! baud = 115200
//! ack_timeout = "60s"
//!
//! [collector]
//! listen = "0.0.0.0:14999"
//! publish = "0.0.0.0:14998"
//! persist = true
//! log_dir = "/var/log/linecast"
//! ```

mod collector;
mod error;
mod ingest;
mod logging;
mod validation;

use std::fs;
use std::path::Path;
use std::str::FromStr;

pub use collector::CollectorConfig;
pub use error::{ConfigError, Result};
pub use ingest::IngestConfig;
pub use logging::{LogConfig, LogFormat, LogLevel, LogOutput};

use serde::Deserialize;

/// Main configuration structure
///
/// All sections are optional with sensible defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Logging configuration
    pub log: LogConfig,

    /// Serial ingester (client) settings
    pub ingest: IngestConfig,

    /// Collector (server) settings
    pub collector: CollectorConfig,
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read or contains invalid TOML.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::IoError {
            path: path.display().to_string(),
            source: e,
        })?;

        Self::from_str(&contents)
    }

    /// Parse configuration from a TOML string
    ///
    /// Prefer using the `FromStr` trait implementation.
    fn parse(s: &str) -> Result<Self> {
        let config: Config = toml::from_str(s).map_err(ConfigError::ParseError)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        validation::validate_config(self)
    }
}

impl FromStr for Config {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use std::time::Duration;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::from_str("").unwrap();
        assert_eq!(config.ingest.baud, 115200);
        assert_eq!(config.collector.listen, "0.0.0.0:14999");
        assert_eq!(config.log.level, LogLevel::Info);
    }

    #[test]
    fn test_full_config_parse() {
        let toml = r#"
[log]
level = "debug"
format = "json"

[ingest]
server = "logs.local:14999"
port = "/dev/ttyACM1"
baud = 921600
portname = "radio"
boot_time = false
idle_flush = "500ms"
ack_timeout = "30s"
retention = "10m"
reconnect_interval = "2s"
reconnect_interval_max = "20s"

[collector]
listen = "none"
publish = "127.0.0.1:24998"
subscribe = "upstream.local:14998"
persist = true
log_dir = "/var/log/linecast"
backup_count = 7
"#;
        let config = Config::from_str(toml).unwrap();

        assert_eq!(config.log.level, LogLevel::Debug);
        assert_eq!(config.log.format, LogFormat::Json);
        assert_eq!(config.ingest.server, "logs.local:14999");
        assert_eq!(config.ingest.baud, 921600);
        assert_eq!(config.ingest.effective_portname(), "radio");
        assert!(!config.ingest.boot_time);
        assert_eq!(config.ingest.idle_flush, Duration::from_millis(500));
        assert_eq!(config.ingest.ack_timeout, Duration::from_secs(30));
        assert_eq!(config.ingest.retention, Duration::from_secs(600));
        assert_eq!(config.collector.listen_addr(), None);
        assert_eq!(config.collector.publish_addr(), Some("127.0.0.1:24998"));
        assert_eq!(config.collector.subscribe_addr(), Some("upstream.local:14998"));
        assert!(config.collector.persist);
        assert_eq!(config.collector.backup_count, 7);
    }

    #[test]
    fn test_invalid_toml() {
        let result = Config::from_str("invalid { toml");
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_validation_runs_on_parse() {
        let toml = r#"
[ingest]
reconnect_interval = "90s"
reconnect_interval_max = "60s"
"#;
        assert!(Config::from_str(toml).is_err());
    }

    #[test]
    fn test_from_file_missing() {
        let result = Config::from_file("/nonexistent/linecast.toml");
        assert!(matches!(result, Err(ConfigError::IoError { .. })));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("linecast.toml");
        std::fs::write(&path, "[collector]\npersist = true\n").unwrap();

        let config = Config::from_file(&path).unwrap();
        assert!(config.collector.persist);
    }
}
