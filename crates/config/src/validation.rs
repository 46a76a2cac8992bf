//! Configuration validation
//!
//! Validates config consistency:
//! - Required addresses are present
//! - Timing values are positive
//! - Reconnect backoff bounds are ordered
//! - The collector has at least one input

use std::time::Duration;

use crate::Config;
use crate::error::{ConfigError, Result};

/// Validate the entire configuration
pub fn validate_config(config: &Config) -> Result<()> {
    validate_ingest(config)?;
    validate_collector(config)?;
    Ok(())
}

fn validate_ingest(config: &Config) -> Result<()> {
    let ingest = &config.ingest;

    if ingest.server.trim().is_empty() {
        return Err(ConfigError::missing_field("ingest", "server"));
    }
    if ingest.port.trim().is_empty() {
        return Err(ConfigError::missing_field("ingest", "port"));
    }
    if ingest.baud == 0 {
        return Err(ConfigError::invalid_value("ingest", "baud", "must be greater than zero"));
    }
    if ingest.read_chunk == 0 {
        return Err(ConfigError::invalid_value(
            "ingest",
            "read_chunk",
            "must be greater than zero",
        ));
    }

    for (field, value) in [
        ("idle_flush", ingest.idle_flush),
        ("ack_timeout", ingest.ack_timeout),
        ("retention", ingest.retention),
        ("reconnect_interval", ingest.reconnect_interval),
        ("connect_timeout", ingest.connect_timeout),
        ("write_timeout", ingest.write_timeout),
        ("poll_interval", ingest.poll_interval),
    ] {
        require_positive("ingest", field, value)?;
    }

    if ingest.reconnect_interval > ingest.reconnect_interval_max {
        return Err(ConfigError::invalid_value(
            "ingest",
            "reconnect_interval",
            "must not exceed reconnect_interval_max",
        ));
    }

    Ok(())
}

fn validate_collector(config: &Config) -> Result<()> {
    let collector = &config.collector;

    if collector.listen_addr().is_none() && collector.subscribe_addr().is_none() {
        return Err(ConfigError::NoCollectorInput);
    }

    require_positive(
        "collector",
        "subscribe_reconnect_interval",
        collector.subscribe_reconnect_interval,
    )?;

    if collector.subscribe_reconnect_interval > collector.subscribe_reconnect_interval_max {
        return Err(ConfigError::invalid_value(
            "collector",
            "subscribe_reconnect_interval",
            "must not exceed subscribe_reconnect_interval_max",
        ));
    }

    if collector.subscriber_queue == 0 {
        return Err(ConfigError::invalid_value(
            "collector",
            "subscriber_queue",
            "must be greater than zero",
        ));
    }

    Ok(())
}

fn require_positive(section: &'static str, field: &'static str, value: Duration) -> Result<()> {
    if value.is_zero() {
        return Err(ConfigError::invalid_value(section, field, "must be greater than zero"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn parse(toml: &str) -> Result<Config> {
        Config::from_str(toml)
    }

    #[test]
    fn test_defaults_are_valid() {
        assert!(validate_config(&Config::default()).is_ok());
    }

    #[test]
    fn test_empty_server_rejected() {
        let err = parse("[ingest]\nserver = \"\"").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::MissingField {
                section: "ingest",
                field: "server"
            }
        ));
    }

    #[test]
    fn test_zero_duration_rejected() {
        let err = parse("[ingest]\nack_timeout = \"0s\"").unwrap_err();
        assert!(err.to_string().contains("ack_timeout"));
    }

    #[test]
    fn test_reconnect_bounds_ordered() {
        let err = parse("[ingest]\nreconnect_interval = \"2m\"").unwrap_err();
        assert!(err.to_string().contains("reconnect_interval_max"));
    }

    #[test]
    fn test_collector_without_input_rejected() {
        let err = parse("[collector]\nlisten = \"none\"").unwrap_err();
        assert!(matches!(err, ConfigError::NoCollectorInput));
    }

    #[test]
    fn test_collector_subscribe_only_is_valid() {
        let config = parse("[collector]\nlisten = \"none\"\nsubscribe = \"up:14998\"").unwrap();
        assert_eq!(config.collector.listen_addr(), None);
    }

    #[test]
    fn test_zero_subscriber_queue_rejected() {
        assert!(parse("[collector]\nsubscriber_queue = 0").is_err());
    }
}
