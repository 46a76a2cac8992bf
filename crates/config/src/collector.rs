//! Collector configuration
//!
//! Endpoints accept the literal `"none"` (or an empty string) to turn the
//! corresponding role off.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// Collector configuration
///
/// # Example
///
/// ```toml
/// [collector]
/// listen = "0.0.0.0:14999"
/// publish = "0.0.0.0:14998"
/// subscribe = "upstream.local:14998"
/// persist = true
/// log_dir = "/var/log/linecast"
/// backup_count = 14
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    /// Request endpoint ingesters connect to
    /// Default: "0.0.0.0:14999"
    pub listen: String,

    /// Publish endpoint subscribers connect to
    /// Default: "0.0.0.0:14998"
    pub publish: String,

    /// Publish endpoint of an upstream collector to chain from
    /// Default: none
    pub subscribe: Option<String>,

    /// Write received lines to per-source log files
    /// Default: false
    pub persist: bool,

    /// Directory for per-source log files
    /// Default: "."
    pub log_dir: PathBuf,

    /// Number of daily rotations kept per source
    /// Default: 14
    pub backup_count: usize,

    /// First reconnect delay for the upstream subscription
    /// Default: 1s
    #[serde(with = "humantime_serde")]
    pub subscribe_reconnect_interval: Duration,

    /// Upper bound for the upstream reconnect delay
    /// Default: 30s
    #[serde(with = "humantime_serde")]
    pub subscribe_reconnect_interval_max: Duration,

    /// Per-subscriber queue length before lines are dropped
    /// Default: 1024
    pub subscriber_queue: usize,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:14999".into(),
            publish: "0.0.0.0:14998".into(),
            subscribe: None,
            persist: false,
            log_dir: PathBuf::from("."),
            backup_count: 14,
            subscribe_reconnect_interval: Duration::from_secs(1),
            subscribe_reconnect_interval_max: Duration::from_secs(30),
            subscriber_queue: 1024,
        }
    }
}

impl CollectorConfig {
    /// Request endpoint, if enabled
    pub fn listen_addr(&self) -> Option<&str> {
        enabled_endpoint(&self.listen)
    }

    /// Publish endpoint, if enabled
    pub fn publish_addr(&self) -> Option<&str> {
        enabled_endpoint(&self.publish)
    }

    /// Upstream publish endpoint, if configured
    pub fn subscribe_addr(&self) -> Option<&str> {
        self.subscribe.as_deref().and_then(enabled_endpoint)
    }
}

fn enabled_endpoint(addr: &str) -> Option<&str> {
    let addr = addr.trim();
    if addr.is_empty() || addr.eq_ignore_ascii_case("none") {
        None
    } else {
        Some(addr)
    }
}
