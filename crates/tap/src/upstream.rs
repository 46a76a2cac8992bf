//! Upstream subscription - collector chaining
//!
//! A collector can subscribe to another collector's publish endpoint and
//! treat every line it receives like a line from its own ingesters. The
//! connection is kept up forever: whenever it fails or closes, the next
//! attempt follows a backoff that doubles from `reconnect_interval` up to
//! `reconnect_interval_max`.
//!
//! ```text
//! upstream collector ──publish──▶ UpstreamSubscriber ──mpsc──▶ local collector loop
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use bytes::Bytes;
use linecast_protocol::read_frame;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use crate::error::{Result, TapError};

/// Upstream subscription settings
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    /// Publish endpoint of the upstream collector (host:port)
    pub address: String,

    /// First reconnect delay
    pub reconnect_interval: Duration,

    /// Upper bound for the reconnect delay
    pub reconnect_interval_max: Duration,

    /// Connect timeout
    pub connect_timeout: Duration,
}

impl UpstreamConfig {
    /// Create a config for `address` with default intervals
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            reconnect_interval: Duration::from_secs(1),
            reconnect_interval_max: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(5),
        }
    }

    /// Set reconnect backoff bounds
    #[must_use]
    pub fn with_reconnect_interval(mut self, initial: Duration, max: Duration) -> Self {
        self.reconnect_interval = initial;
        self.reconnect_interval_max = max;
        self
    }
}

/// Upstream subscription metrics
#[derive(Debug, Default)]
pub struct UpstreamMetrics {
    connects: AtomicU64,
    connect_failures: AtomicU64,
    lines_received: AtomicU64,
}

impl UpstreamMetrics {
    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> UpstreamMetricsSnapshot {
        UpstreamMetricsSnapshot {
            connects: self.connects.load(Ordering::Relaxed),
            connect_failures: self.connect_failures.load(Ordering::Relaxed),
            lines_received: self.lines_received.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time snapshot of upstream metrics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpstreamMetricsSnapshot {
    pub connects: u64,
    pub connect_failures: u64,
    pub lines_received: u64,
}

/// Subscribes to an upstream publish endpoint and forwards its lines
pub struct UpstreamSubscriber {
    config: UpstreamConfig,
    lines: mpsc::Sender<Bytes>,
    metrics: Arc<UpstreamMetrics>,
}

impl UpstreamSubscriber {
    /// Create a subscriber that forwards into `lines`
    pub fn new(config: UpstreamConfig, lines: mpsc::Sender<Bytes>) -> Self {
        Self {
            config,
            lines,
            metrics: Arc::new(UpstreamMetrics::default()),
        }
    }

    /// Shared metrics
    pub fn metrics(&self) -> Arc<UpstreamMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Stay subscribed until cancelled or the receiving side goes away
    pub async fn run(self, cancel: CancellationToken) {
        let address = self.config.address.clone();
        let mut backoff = self.config.reconnect_interval;
        tracing::info!(upstream = %address, "upstream subscription starting");

        loop {
            let connected = tokio::select! {
                _ = cancel.cancelled() => break,
                result = self.connect() => result,
            };

            match connected {
                Ok(stream) => {
                    self.metrics.connects.fetch_add(1, Ordering::Relaxed);
                    tracing::info!(upstream = %address, "subscribed to upstream");
                    backoff = self.config.reconnect_interval;

                    match self.forward(stream, &cancel).await {
                        Ok(()) if cancel.is_cancelled() => break,
                        Ok(()) => tracing::warn!(upstream = %address, "upstream closed the connection"),
                        Err(TapError::ChannelClosed) => break,
                        Err(e) => tracing::warn!(upstream = %address, error = %e, "upstream connection lost"),
                    }
                }
                Err(e) => {
                    self.metrics.connect_failures.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(
                        upstream = %address,
                        error = %e,
                        retry_secs = backoff.as_secs_f64(),
                        "upstream connect failed"
                    );
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(backoff) => {}
            }
            backoff = (backoff * 2).min(self.config.reconnect_interval_max);
        }

        tracing::info!(upstream = %address, "upstream subscription stopped");
    }

    async fn connect(&self) -> Result<TcpStream> {
        let connect_err = |source| TapError::Connect {
            address: self.config.address.clone(),
            source,
        };
        match timeout(
            self.config.connect_timeout,
            TcpStream::connect(&self.config.address),
        )
        .await
        {
            Ok(result) => result.map_err(connect_err),
            Err(_) => Err(connect_err(std::io::ErrorKind::TimedOut.into())),
        }
    }

    async fn forward(&self, mut stream: TcpStream, cancel: &CancellationToken) -> Result<()> {
        loop {
            let frame = tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                frame = read_frame(&mut stream) => frame?,
            };
            let Some(line) = frame else {
                return Ok(());
            };

            self.metrics.lines_received.fetch_add(1, Ordering::Relaxed);
            self.lines
                .send(line)
                .await
                .map_err(|_| TapError::ChannelClosed)?;
        }
    }
}

#[cfg(test)]
#[path = "upstream_test.rs"]
mod upstream_test;
