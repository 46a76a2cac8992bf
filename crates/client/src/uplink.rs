//! Uplink - request/reply transport to a collector
//!
//! The outbound buffer drives the uplink from a polling loop, so only
//! `connect` and `send` may await (both bounded by timeouts). Replies are
//! polled with [`Uplink::try_recv`], which never waits.
//!
//! # Protocol
//!
//! ```text
//! ingester                          collector
//!    │ ── [len][batch] ──────────────▶ │
//!    │ ◀──────────────── [len][reply] ─ │
//! ```
//!
//! One request is in flight per connection; the collector answers every
//! batch with a non-empty reply.

use std::io::ErrorKind;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use linecast_protocol::{FrameDecoder, write_frame};
use socket2::{SockRef, TcpKeepalive};
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::error::{Result, UplinkError};

/// Read chunk for reply polling (replies are a few bytes)
const REPLY_CHUNK: usize = 256;

/// Connection to a collector's request endpoint
#[async_trait]
pub trait Uplink: Send {
    /// Open a fresh connection, dropping any existing one
    async fn connect(&mut self) -> Result<()>;

    /// Send one batch
    async fn send(&mut self, payload: Bytes) -> Result<()>;

    /// Take a reply if one has fully arrived
    ///
    /// Returns `Ok(None)` when nothing is available yet.
    fn try_recv(&mut self) -> Result<Option<Bytes>>;

    /// Drop the connection
    fn disconnect(&mut self);

    /// Whether a connection is open
    fn is_connected(&self) -> bool;

    /// Human-readable peer, for logs
    fn target(&self) -> &str;
}

/// TCP uplink configuration
#[derive(Debug, Clone)]
pub struct TcpUplinkConfig {
    /// Collector request endpoint (host:port)
    pub target: String,

    /// Connect timeout
    pub connect_timeout: Duration,

    /// Timeout for writing one batch
    pub write_timeout: Duration,

    /// TCP keep-alive enabled
    pub tcp_keepalive: bool,

    /// Idle time before keep-alive probes start
    pub tcp_keepalive_interval: Duration,
}

impl TcpUplinkConfig {
    /// Create a config for `target` with default timeouts
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            connect_timeout: Duration::from_secs(5),
            write_timeout: Duration::from_secs(10),
            tcp_keepalive: true,
            tcp_keepalive_interval: Duration::from_secs(30),
        }
    }

    /// Set connect timeout
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set write timeout
    #[must_use]
    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Enable or disable TCP keep-alive
    #[must_use]
    pub fn with_tcp_keepalive(mut self, enabled: bool) -> Self {
        self.tcp_keepalive = enabled;
        self
    }
}

/// Uplink over a length-prefixed TCP connection
pub struct TcpUplink {
    config: TcpUplinkConfig,
    stream: Option<TcpStream>,
    decoder: FrameDecoder,
}

impl TcpUplink {
    /// Create a disconnected uplink
    pub fn new(config: TcpUplinkConfig) -> Self {
        Self {
            config,
            stream: None,
            decoder: FrameDecoder::new(),
        }
    }

    /// Configuration
    pub fn config(&self) -> &TcpUplinkConfig {
        &self.config
    }

    fn configure_socket(&self, stream: &TcpStream) {
        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(error = %e, "failed to set TCP_NODELAY");
        }

        if self.config.tcp_keepalive {
            let keepalive = TcpKeepalive::new().with_time(self.config.tcp_keepalive_interval);

            #[cfg(target_os = "linux")]
            let keepalive = keepalive.with_interval(self.config.tcp_keepalive_interval);

            if let Err(e) = SockRef::from(stream).set_tcp_keepalive(&keepalive) {
                tracing::debug!(error = %e, "failed to set TCP keep-alive");
            }
        }
    }
}

#[async_trait]
impl Uplink for TcpUplink {
    async fn connect(&mut self) -> Result<()> {
        self.disconnect();

        let stream = match timeout(
            self.config.connect_timeout,
            TcpStream::connect(&self.config.target),
        )
        .await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                return Err(UplinkError::ConnectionFailed {
                    target: self.config.target.clone(),
                    source: e,
                });
            }
            Err(_) => return Err(UplinkError::Timeout("connect")),
        };

        self.configure_socket(&stream);
        tracing::debug!(collector = %self.config.target, "connected to collector");

        self.stream = Some(stream);
        Ok(())
    }

    async fn send(&mut self, payload: Bytes) -> Result<()> {
        let stream = self.stream.as_mut().ok_or(UplinkError::NotConnected)?;

        match timeout(self.config.write_timeout, write_frame(stream, &payload)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                self.disconnect();
                Err(e.into())
            }
            Err(_) => {
                self.disconnect();
                Err(UplinkError::Timeout("write"))
            }
        }
    }

    fn try_recv(&mut self) -> Result<Option<Bytes>> {
        let stream = self.stream.as_ref().ok_or(UplinkError::NotConnected)?;

        let mut chunk = [0u8; REPLY_CHUNK];
        let mut closed = false;
        loop {
            match stream.try_read(&mut chunk) {
                Ok(0) => {
                    closed = true;
                    break;
                }
                Ok(n) => self.decoder.extend(&chunk[..n]),
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }

        // A reply sent right before the peer closed still counts
        match self.decoder.next_frame()? {
            Some(frame) => Ok(Some(frame)),
            None if closed => Err(UplinkError::Closed),
            None => Ok(None),
        }
    }

    fn disconnect(&mut self) {
        self.stream = None;
        self.decoder.clear();
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    fn target(&self) -> &str {
        &self.config.target
    }
}

#[cfg(test)]
#[path = "uplink_test.rs"]
mod uplink_test;
