//! Request listener - the collector's inbound endpoint
//!
//! Ingesters connect over TCP and send one framed batch at a time, waiting
//! for the reply before sending the next one. Each connection gets its own
//! task; the task hands every batch to the collector loop through an mpsc
//! channel together with a oneshot for the reply, then writes that reply
//! back before reading the next frame.
//!
//! ```text
//! ingester ──frame──▶ connection task ──InboundBatch──▶ collector loop
//!          ◀─reply───                 ◀────oneshot────
//! ```

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use bytes::Bytes;
use linecast_protocol::{read_frame, write_frame};
use socket2::{SockRef, TcpKeepalive};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::error::{Result, SourceError};

/// One batch received from an ingester, awaiting its reply
#[derive(Debug)]
pub struct InboundBatch {
    /// Newline-joined wire lines
    pub payload: Bytes,

    /// Remote address of the ingester
    pub peer: SocketAddr,

    reply: oneshot::Sender<Bytes>,
}

impl InboundBatch {
    /// Create a batch and the receiver its reply is delivered to
    pub fn new(payload: Bytes, peer: SocketAddr) -> (Self, oneshot::Receiver<Bytes>) {
        let (reply, rx) = oneshot::channel();
        (
            Self {
                payload,
                peer,
                reply,
            },
            rx,
        )
    }

    /// Send the reply and keep the payload
    ///
    /// Returns `false` if the connection went away in the meantime; the
    /// payload is still valid and should be processed.
    pub fn acknowledge(self, reply: &'static [u8]) -> (Bytes, bool) {
        let delivered = self.reply.send(Bytes::from_static(reply)).is_ok();
        (self.payload, delivered)
    }
}

/// Request listener metrics
#[derive(Debug, Default)]
pub struct ListenerMetrics {
    connections_active: AtomicU64,
    connections_total: AtomicU64,
    batches_received: AtomicU64,
    bytes_received: AtomicU64,
    errors: AtomicU64,
}

impl ListenerMetrics {
    #[inline]
    fn connection_opened(&self) {
        self.connections_active.fetch_add(1, Ordering::Relaxed);
        self.connections_total.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    fn connection_closed(&self) {
        self.connections_active.fetch_sub(1, Ordering::Relaxed);
    }

    #[inline]
    fn batch_received(&self, bytes: usize) {
        self.batches_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    #[inline]
    fn error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> ListenerMetricsSnapshot {
        ListenerMetricsSnapshot {
            connections_active: self.connections_active.load(Ordering::Relaxed),
            connections_total: self.connections_total.load(Ordering::Relaxed),
            batches_received: self.batches_received.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time snapshot of listener metrics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListenerMetricsSnapshot {
    pub connections_active: u64,
    pub connections_total: u64,
    pub batches_received: u64,
    pub bytes_received: u64,
    pub errors: u64,
}

/// TCP request endpoint
pub struct RequestListener {
    listener: TcpListener,
    batches: mpsc::Sender<InboundBatch>,
    metrics: Arc<ListenerMetrics>,
}

impl RequestListener {
    /// Bind the endpoint
    ///
    /// # Errors
    ///
    /// Returns `Bind` if the address is unavailable.
    pub async fn bind(address: &str, batches: mpsc::Sender<InboundBatch>) -> Result<Self> {
        let listener = TcpListener::bind(address)
            .await
            .map_err(|e| SourceError::Bind {
                address: address.to_string(),
                source: e,
            })?;

        Ok(Self {
            listener,
            batches,
            metrics: Arc::new(ListenerMetrics::default()),
        })
    }

    /// Address actually bound (useful with port 0)
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Shared metrics, valid after `run()` consumes the listener
    pub fn metrics(&self) -> Arc<ListenerMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Accept connections until cancelled
    pub async fn run(self, cancel: CancellationToken) -> Result<()> {
        let address = self.local_addr()?;
        tracing::info!(address = %address, "request listener ready");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                result = self.listener.accept() => match result {
                    Ok((stream, peer)) => {
                        self.metrics.connection_opened();
                        tracing::debug!(peer = %peer, "ingester connected");

                        let batches = self.batches.clone();
                        let metrics = Arc::clone(&self.metrics);
                        let cancel = cancel.clone();
                        tokio::spawn(async move {
                            if let Err(e) =
                                handle_connection(stream, peer, batches, &metrics, cancel).await
                                && !e.is_disconnect()
                            {
                                metrics.error();
                                tracing::debug!(peer = %peer, error = %e, "connection error");
                            }
                            metrics.connection_closed();
                        });
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "accept error");
                        self.metrics.error();
                    }
                },
            }
        }

        tracing::info!(address = %address, "request listener stopped");
        Ok(())
    }
}

async fn handle_connection(
    mut stream: TcpStream,
    peer: SocketAddr,
    batches: mpsc::Sender<InboundBatch>,
    metrics: &ListenerMetrics,
    cancel: CancellationToken,
) -> Result<()> {
    configure_socket(&stream);

    loop {
        let frame = tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            frame = read_frame(&mut stream) => frame?,
        };
        let Some(payload) = frame else {
            tracing::debug!(peer = %peer, "ingester disconnected");
            return Ok(());
        };

        tracing::trace!(peer = %peer, bytes = payload.len(), "batch frame");
        metrics.batch_received(payload.len());

        let (batch, reply) = InboundBatch::new(payload, peer);
        batches
            .send(batch)
            .await
            .map_err(|_| SourceError::ChannelClosed)?;
        let reply = reply.await.map_err(|_| SourceError::ChannelClosed)?;

        write_frame(&mut stream, &reply).await?;
    }
}

fn configure_socket(stream: &TcpStream) {
    let socket = SockRef::from(stream);

    if let Err(e) = socket.set_tcp_nodelay(true) {
        tracing::debug!(error = %e, "failed to set TCP_NODELAY");
    }

    let keepalive = TcpKeepalive::new()
        .with_time(Duration::from_secs(60))
        .with_interval(Duration::from_secs(10));
    if let Err(e) = socket.set_tcp_keepalive(&keepalive) {
        tracing::debug!(error = %e, "failed to set TCP keepalive");
    }
}

#[cfg(test)]
#[path = "listener_test.rs"]
mod listener_test;
