//! Publish endpoint
//!
//! Republishes every line the collector accepts to all connected
//! subscribers, one length-prefixed message per line:
//!
//! ```text
//! collector ── publish(line) ──▶ SubscriberManager ──▶ per-client queue ──▶ client task ──▶ TCP
//! ```
//!
//! Subscribers only read. A client that falls behind by more than its
//! queue length misses lines; the collector never waits for it.
//!
//! [`Publisher`] is the cheap handle the collector loop holds.
//! [`PublishServer`] accepts TCP subscribers and runs one writer task per
//! client.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use linecast_protocol::write_frame;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::{Result, TapError};
use crate::subscriber::SubscriberManager;

/// Publish metrics
#[derive(Debug, Default)]
pub struct PublishMetrics {
    lines_published: AtomicU64,
    deliveries: AtomicU64,
    drops: AtomicU64,
    subscribers_total: AtomicU64,
}

impl PublishMetrics {
    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> PublishMetricsSnapshot {
        PublishMetricsSnapshot {
            lines_published: self.lines_published.load(Ordering::Relaxed),
            deliveries: self.deliveries.load(Ordering::Relaxed),
            drops: self.drops.load(Ordering::Relaxed),
            subscribers_total: self.subscribers_total.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time snapshot of publish metrics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishMetricsSnapshot {
    pub lines_published: u64,
    pub deliveries: u64,
    pub drops: u64,
    pub subscribers_total: u64,
}

/// Fan-out handle shared by the collector and the publish server
#[derive(Debug, Clone)]
pub struct Publisher {
    subscribers: Arc<SubscriberManager>,
    metrics: Arc<PublishMetrics>,
}

impl Default for Publisher {
    fn default() -> Self {
        Self::new(SubscriberManager::default())
    }
}

impl Publisher {
    /// Create a publisher over a subscriber manager
    pub fn new(subscribers: SubscriberManager) -> Self {
        Self {
            subscribers: Arc::new(subscribers),
            metrics: Arc::new(PublishMetrics::default()),
        }
    }

    /// Publish one line to every subscriber, never waiting
    ///
    /// Returns the number of subscribers the line was queued for.
    pub fn publish(&self, line: &Bytes) -> usize {
        self.metrics.lines_published.fetch_add(1, Ordering::Relaxed);
        if !self.subscribers.has_subscribers() {
            return 0;
        }

        let outcome = self.subscribers.broadcast(line);
        self.metrics
            .deliveries
            .fetch_add(outcome.delivered as u64, Ordering::Relaxed);
        if outcome.dropped > 0 {
            self.metrics
                .drops
                .fetch_add(outcome.dropped as u64, Ordering::Relaxed);
            tracing::trace!(dropped = outcome.dropped, "subscriber queue full");
        }
        outcome.delivered
    }

    /// Register an in-process subscriber
    ///
    /// # Errors
    ///
    /// Returns `MaxSubscribers` when the limit is reached.
    pub fn subscribe(&self) -> Result<(u64, mpsc::Receiver<Bytes>)> {
        let subscription = self.subscribers.subscribe()?;
        self.metrics.subscribers_total.fetch_add(1, Ordering::Relaxed);
        Ok(subscription)
    }

    /// Remove a subscriber
    ///
    /// # Errors
    ///
    /// Returns `SubscriberNotFound` if no subscriber has this ID.
    pub fn unsubscribe(&self, id: u64) -> Result<()> {
        self.subscribers.unsubscribe(id)
    }

    /// Connected subscribers
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.count()
    }

    /// Shared metrics
    pub fn metrics(&self) -> Arc<PublishMetrics> {
        Arc::clone(&self.metrics)
    }
}

/// TCP publish endpoint
pub struct PublishServer {
    listener: TcpListener,
    publisher: Publisher,
}

impl PublishServer {
    /// Bind the endpoint
    ///
    /// # Errors
    ///
    /// Returns `Bind` if the address is unavailable.
    pub async fn bind(address: &str, publisher: Publisher) -> Result<Self> {
        let listener = TcpListener::bind(address)
            .await
            .map_err(|source| TapError::Bind {
                address: address.to_string(),
                source,
            })?;
        Ok(Self {
            listener,
            publisher,
        })
    }

    /// Address actually bound (useful with port 0)
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept subscribers until cancelled
    pub async fn run(self, cancel: CancellationToken) -> Result<()> {
        let address = self.local_addr()?;
        tracing::info!(address = %address, "publish endpoint ready");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                result = self.listener.accept() => match result {
                    Ok((stream, peer)) => self.accept(stream, peer, cancel.clone()),
                    Err(e) => tracing::warn!(error = %e, "accept error"),
                },
            }
        }

        tracing::info!(address = %address, "publish endpoint stopped");
        Ok(())
    }

    fn accept(&self, stream: TcpStream, peer: SocketAddr, cancel: CancellationToken) {
        let (id, receiver) = match self.publisher.subscribe() {
            Ok(subscription) => subscription,
            Err(e) => {
                tracing::warn!(peer = %peer, error = %e, "subscriber rejected");
                return;
            }
        };
        tracing::info!(peer = %peer, subscriber_id = id, "subscriber connected");

        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(error = %e, "failed to set TCP_NODELAY");
        }

        let publisher = self.publisher.clone();
        tokio::spawn(async move {
            if let Err(e) = forward_lines(stream, receiver, cancel).await {
                tracing::debug!(peer = %peer, subscriber_id = id, error = %e, "subscriber connection ended");
            }
            let _ = publisher.unsubscribe(id);
            tracing::info!(peer = %peer, subscriber_id = id, "subscriber disconnected");
        });
    }
}

async fn forward_lines(
    mut stream: TcpStream,
    mut receiver: mpsc::Receiver<Bytes>,
    cancel: CancellationToken,
) -> Result<()> {
    let mut peek_buf = [0u8; 1];
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            line = receiver.recv() => {
                let Some(line) = line else {
                    return Ok(());
                };
                write_frame(&mut stream, &line).await?;
            }
            // Subscribers never send; a readable socket means it was closed
            read = stream.peek(&mut peek_buf) => {
                match read {
                    Ok(0) => return Ok(()),
                    Ok(_) => return Err(TapError::Io(std::io::ErrorKind::InvalidData.into())),
                    Err(e) => return Err(e.into()),
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "publisher_test.rs"]
mod publisher_test;
