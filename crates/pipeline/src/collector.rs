//! Collector loop - accept, acknowledge, republish, persist
//!
//! Lines arrive from two inputs: batches sent by ingesters to the request
//! endpoint, and single lines from an optional upstream collector. Every
//! line takes the same path:
//!
//! ```text
//! InboundBatch ──ack──▶ split_batch ──┐
//!                                      ├──▶ Publisher::publish (verbatim)
//! upstream line ───────────────────────┘          │
//!                                                  ▼
//!                                         LogStore::persist
//! ```
//!
//! A batch is acknowledged before any of its lines are handled, so an
//! ingester never waits on disk I/O. Lines that cannot be stored are still
//! published. Nothing a single line does stops the loop.

use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use linecast_protocol::{ACK_PAYLOAD, split_batch};
use linecast_sinks::LogStore;
use linecast_sources::InboundBatch;
use linecast_tap::Publisher;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio_util::sync::CancellationToken;

use crate::error::{PipelineError, Result};
use crate::metrics::{CollectorMetrics, MetricsSnapshot};

/// The collector's main loop
///
/// Inputs and outputs are all optional; configure them with the `with_*`
/// builders before calling [`Collector::run`].
pub struct Collector {
    inbound: Option<mpsc::Receiver<InboundBatch>>,
    upstream: Option<mpsc::Receiver<Bytes>>,
    publisher: Option<Publisher>,
    store: Option<LogStore>,
    metrics: Arc<CollectorMetrics>,
}

impl Default for Collector {
    fn default() -> Self {
        Self::new()
    }
}

impl Collector {
    /// Create a collector with no inputs or outputs
    pub fn new() -> Self {
        Self {
            inbound: None,
            upstream: None,
            publisher: None,
            store: None,
            metrics: Arc::new(CollectorMetrics::new()),
        }
    }

    /// Take batches from a request endpoint
    #[must_use]
    pub fn with_inbound(mut self, batches: mpsc::Receiver<InboundBatch>) -> Self {
        self.inbound = Some(batches);
        self
    }

    /// Take lines from an upstream subscription
    #[must_use]
    pub fn with_upstream(mut self, lines: mpsc::Receiver<Bytes>) -> Self {
        self.upstream = Some(lines);
        self
    }

    /// Republish every line
    #[must_use]
    pub fn with_publisher(mut self, publisher: Publisher) -> Self {
        self.publisher = Some(publisher);
        self
    }

    /// Persist every line into per-source logs
    #[must_use]
    pub fn with_store(mut self, store: LogStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Shared metrics
    pub fn metrics(&self) -> Arc<CollectorMetrics> {
        Arc::clone(&self.metrics)
    }

    /// The log store, if persistence is enabled
    pub fn store(&self) -> Option<&LogStore> {
        self.store.as_ref()
    }

    /// Handle everything currently waiting on both inputs
    ///
    /// Returns the number of lines handled.
    pub fn poll_once(&mut self) -> usize {
        self.poll_once_at(Utc::now())
    }

    /// [`Collector::poll_once`] with an explicit time for log rotation
    pub fn poll_once_at(&mut self, now: DateTime<Utc>) -> usize {
        let mut handled = 0;

        while let Some(rx) = self.inbound.as_mut() {
            match rx.try_recv() {
                Ok(batch) => handled += self.handle_batch(batch, now),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    tracing::info!("request endpoint closed");
                    self.inbound = None;
                }
            }
        }

        while let Some(rx) = self.upstream.as_mut() {
            match rx.try_recv() {
                Ok(line) => {
                    self.handle_upstream(line, now);
                    handled += 1;
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    tracing::info!("upstream subscription closed");
                    self.upstream = None;
                }
            }
        }

        handled
    }

    /// Run until cancelled or both inputs are closed
    ///
    /// # Errors
    ///
    /// Returns `NoInput` if neither input was configured.
    pub async fn run(mut self, cancel: CancellationToken) -> Result<MetricsSnapshot> {
        if self.inbound.is_none() && self.upstream.is_none() {
            return Err(PipelineError::NoInput);
        }

        tracing::info!(
            inbound = self.inbound.is_some(),
            upstream = self.upstream.is_some(),
            publish = self.publisher.is_some(),
            persist = self.store.is_some(),
            "collector starting"
        );

        while self.inbound.is_some() || self.upstream.is_some() {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("collector cancelled");
                    break;
                }
                batch = recv_or_pending(&mut self.inbound) => match batch {
                    Some(batch) => {
                        self.handle_batch(batch, Utc::now());
                    }
                    None => {
                        tracing::info!("request endpoint closed");
                        self.inbound = None;
                    }
                },
                line = recv_or_pending(&mut self.upstream) => match line {
                    Some(line) => self.handle_upstream(line, Utc::now()),
                    None => {
                        tracing::info!("upstream subscription closed");
                        self.upstream = None;
                    }
                },
            }

            // Catch up on anything that queued while handling
            self.poll_once();
        }

        let snapshot = self.metrics.snapshot();
        tracing::info!(
            batches = snapshot.batches_received,
            lines = snapshot.lines_received,
            upstream_lines = snapshot.upstream_lines,
            published = snapshot.lines_published,
            persisted = snapshot.lines_persisted,
            persist_errors = snapshot.persist_errors,
            malformed = snapshot.malformed_lines,
            "collector stopped"
        );
        Ok(snapshot)
    }

    fn handle_batch(&mut self, batch: InboundBatch, now: DateTime<Utc>) -> usize {
        let peer = batch.peer;
        let (payload, delivered) = batch.acknowledge(ACK_PAYLOAD);
        if !delivered {
            self.metrics.record_reply_lost();
            tracing::debug!(peer = %peer, "ingester left before acknowledgment");
        }

        let lines: Vec<Bytes> = split_batch(&payload).collect();
        self.metrics.record_batch(lines.len() as u64);
        tracing::debug!(
            peer = %peer,
            source = first_source(&lines).unwrap_or("-"),
            lines = lines.len(),
            "batch received"
        );

        for line in &lines {
            self.handle_line(line, now);
        }
        lines.len()
    }

    fn handle_upstream(&mut self, line: Bytes, now: DateTime<Utc>) {
        self.metrics.record_upstream_line();
        self.handle_line(&line, now);
    }

    fn handle_line(&mut self, line: &Bytes, now: DateTime<Utc>) {
        if let Some(publisher) = &self.publisher {
            publisher.publish(line);
            self.metrics.record_published();
        }

        let Some(store) = self.store.as_mut() else {
            return;
        };
        match store.persist_at(line, now) {
            Ok(()) => self.metrics.record_persisted(),
            Err(linecast_sinks::SinkError::Malformed(reason)) => {
                self.metrics.record_malformed();
                tracing::warn!(
                    line = %String::from_utf8_lossy(line),
                    reason = %reason,
                    "malformed line not persisted"
                );
            }
            Err(e) => {
                self.metrics.record_persist_error();
                tracing::warn!(error = %e, "failed to persist line");
            }
        }
    }
}

/// Receive from an optional channel; a missing channel never yields
async fn recv_or_pending<T>(rx: &mut Option<mpsc::Receiver<T>>) -> Option<T> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

fn first_source(lines: &[Bytes]) -> Option<&str> {
    let first = lines.first()?;
    let text = std::str::from_utf8(first).ok()?;
    text.split(' ').next().filter(|s| !s.is_empty())
}

#[cfg(test)]
#[path = "collector_test.rs"]
mod collector_test;
