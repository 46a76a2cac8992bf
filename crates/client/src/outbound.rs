//! Outbound reliability buffer
//!
//! Holds every captured line until the collector acknowledges it, and
//! drives the uplink from the ingester's polling loop.
//!
//! # Window
//!
//! ```text
//!  oldest                                              newest
//!  ┌──────┬──────┬──────┬──────┬──────┬──────┬──────┐
//!  │ 0001 │ 0002 │ 0003 │ 0004 │ 0005 │ 0006 │ 0007 │
//!  └──────┴──────┴──────┴──────┴──────┴──────┴──────┘
//!  ◀──── sent_count = 4 ─────▶ queued after the send
//!        (in flight)
//! ```
//!
//! Each [`OutboundBuffer::tick`] runs four steps in order:
//!
//! 1. Evict entries older than the retention age from the head. Evicted
//!    in-flight entries shrink `sent_count`, so an ack never drops lines
//!    that were not part of the acknowledged batch.
//! 2. If the in-flight batch has waited longer than the ack timeout, treat
//!    the connection as dead and reconnect. The window is untouched, so the
//!    same lines go out again (duplicates are possible, loss is not).
//! 3. Poll for a reply without waiting. A non-empty reply drops the first
//!    `sent_count` entries.
//! 4. With nothing in flight, send the window as one batch.
//!
//! Transport errors close the connection; reconnects follow a backoff
//! schedule that doubles from `reconnect_interval` up to
//! `reconnect_interval_max` and resets on a successful connect.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, TimeDelta, Utc};
use linecast_protocol::{BatchBuilder, LineRecord, MAX_FRAME_SIZE};

use crate::uplink::Uplink;

/// Outbound buffer configuration
#[derive(Debug, Clone)]
pub struct OutboundConfig {
    /// Reconnect if a batch is not acknowledged within this time
    pub ack_timeout: Duration,

    /// Drop entries older than this, acknowledged or not
    pub retention: Duration,

    /// First reconnect delay after a failure
    pub reconnect_interval: Duration,

    /// Upper bound for the reconnect delay
    pub reconnect_interval_max: Duration,

    /// Upper bound for one serialized batch
    pub max_batch_bytes: usize,
}

impl Default for OutboundConfig {
    fn default() -> Self {
        Self {
            ack_timeout: Duration::from_secs(60),
            retention: Duration::from_secs(30 * 60),
            reconnect_interval: Duration::from_secs(1),
            reconnect_interval_max: Duration::from_secs(60),
            max_batch_bytes: MAX_FRAME_SIZE,
        }
    }
}

impl OutboundConfig {
    /// Set ack timeout
    #[must_use]
    pub fn with_ack_timeout(mut self, timeout: Duration) -> Self {
        self.ack_timeout = timeout;
        self
    }

    /// Set retention age
    #[must_use]
    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    /// Set reconnect backoff bounds
    #[must_use]
    pub fn with_reconnect_interval(mut self, initial: Duration, max: Duration) -> Self {
        self.reconnect_interval = initial;
        self.reconnect_interval_max = max;
        self
    }

    /// Set maximum batch size in bytes
    #[must_use]
    pub fn with_max_batch_bytes(mut self, bytes: usize) -> Self {
        self.max_batch_bytes = bytes;
        self
    }
}

/// Outbound buffer metrics
#[derive(Debug, Default)]
pub struct OutboundMetrics {
    lines_enqueued: AtomicU64,
    lines_evicted: AtomicU64,
    lines_acked: AtomicU64,
    batches_sent: AtomicU64,
    batches_acked: AtomicU64,
    bytes_sent: AtomicU64,
    ack_timeouts: AtomicU64,
    transport_errors: AtomicU64,
    reconnects: AtomicU64,
}

impl OutboundMetrics {
    #[inline]
    fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> OutboundMetricsSnapshot {
        OutboundMetricsSnapshot {
            lines_enqueued: self.lines_enqueued.load(Ordering::Relaxed),
            lines_evicted: self.lines_evicted.load(Ordering::Relaxed),
            lines_acked: self.lines_acked.load(Ordering::Relaxed),
            batches_sent: self.batches_sent.load(Ordering::Relaxed),
            batches_acked: self.batches_acked.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            ack_timeouts: self.ack_timeouts.load(Ordering::Relaxed),
            transport_errors: self.transport_errors.load(Ordering::Relaxed),
            reconnects: self.reconnects.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time snapshot of outbound metrics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutboundMetricsSnapshot {
    pub lines_enqueued: u64,
    pub lines_evicted: u64,
    pub lines_acked: u64,
    pub batches_sent: u64,
    pub batches_acked: u64,
    pub bytes_sent: u64,
    pub ack_timeouts: u64,
    pub transport_errors: u64,
    pub reconnects: u64,
}

/// Ordered, acknowledgment-tracked line window bound to one uplink
pub struct OutboundBuffer<U: Uplink> {
    uplink: U,
    config: OutboundConfig,

    window: VecDeque<LineRecord>,
    sent_count: usize,
    awaiting_since: Option<DateTime<Utc>>,

    backoff: Duration,
    next_connect: Option<DateTime<Utc>>,
    // Set once the first connect has been attempted
    attempted: bool,

    metrics: Arc<OutboundMetrics>,
}

impl<U: Uplink> OutboundBuffer<U> {
    /// Create a buffer; the uplink is connected on the first send
    pub fn new(uplink: U, config: OutboundConfig) -> Self {
        let backoff = config.reconnect_interval;
        Self {
            uplink,
            config,
            window: VecDeque::new(),
            sent_count: 0,
            awaiting_since: None,
            backoff,
            next_connect: None,
            attempted: false,
            metrics: Arc::new(OutboundMetrics::default()),
        }
    }

    /// Append a line to the window
    pub fn enqueue(&mut self, record: LineRecord) {
        OutboundMetrics::add(&self.metrics.lines_enqueued, 1);
        self.window.push_back(record);
    }

    /// Lines not yet acknowledged
    #[inline]
    pub fn len(&self) -> usize {
        self.window.len()
    }

    /// Whether every enqueued line has been acknowledged or evicted
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    /// Lines in the batch awaiting acknowledgment
    #[inline]
    pub fn sent_count(&self) -> usize {
        self.sent_count
    }

    /// Whether a batch is awaiting acknowledgment
    #[inline]
    pub fn is_awaiting_ack(&self) -> bool {
        self.awaiting_since.is_some()
    }

    /// Iterate over the window, oldest first
    pub fn window(&self) -> impl Iterator<Item = &LineRecord> {
        self.window.iter()
    }

    /// Shared metrics
    pub fn metrics(&self) -> Arc<OutboundMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Access the uplink
    pub fn uplink(&self) -> &U {
        &self.uplink
    }

    /// Run one evict / timeout / ack / send step
    pub async fn tick(&mut self, now: DateTime<Utc>) {
        self.evict_expired(now);

        if let Some(since) = self.awaiting_since {
            if now.signed_duration_since(since) > delta(self.config.ack_timeout) {
                tracing::warn!(
                    collector = %self.uplink.target(),
                    timeout_secs = self.config.ack_timeout.as_secs(),
                    queued = self.window.len(),
                    "no ack, reconnecting"
                );
                OutboundMetrics::add(&self.metrics.ack_timeouts, 1);
                self.drop_connection();
                // Reconnect right away, the connection looked alive
                self.next_connect = Some(now);
            } else {
                self.poll_ack();
                if self.awaiting_since.is_some() && !self.uplink.is_connected() {
                    self.connection_failed(now);
                }
            }
        }

        if self.awaiting_since.is_none() && !self.window.is_empty() {
            self.send_window(now).await;
        }
    }

    fn evict_expired(&mut self, now: DateTime<Utc>) {
        let Some(cutoff) = now.checked_sub_signed(delta(self.config.retention)) else {
            return;
        };

        let mut evicted = 0u64;
        while self
            .window
            .front()
            .is_some_and(|record| record.capture_time < cutoff)
        {
            self.window.pop_front();
            self.sent_count = self.sent_count.saturating_sub(1);
            evicted += 1;
        }

        if evicted > 0 {
            OutboundMetrics::add(&self.metrics.lines_evicted, evicted);
            tracing::warn!(
                evicted,
                queued = self.window.len(),
                "dropped lines older than retention"
            );
        }
    }

    fn poll_ack(&mut self) {
        match self.uplink.try_recv() {
            Ok(Some(reply)) if !reply.is_empty() => {
                let acked = self.sent_count.min(self.window.len());
                self.window.drain(..acked);
                self.sent_count = 0;
                self.awaiting_since = None;

                OutboundMetrics::add(&self.metrics.batches_acked, 1);
                OutboundMetrics::add(&self.metrics.lines_acked, acked as u64);
                tracing::trace!(acked, queued = self.window.len(), "batch acknowledged");
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(collector = %self.uplink.target(), error = %e, "uplink receive failed");
                OutboundMetrics::add(&self.metrics.transport_errors, 1);
                self.uplink.disconnect();
            }
        }
    }

    async fn send_window(&mut self, now: DateTime<Utc>) {
        if !self.uplink.is_connected() && !self.try_connect(now).await {
            return;
        }

        let (payload, count) = self.build_batch();
        let bytes = payload.len() as u64;

        match self.uplink.send(payload).await {
            Ok(()) => {
                self.sent_count = count;
                self.awaiting_since = Some(now);
                OutboundMetrics::add(&self.metrics.batches_sent, 1);
                OutboundMetrics::add(&self.metrics.bytes_sent, bytes);
                tracing::trace!(lines = count, bytes, "batch sent");
            }
            Err(e) => {
                tracing::warn!(collector = %self.uplink.target(), error = %e, "uplink send failed");
                OutboundMetrics::add(&self.metrics.transport_errors, 1);
                self.connection_failed(now);
            }
        }
    }

    /// Serialize the longest window prefix that fits in one batch
    fn build_batch(&self) -> (Bytes, usize) {
        let mut batch = BatchBuilder::new();
        let mut size = 0usize;

        for record in &self.window {
            let line = record.to_wire();
            let added = line.len() + usize::from(!batch.is_empty());
            if !batch.is_empty() && size + added > self.config.max_batch_bytes {
                break;
            }
            size += added;
            batch.push_line(&line);
        }

        let count = batch.count();
        (batch.finish(), count)
    }

    async fn try_connect(&mut self, now: DateTime<Utc>) -> bool {
        if self.next_connect.is_some_and(|at| now < at) {
            return false;
        }

        if self.attempted {
            OutboundMetrics::add(&self.metrics.reconnects, 1);
        }
        self.attempted = true;
        match self.uplink.connect().await {
            Ok(()) => {
                tracing::info!(
                    collector = %self.uplink.target(),
                    queued = self.window.len(),
                    "uplink connected"
                );
                self.backoff = self.config.reconnect_interval;
                self.next_connect = None;
                true
            }
            Err(e) => {
                tracing::warn!(
                    collector = %self.uplink.target(),
                    error = %e,
                    retry_secs = self.backoff.as_secs_f64(),
                    "uplink connect failed"
                );
                OutboundMetrics::add(&self.metrics.transport_errors, 1);
                self.schedule_reconnect(now);
                false
            }
        }
    }

    fn drop_connection(&mut self) {
        self.uplink.disconnect();
        self.awaiting_since = None;
        self.sent_count = 0;
    }

    fn connection_failed(&mut self, now: DateTime<Utc>) {
        self.drop_connection();
        self.schedule_reconnect(now);
    }

    fn schedule_reconnect(&mut self, now: DateTime<Utc>) {
        self.next_connect = Some(
            now.checked_add_signed(delta(self.backoff))
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        );
        self.backoff = (self.backoff * 2).min(self.config.reconnect_interval_max);
    }
}

fn delta(d: Duration) -> TimeDelta {
    TimeDelta::from_std(d).unwrap_or(TimeDelta::MAX)
}

#[cfg(test)]
#[path = "outbound_test.rs"]
mod outbound_test;
