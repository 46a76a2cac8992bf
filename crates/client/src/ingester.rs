//! Serial ingester loop
//!
//! One loop per serial port:
//!
//! ```text
//! SerialLink ─bytes─▶ LineFramer ─line─▶ BootClock ─stamp─▶ LineRecord ─▶ OutboundBuffer
//!                         │                                      ▲
//!                         └──── stale partial line (broken) ─────┘
//! ```
//!
//! The sequence counter belongs to the ingester and survives serial
//! reopens. On reopen a pending partial line is emitted as broken and the
//! boot clock is reset, since the device may have rebooted.

use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use linecast_protocol::{LineRecord, SourceId};
use linecast_sources::{BootClock, ByteSource, DEFAULT_IDLE_FLUSH, LineFramer, SerialRead};
use tokio_util::sync::CancellationToken;

use crate::outbound::{OutboundBuffer, OutboundMetricsSnapshot};
use crate::uplink::Uplink;

/// Ingester loop settings
#[derive(Debug, Clone)]
pub struct IngesterConfig {
    /// Emit a partial line as broken after this long without data
    pub idle_flush: Duration,

    /// Loop period
    pub poll_interval: Duration,

    /// Maximum bytes taken from the port per poll
    pub read_chunk: usize,
}

impl Default for IngesterConfig {
    fn default() -> Self {
        Self {
            idle_flush: DEFAULT_IDLE_FLUSH,
            poll_interval: Duration::from_millis(10),
            read_chunk: 1000,
        }
    }
}

/// Reads one byte source and delivers its lines through an outbound buffer
pub struct Ingester<S: ByteSource, U: Uplink> {
    input: S,
    framer: LineFramer,
    clock: BootClock,
    buffer: OutboundBuffer<U>,
    source_id: SourceId,
    sequence: u32,
    config: IngesterConfig,
    read_buf: Vec<u8>,
}

impl<S: ByteSource, U: Uplink> Ingester<S, U> {
    /// Create an ingester
    pub fn new(
        source_id: SourceId,
        input: S,
        clock: BootClock,
        buffer: OutboundBuffer<U>,
        config: IngesterConfig,
    ) -> Self {
        let read_buf = vec![0u8; config.read_chunk.max(1)];
        Self {
            input,
            framer: LineFramer::new(),
            clock,
            buffer,
            source_id,
            sequence: 0,
            config,
            read_buf,
        }
    }

    /// Source identifier stamped on every line
    pub fn source_id(&self) -> &SourceId {
        &self.source_id
    }

    /// Sequence number the next line will get
    pub fn next_sequence(&self) -> u32 {
        self.sequence
    }

    /// The outbound buffer
    pub fn buffer(&self) -> &OutboundBuffer<U> {
        &self.buffer
    }

    /// Run one read / frame / stamp / tick step
    pub async fn poll_once(&mut self, now: DateTime<Utc>) {
        match self.input.poll_read(&mut self.read_buf, now) {
            SerialRead::Data(n) => {
                tracing::trace!(bytes = n, "serial data");
                self.framer.put(&self.read_buf[..n], now);
                while let Some(line) = self.framer.next_line() {
                    let stamp = self.clock.observe(&line, now);
                    self.push(line, now, stamp.time, stamp.broken);
                }
            }
            SerialRead::Reopened => {
                if let Some(partial) = self.framer.take_partial() {
                    tracing::debug!(bytes = partial.len(), "partial line flushed on reopen");
                    self.push(partial, now, now, true);
                }
                self.clock.reset();
            }
            SerialRead::Empty | SerialRead::Unavailable => {}
        }

        if let Some(partial) = self.framer.take_stale(now, self.config.idle_flush) {
            self.push(partial, now, now, true);
        }

        self.buffer.tick(now).await;
    }

    /// Poll until cancelled
    pub async fn run(mut self, cancel: CancellationToken) -> OutboundMetricsSnapshot {
        tracing::info!(source = %self.source_id, "ingester starting");

        let mut interval = tokio::time::interval(self.config.poll_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => self.poll_once(Utc::now()).await,
            }
        }

        let snapshot = self.buffer.metrics().snapshot();
        tracing::info!(
            source = %self.source_id,
            lines_enqueued = snapshot.lines_enqueued,
            lines_acked = snapshot.lines_acked,
            lines_evicted = snapshot.lines_evicted,
            batches_sent = snapshot.batches_sent,
            reconnects = snapshot.reconnects,
            unacked = self.buffer.len(),
            "ingester stopped"
        );
        snapshot
    }

    fn push(&mut self, raw_text: Bytes, captured: DateTime<Utc>, corrected: DateTime<Utc>, broken: bool) {
        let record = LineRecord {
            source_id: self.source_id.clone(),
            sequence: self.sequence,
            raw_text,
            capture_time: captured,
            corrected_time: corrected,
            broken,
        };
        self.sequence = self.sequence.wrapping_add(1);
        self.buffer.enqueue(record);
    }
}

/// Source id for this host and serial port
pub fn local_source_id(portname: &str) -> SourceId {
    let host = hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "localhost".to_string());
    SourceId::from_parts(&host, portname)
}

#[cfg(test)]
#[path = "ingester_test.rs"]
mod ingester_test;
