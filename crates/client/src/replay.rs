//! Log replay
//!
//! Re-delivers a persisted per-source log file to a collector. Each stored
//! line (`[x]<timestamp> <quoted-line>`) becomes a fresh [`LineRecord`]
//! with a new sequence starting at 1 and goes through the same outbound
//! buffer as live serial data, so replay gets the same ack and retry
//! behaviour.
//!
//! The file is read in chunks: a chunk is enqueued only when the window has
//! drained below the chunk size, so large files never sit in memory whole.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use linecast_protocol::{LineRecord, ProtocolError, SourceId, parse_timestamp, unquote};
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader, Lines};
use tokio_util::sync::CancellationToken;

use crate::error::{Result, UplinkError};
use crate::outbound::OutboundBuffer;
use crate::uplink::Uplink;

const LOG_PREFIX: &str = "log_";
const LOG_SUFFIX: &str = ".log";

/// Replay settings
#[derive(Debug, Clone)]
pub struct ReplayConfig {
    /// Lines read from the file per refill
    pub chunk_lines: usize,

    /// Loop period
    pub poll_interval: Duration,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            chunk_lines: 1000,
            poll_interval: Duration::from_millis(10),
        }
    }
}

/// Replay progress counters
#[derive(Debug, Default)]
pub struct ReplayMetrics {
    lines_read: AtomicU64,
    lines_skipped: AtomicU64,
}

impl ReplayMetrics {
    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> ReplayMetricsSnapshot {
        ReplayMetricsSnapshot {
            lines_read: self.lines_read.load(Ordering::Relaxed),
            lines_skipped: self.lines_skipped.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time snapshot of replay metrics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayMetricsSnapshot {
    pub lines_read: u64,
    pub lines_skipped: u64,
}

/// Derive the source id from a `log_<source_id>.log` file name
pub fn source_from_path(path: &Path) -> Option<SourceId> {
    let name = path.file_name()?.to_str()?;
    let id = name.strip_prefix(LOG_PREFIX)?.strip_suffix(LOG_SUFFIX)?;
    (!id.is_empty()).then(|| SourceId::new(id))
}

/// Rebuild a line record from one persisted log line
///
/// The stored timestamp becomes the corrected time; `captured` is used as
/// capture time so retention counts from the replay, not from the
/// original capture.
///
/// # Errors
///
/// Returns an error if the timestamp or quoted text is malformed.
pub fn parse_persisted_line(
    source_id: &SourceId,
    sequence: u32,
    line: &str,
    captured: DateTime<Utc>,
) -> std::result::Result<LineRecord, ProtocolError> {
    let (timestamp, quoted) = line
        .split_once(' ')
        .ok_or_else(|| ProtocolError::malformed("missing quoted line"))?;

    let (broken, timestamp) = match timestamp.strip_prefix('x') {
        Some(rest) => (true, rest),
        None => (false, timestamp),
    };

    Ok(LineRecord {
        source_id: source_id.clone(),
        sequence,
        raw_text: unquote(quoted)?.into(),
        capture_time: captured,
        corrected_time: parse_timestamp(timestamp)?,
        broken,
    })
}

/// Delivers one persisted log file through an outbound buffer
pub struct Replay<U: Uplink> {
    lines: Option<Lines<BufReader<File>>>,
    buffer: OutboundBuffer<U>,
    source_id: SourceId,
    sequence: u32,
    config: ReplayConfig,
    metrics: Arc<ReplayMetrics>,
}

impl<U: Uplink> Replay<U> {
    /// Open `path` for replay
    ///
    /// The source id is taken from the file name unless `source_id` is
    /// given.
    ///
    /// # Errors
    ///
    /// Returns `InvalidLogName` if no source id is given and the file name
    /// does not match `log_<source_id>.log`, or `ReplayOpen` if the file
    /// cannot be opened.
    pub async fn open(
        path: &Path,
        source_id: Option<SourceId>,
        buffer: OutboundBuffer<U>,
        config: ReplayConfig,
    ) -> Result<Self> {
        let source_id = match source_id {
            Some(id) => id,
            None => source_from_path(path)
                .ok_or_else(|| UplinkError::InvalidLogName(path.display().to_string()))?,
        };

        let file = File::open(path).await.map_err(|source| UplinkError::ReplayOpen {
            path: path.display().to_string(),
            source,
        })?;

        Ok(Self {
            lines: Some(BufReader::new(file).lines()),
            buffer,
            source_id,
            sequence: 1,
            config,
            metrics: Arc::new(ReplayMetrics::default()),
        })
    }

    /// Source id stamped on replayed lines
    pub fn source_id(&self) -> &SourceId {
        &self.source_id
    }

    /// The outbound buffer
    pub fn buffer(&self) -> &OutboundBuffer<U> {
        &self.buffer
    }

    /// Shared metrics
    pub fn metrics(&self) -> Arc<ReplayMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Whether the whole file has been read and acknowledged
    pub fn is_finished(&self) -> bool {
        self.lines.is_none() && self.buffer.is_empty()
    }

    /// Refill the window if it has drained, then tick the buffer
    ///
    /// Returns `true` once everything has been delivered.
    ///
    /// # Errors
    ///
    /// Returns an error if reading the file fails.
    pub async fn step(&mut self, now: DateTime<Utc>) -> Result<bool> {
        if self.buffer.len() < self.config.chunk_lines {
            self.refill(now).await?;
        }
        self.buffer.tick(now).await;
        Ok(self.is_finished())
    }

    /// Step until finished or cancelled
    ///
    /// # Errors
    ///
    /// Returns an error if reading the file fails.
    pub async fn run(mut self, cancel: CancellationToken) -> Result<ReplayMetricsSnapshot> {
        tracing::info!(source = %self.source_id, "replay starting");

        let mut interval = tokio::time::interval(self.config.poll_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::warn!(
                        source = %self.source_id,
                        unacked = self.buffer.len(),
                        "replay cancelled"
                    );
                    break;
                }
                _ = interval.tick() => {
                    if self.step(Utc::now()).await? {
                        break;
                    }
                }
            }
        }

        let snapshot = self.metrics.snapshot();
        tracing::info!(
            source = %self.source_id,
            lines_read = snapshot.lines_read,
            lines_skipped = snapshot.lines_skipped,
            lines_acked = self.buffer.metrics().snapshot().lines_acked,
            "replay finished"
        );
        Ok(snapshot)
    }

    async fn refill(&mut self, now: DateTime<Utc>) -> Result<()> {
        let Some(lines) = self.lines.as_mut() else {
            return Ok(());
        };

        for _ in 0..self.config.chunk_lines {
            let Some(line) = lines.next_line().await? else {
                tracing::debug!(source = %self.source_id, "end of replay file");
                self.lines = None;
                return Ok(());
            };

            let line = line.trim_end();
            if line.is_empty() {
                continue;
            }

            match parse_persisted_line(&self.source_id, self.sequence, line, now) {
                Ok(record) => {
                    self.sequence = self.sequence.wrapping_add(1);
                    self.metrics.lines_read.fetch_add(1, Ordering::Relaxed);
                    self.buffer.enqueue(record);
                }
                Err(e) => {
                    self.metrics.lines_skipped.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(source = %self.source_id, error = %e, "skipping malformed log line");
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "replay_test.rs"]
mod replay_test;
