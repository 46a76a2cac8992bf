//! Per-source log store
//!
//! Routes wire lines to one [`RotatingLogWriter`] per source id. Writers
//! are created on the first line from a source and live for the lifetime
//! of the store.
//!
//! A wire line is stored without its source and sequence tokens:
//!
//! ```text
//! wire:   koerkana1_4 00002A 2015-01-14T13:41:37.903Z 'Hello world'
//! stored: 2015-01-14T13:41:37.903Z 'Hello world'      -> log_koerkana1_4.log
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use linecast_protocol::WireLine;

use crate::error::{Result, SinkError};
use crate::rotating_log::{DEFAULT_BACKUP_COUNT, RotatingLogWriter};

/// Log store configuration
#[derive(Debug, Clone)]
pub struct LogStoreConfig {
    /// Directory holding the per-source files
    pub dir: PathBuf,

    /// Daily rotations kept per source
    pub backup_count: usize,
}

impl Default for LogStoreConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("."),
            backup_count: DEFAULT_BACKUP_COUNT,
        }
    }
}

impl LogStoreConfig {
    /// Set the output directory
    #[must_use]
    pub fn with_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dir = dir.into();
        self
    }

    /// Set the number of rotations kept
    #[must_use]
    pub fn with_backup_count(mut self, count: usize) -> Self {
        self.backup_count = count;
        self
    }
}

/// Log store metrics
#[derive(Debug, Default)]
pub struct LogStoreMetrics {
    lines_written: AtomicU64,
    bytes_written: AtomicU64,
    malformed_lines: AtomicU64,
    write_errors: AtomicU64,
    files_opened: AtomicU64,
}

impl LogStoreMetrics {
    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> LogStoreMetricsSnapshot {
        LogStoreMetricsSnapshot {
            lines_written: self.lines_written.load(Ordering::Relaxed),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
            malformed_lines: self.malformed_lines.load(Ordering::Relaxed),
            write_errors: self.write_errors.load(Ordering::Relaxed),
            files_opened: self.files_opened.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time snapshot of log store metrics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LogStoreMetricsSnapshot {
    pub lines_written: u64,
    pub bytes_written: u64,
    pub malformed_lines: u64,
    pub write_errors: u64,
    pub files_opened: u64,
}

/// File name for a source's active log
///
/// Anything outside `[A-Za-z0-9._-]` is replaced with `_` so a source id
/// can never escape the log directory.
pub fn log_file_name(source_id: &str) -> String {
    let safe: String = source_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("log_{safe}.log")
}

/// Owned map of per-source rotating writers
#[derive(Debug)]
pub struct LogStore {
    config: LogStoreConfig,
    writers: HashMap<String, RotatingLogWriter>,
    metrics: Arc<LogStoreMetrics>,
}

impl LogStore {
    /// Create a store; files are created as sources appear
    pub fn new(config: LogStoreConfig) -> Self {
        Self {
            config,
            writers: HashMap::new(),
            metrics: Arc::new(LogStoreMetrics::default()),
        }
    }

    /// Output directory
    pub fn dir(&self) -> &Path {
        &self.config.dir
    }

    /// Path of a source's active log
    pub fn path_for(&self, source_id: &str) -> PathBuf {
        self.config.dir.join(log_file_name(source_id))
    }

    /// Number of sources seen so far
    pub fn source_count(&self) -> usize {
        self.writers.len()
    }

    /// Shared metrics
    pub fn metrics(&self) -> Arc<LogStoreMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Store one wire line
    ///
    /// # Errors
    ///
    /// Returns `Malformed` for lines without source, sequence and body, or
    /// the writer's error if the append fails. Both are counted.
    pub fn persist(&mut self, line: &[u8]) -> Result<()> {
        self.persist_at(line, Utc::now())
    }

    /// Store one wire line with an explicit time for the rotation check
    ///
    /// # Errors
    ///
    /// See [`LogStore::persist`].
    pub fn persist_at(&mut self, line: &[u8], now: DateTime<Utc>) -> Result<()> {
        let parsed = std::str::from_utf8(line)
            .ok()
            .and_then(WireLine::split_header);
        let Some((source_id, _sequence, body)) = parsed else {
            self.metrics.malformed_lines.fetch_add(1, Ordering::Relaxed);
            return Err(SinkError::malformed("expected source, sequence and body"));
        };

        let config = &self.config;
        let metrics = &self.metrics;
        let writer = self
            .writers
            .entry(source_id.to_string())
            .or_insert_with(|| {
                let path = config.dir.join(log_file_name(source_id));
                tracing::info!(source = source_id, path = %path.display(), "new source");
                metrics.files_opened.fetch_add(1, Ordering::Relaxed);
                RotatingLogWriter::new(path, config.backup_count)
            });

        match writer.append_at(body, now) {
            Ok(()) => {
                self.metrics.lines_written.fetch_add(1, Ordering::Relaxed);
                self.metrics
                    .bytes_written
                    .fetch_add(body.len() as u64 + 1, Ordering::Relaxed);
                Ok(())
            }
            Err(e) => {
                self.metrics.write_errors.fetch_add(1, Ordering::Relaxed);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
#[path = "log_store_test.rs"]
mod log_store_test;
