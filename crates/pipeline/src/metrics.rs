//! Collector loop metrics
//!
//! Atomic counters, relaxed ordering. Read them through
//! [`CollectorMetrics::snapshot`].

use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics for the collector loop
#[derive(Debug, Default)]
pub struct CollectorMetrics {
    /// Batches taken from the request endpoint
    batches_received: AtomicU64,

    /// Lines in those batches
    lines_received: AtomicU64,

    /// Lines taken from the upstream subscription
    upstream_lines: AtomicU64,

    /// Lines handed to the publisher
    lines_published: AtomicU64,

    /// Lines appended to a source log
    lines_persisted: AtomicU64,

    /// Appends that failed
    persist_errors: AtomicU64,

    /// Lines without source, sequence and body
    malformed_lines: AtomicU64,

    /// Acknowledgments whose connection was already gone
    replies_lost: AtomicU64,
}

impl CollectorMetrics {
    /// Create new metrics instance with all counters at zero
    #[inline]
    pub const fn new() -> Self {
        Self {
            batches_received: AtomicU64::new(0),
            lines_received: AtomicU64::new(0),
            upstream_lines: AtomicU64::new(0),
            lines_published: AtomicU64::new(0),
            lines_persisted: AtomicU64::new(0),
            persist_errors: AtomicU64::new(0),
            malformed_lines: AtomicU64::new(0),
            replies_lost: AtomicU64::new(0),
        }
    }

    #[inline]
    pub(crate) fn record_batch(&self, lines: u64) {
        self.batches_received.fetch_add(1, Ordering::Relaxed);
        self.lines_received.fetch_add(lines, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_upstream_line(&self) {
        self.upstream_lines.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_published(&self) {
        self.lines_published.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_persisted(&self) {
        self.lines_persisted.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_persist_error(&self) {
        self.persist_errors.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_malformed(&self) {
        self.malformed_lines.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_reply_lost(&self) {
        self.replies_lost.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a snapshot of all metrics
    #[inline]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            batches_received: self.batches_received.load(Ordering::Relaxed),
            lines_received: self.lines_received.load(Ordering::Relaxed),
            upstream_lines: self.upstream_lines.load(Ordering::Relaxed),
            lines_published: self.lines_published.load(Ordering::Relaxed),
            lines_persisted: self.lines_persisted.load(Ordering::Relaxed),
            persist_errors: self.persist_errors.load(Ordering::Relaxed),
            malformed_lines: self.malformed_lines.load(Ordering::Relaxed),
            replies_lost: self.replies_lost.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time snapshot of collector metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    pub batches_received: u64,
    pub lines_received: u64,
    pub upstream_lines: u64,
    pub lines_published: u64,
    pub lines_persisted: u64,
    pub persist_errors: u64,
    pub malformed_lines: u64,
    pub replies_lost: u64,
}

impl MetricsSnapshot {
    /// Lines from both inputs
    #[inline]
    pub fn total_lines(&self) -> u64 {
        self.lines_received + self.upstream_lines
    }
}
