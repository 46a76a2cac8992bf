//! Linecast - Sinks
//!
//! Persistence for collected lines.
//!
//! # Architecture
//!
//! The collector hands every accepted wire line to a [`LogStore`], which
//! keeps one [`RotatingLogWriter`] per source:
//!
//! ```text
//! [Collector] --wire line--> [LogStore] --body--> [RotatingLogWriter] --> log_<source>.log
//! ```
//!
//! Writes are synchronous and flushed per line. The collector runs a
//! single-threaded loop, so there is no writer task or channel in between.
//!
//! # Example
//!
//! ```ignore
//! use linecast_sinks::{LogStore, LogStoreConfig};
//!
//! let mut store = LogStore::new(LogStoreConfig::default().with_dir("/var/log/linecast"));
//! store.persist(b"koerkana1_4 00002A 2015-01-14T13:41:37.903Z 'Hello world'")?;
//! ```

mod error;

/// Per-source routing of wire lines to log files
pub mod log_store;

/// Append-only file with daily and external rotation
pub mod rotating_log;

pub use error::{Result, SinkError};
pub use log_store::{
    LogStore, LogStoreConfig, LogStoreMetrics, LogStoreMetricsSnapshot, log_file_name,
};
pub use rotating_log::{DEFAULT_BACKUP_COUNT, RotatingLogWriter};
