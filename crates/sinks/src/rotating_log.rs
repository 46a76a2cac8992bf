//! Rotating append-only log file
//!
//! One writer per source. Every append is flushed before returning, so a
//! line acknowledged by the collector is in the page cache by the time the
//! next batch is read.
//!
//! # Rotation
//!
//! Two kinds of rotation are handled:
//!
//! - **Daily (built in)**: the first append after a UTC day boundary moves
//!   the active file to `<name>.<YYYY-MM-DD>` (the day the contents belong
//!   to) and starts a new one. Only the newest `backup_count` rotations are
//!   kept.
//! - **External** (logrotate, `rm`, `mv`): before every write the open
//!   handle's device/inode is compared with whatever is at the path now. On
//!   a mismatch, or if the path is gone, the file is reopened.
//!
//! ```text
//! log_koerkana1_4.log              <- active
//! log_koerkana1_4.log.2015-01-14
//! log_koerkana1_4.log.2015-01-13
//! ```

use std::fs::{self, File, Metadata, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, Utc};

use crate::error::{Result, SinkError};

/// Default number of daily rotations kept
pub const DEFAULT_BACKUP_COUNT: usize = 14;

/// Date suffix of rotated files
const ROTATION_SUFFIX_FORMAT: &str = "%Y-%m-%d";

/// Device and inode of an open file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileIdentity {
    dev: u64,
    ino: u64,
}

impl FileIdentity {
    #[cfg(unix)]
    fn of(meta: &Metadata) -> Option<Self> {
        use std::os::unix::fs::MetadataExt;
        Some(Self {
            dev: meta.dev(),
            ino: meta.ino(),
        })
    }

    // Only a vanished file is detected here
    #[cfg(not(unix))]
    fn of(_meta: &Metadata) -> Option<Self> {
        None
    }
}

/// Append-only log file with daily and external rotation
#[derive(Debug)]
pub struct RotatingLogWriter {
    path: PathBuf,
    backup_count: usize,
    file: Option<File>,
    identity: Option<FileIdentity>,
    day: Option<NaiveDate>,
}

impl RotatingLogWriter {
    /// Create a writer for `path`; the file is opened on the first append
    ///
    /// `backup_count` of 0 keeps every rotation.
    pub fn new(path: impl Into<PathBuf>, backup_count: usize) -> Self {
        Self {
            path: path.into(),
            backup_count,
            file: None,
            identity: None,
            day: None,
        }
    }

    /// Active file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether a handle is currently open
    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }

    /// Path the active file is moved to when `day` is rotated out
    pub fn rotated_path(&self, day: NaiveDate) -> PathBuf {
        let mut name = self.path.as_os_str().to_os_string();
        name.push(".");
        name.push(day.format(ROTATION_SUFFIX_FORMAT).to_string());
        PathBuf::from(name)
    }

    /// Append `text` and a newline, then flush
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened, rotated or written.
    pub fn append(&mut self, text: &str) -> Result<()> {
        self.append_at(text, Utc::now())
    }

    /// Append with an explicit wall-clock time for the rotation check
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened, rotated or written.
    pub fn append_at(&mut self, text: &str, now: DateTime<Utc>) -> Result<()> {
        let today = now.date_naive();
        if self.day.is_none() {
            self.day = self.existing_day(today);
        }
        if let Some(day) = self.day
            && day < today
        {
            self.rotate(day)?;
            self.day = Some(today);
        }

        self.ensure_open(today)?;
        let Some(file) = self.file.as_mut() else {
            return Err(SinkError::Io(ErrorKind::NotConnected.into()));
        };

        let result = file
            .write_all(text.as_bytes())
            .and_then(|()| file.write_all(b"\n"))
            .and_then(|()| file.flush());

        if let Err(e) = result {
            // Next append starts from a fresh handle
            self.close();
            return Err(e.into());
        }
        Ok(())
    }

    /// Close the handle; the next append reopens
    pub fn close(&mut self) {
        self.file = None;
        self.identity = None;
    }

    /// Day of the file already on disk, before anything is written to it
    fn existing_day(&self, today: NaiveDate) -> Option<NaiveDate> {
        match fs::metadata(&self.path) {
            Ok(meta) => Some(content_day(&meta, today)),
            Err(e) if e.kind() == ErrorKind::NotFound => Some(today),
            // Decided once the file is opened
            Err(_) => None,
        }
    }

    fn ensure_open(&mut self, today: NaiveDate) -> Result<()> {
        if self.file.is_some() {
            match fs::metadata(&self.path) {
                Ok(meta) if FileIdentity::of(&meta) == self.identity => return Ok(()),
                Ok(_) => {
                    tracing::debug!(path = %self.path.display(), "log file replaced, reopening");
                }
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    tracing::debug!(path = %self.path.display(), "log file removed, reopening");
                }
                Err(e) => {
                    tracing::debug!(path = %self.path.display(), error = %e, "log file stat failed, reopening");
                }
            }
            self.close();
        }

        let open_err = |source| SinkError::Open {
            path: self.path.clone(),
            source,
        };
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(open_err)?;
        let meta = file.metadata().map_err(open_err)?;

        if self.day.is_none() {
            self.day = Some(content_day(&meta, today));
        }
        self.identity = FileIdentity::of(&meta);
        self.file = Some(file);
        Ok(())
    }

    fn rotate(&mut self, day: NaiveDate) -> Result<()> {
        self.close();

        let target = self.rotated_path(day);
        match fs::rename(&self.path, &target) {
            Ok(()) => {
                tracing::info!(
                    path = %self.path.display(),
                    rotated = %target.display(),
                    "log file rotated"
                );
            }
            // Nothing written since the file was moved away externally
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(source) => {
                return Err(SinkError::Rotate {
                    path: self.path.clone(),
                    source,
                });
            }
        }

        self.prune();
        Ok(())
    }

    /// Delete the oldest rotations beyond `backup_count`
    fn prune(&self) {
        if self.backup_count == 0 {
            return;
        }

        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        let Some(name) = self.path.file_name().and_then(|n| n.to_str()) else {
            return;
        };
        let prefix = format!("{name}.");

        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(dir = %dir.display(), error = %e, "cannot list rotated logs");
                return;
            }
        };

        let mut rotated: Vec<(NaiveDate, PathBuf)> = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let file_name = entry.file_name();
                let suffix = file_name.to_str()?.strip_prefix(&prefix)?;
                let day = NaiveDate::parse_from_str(suffix, ROTATION_SUFFIX_FORMAT).ok()?;
                Some((day, entry.path()))
            })
            .collect();

        if rotated.len() <= self.backup_count {
            return;
        }

        rotated.sort_unstable_by_key(|(day, _)| *day);
        let excess = rotated.len() - self.backup_count;
        for (_, path) in rotated.into_iter().take(excess) {
            if let Err(e) = fs::remove_file(&path) {
                tracing::warn!(path = %path.display(), error = %e, "failed to delete old log");
            }
        }
    }
}

/// Day an existing file's contents belong to
///
/// A non-empty file from an earlier run is dated by its mtime, so it is
/// rotated out before the first append of a later day is written.
fn content_day(meta: &Metadata, today: NaiveDate) -> NaiveDate {
    if meta.len() == 0 {
        return today;
    }
    meta.modified()
        .map(|mtime| DateTime::<Utc>::from(mtime).date_naive().min(today))
        .unwrap_or(today)
}

#[cfg(test)]
#[path = "rotating_log_test.rs"]
mod rotating_log_test;
