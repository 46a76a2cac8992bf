//! Rotating log writer tests

use chrono::TimeZone;
use tempfile::TempDir;

use super::*;

// =============================================================================
// Helpers
// =============================================================================

fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
}

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn read(path: &Path) -> String {
    fs::read_to_string(path).unwrap()
}

fn writer(dir: &TempDir, backup_count: usize) -> RotatingLogWriter {
    RotatingLogWriter::new(dir.path().join("log_koerkana1_4.log"), backup_count)
}

// =============================================================================
// Appending
// =============================================================================

#[test]
fn test_append_creates_file_lazily() {
    let dir = TempDir::new().unwrap();
    let mut log = writer(&dir, DEFAULT_BACKUP_COUNT);
    assert!(!log.is_open());
    assert!(!log.path().exists());

    log.append_at("2015-01-14T13:41:37.903Z 'Hello world'", at(2015, 1, 14, 13))
        .unwrap();
    log.append_at("x2015-01-14T13:41:38.112Z 'Hello wo'", at(2015, 1, 14, 13))
        .unwrap();

    assert!(log.is_open());
    assert_eq!(
        read(log.path()),
        "2015-01-14T13:41:37.903Z 'Hello world'\nx2015-01-14T13:41:38.112Z 'Hello wo'\n"
    );
}

#[test]
fn test_append_is_visible_without_close() {
    let dir = TempDir::new().unwrap();
    let mut log = writer(&dir, DEFAULT_BACKUP_COUNT);

    log.append("one").unwrap();

    // Flushed on every write
    assert_eq!(read(log.path()), "one\n");
}

#[test]
fn test_append_keeps_existing_content() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("log_koerkana1_4.log");
    fs::write(&path, "earlier\n").unwrap();

    let mut log = RotatingLogWriter::new(&path, DEFAULT_BACKUP_COUNT);
    log.append_at("later", at(2015, 1, 14, 0)).unwrap();

    assert_eq!(read(&path), "earlier\nlater\n");
}

#[test]
fn test_file_from_earlier_day_rotated_before_first_append() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("log_koerkana1_4.log");
    fs::write(&path, "old\n").unwrap();
    fs::File::options()
        .write(true)
        .open(&path)
        .unwrap()
        .set_modified(std::time::SystemTime::from(at(2015, 1, 13, 22)))
        .unwrap();

    let mut log = RotatingLogWriter::new(&path, DEFAULT_BACKUP_COUNT);
    log.append_at("today-1", at(2015, 1, 14, 8)).unwrap();
    log.append_at("today-2", at(2015, 1, 14, 9)).unwrap();

    assert_eq!(read(&log.rotated_path(day(2015, 1, 13))), "old\n");
    assert_eq!(read(&path), "today-1\ntoday-2\n");
}

#[test]
fn test_open_failure_reported() {
    let dir = TempDir::new().unwrap();
    let mut log = RotatingLogWriter::new(dir.path().join("missing/dir/log_a.log"), 0);

    let err = log.append("x").unwrap_err();
    assert!(matches!(err, SinkError::Open { .. }));
    assert!(!log.is_open());
}

// =============================================================================
// External rotation
// =============================================================================

#[test]
fn test_reopens_after_external_rename() {
    let dir = TempDir::new().unwrap();
    let mut log = writer(&dir, DEFAULT_BACKUP_COUNT);
    let moved = dir.path().join("log_koerkana1_4.log.1");

    log.append_at("first", at(2015, 1, 14, 10)).unwrap();
    fs::rename(log.path(), &moved).unwrap();
    log.append_at("second", at(2015, 1, 14, 10)).unwrap();

    assert_eq!(read(&moved), "first\n");
    assert_eq!(read(log.path()), "second\n");
}

#[test]
fn test_reopens_after_delete() {
    let dir = TempDir::new().unwrap();
    let mut log = writer(&dir, DEFAULT_BACKUP_COUNT);

    log.append_at("first", at(2015, 1, 14, 10)).unwrap();
    fs::remove_file(log.path()).unwrap();
    log.append_at("second", at(2015, 1, 14, 10)).unwrap();

    assert_eq!(read(log.path()), "second\n");
}

#[cfg(unix)]
#[test]
fn test_reopens_after_copy_replace() {
    let dir = TempDir::new().unwrap();
    let mut log = writer(&dir, DEFAULT_BACKUP_COUNT);

    log.append_at("first", at(2015, 1, 14, 10)).unwrap();

    // New inode at the same path
    let staged = dir.path().join("staged");
    fs::write(&staged, "").unwrap();
    fs::rename(&staged, log.path()).unwrap();

    log.append_at("second", at(2015, 1, 14, 10)).unwrap();
    assert_eq!(read(log.path()), "second\n");
}

// =============================================================================
// Daily rotation
// =============================================================================

#[test]
fn test_rotated_path_format() {
    let log = RotatingLogWriter::new("/var/log/log_a_1.log", 3);
    assert_eq!(
        log.rotated_path(day(2015, 1, 14)),
        PathBuf::from("/var/log/log_a_1.log.2015-01-14")
    );
}

#[test]
fn test_rotates_at_utc_midnight() {
    let dir = TempDir::new().unwrap();
    let mut log = writer(&dir, DEFAULT_BACKUP_COUNT);

    log.append_at("monday", at(2015, 1, 12, 23)).unwrap();
    log.append_at("still monday", at(2015, 1, 12, 23)).unwrap();
    log.append_at("tuesday", at(2015, 1, 13, 0)).unwrap();

    assert_eq!(
        read(&log.rotated_path(day(2015, 1, 12))),
        "monday\nstill monday\n"
    );
    assert_eq!(read(log.path()), "tuesday\n");
}

#[test]
fn test_rotation_skips_quiet_days() {
    let dir = TempDir::new().unwrap();
    let mut log = writer(&dir, DEFAULT_BACKUP_COUNT);

    log.append_at("a", at(2015, 1, 10, 8)).unwrap();
    log.append_at("b", at(2015, 1, 14, 8)).unwrap();

    assert_eq!(read(&log.rotated_path(day(2015, 1, 10))), "a\n");
    assert!(!log.rotated_path(day(2015, 1, 13)).exists());
}

#[test]
fn test_old_rotations_pruned() {
    let dir = TempDir::new().unwrap();
    let mut log = writer(&dir, 2);

    for d in 10..=14 {
        log.append_at(&format!("day {d}"), at(2015, 1, d, 12)).unwrap();
    }

    assert!(!log.rotated_path(day(2015, 1, 10)).exists());
    assert!(!log.rotated_path(day(2015, 1, 11)).exists());
    assert!(log.rotated_path(day(2015, 1, 12)).exists());
    assert!(log.rotated_path(day(2015, 1, 13)).exists());
    assert_eq!(read(log.path()), "day 14\n");
}

#[test]
fn test_zero_backup_count_keeps_everything() {
    let dir = TempDir::new().unwrap();
    let mut log = writer(&dir, 0);

    for d in 10..=13 {
        log.append_at("x", at(2015, 1, d, 12)).unwrap();
    }

    for d in 10..=12 {
        assert!(log.rotated_path(day(2015, 1, d)).exists());
    }
}

#[test]
fn test_prune_ignores_unrelated_files() {
    let dir = TempDir::new().unwrap();
    let other = dir.path().join("log_koerkana1_4.log.1");
    fs::write(&other, "kept").unwrap();
    let mut log = writer(&dir, 1);

    log.append_at("a", at(2015, 1, 10, 12)).unwrap();
    log.append_at("b", at(2015, 1, 11, 12)).unwrap();
    log.append_at("c", at(2015, 1, 12, 12)).unwrap();

    assert!(other.exists());
    assert!(!log.rotated_path(day(2015, 1, 10)).exists());
    assert!(log.rotated_path(day(2015, 1, 11)).exists());
}
