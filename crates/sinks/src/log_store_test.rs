//! Log store tests

use std::fs;

use chrono::TimeZone;
use tempfile::TempDir;

use super::*;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2015, 1, 14, 13, 41, 40).unwrap()
}

fn store(dir: &TempDir) -> LogStore {
    LogStore::new(LogStoreConfig::default().with_dir(dir.path()))
}

// =============================================================================
// Config and naming
// =============================================================================

#[test]
fn test_config_defaults() {
    let config = LogStoreConfig::default();
    assert_eq!(config.dir, PathBuf::from("."));
    assert_eq!(config.backup_count, 14);
}

#[test]
fn test_config_builders() {
    let config = LogStoreConfig::default()
        .with_dir("/var/log/linecast")
        .with_backup_count(3);
    assert_eq!(config.dir, PathBuf::from("/var/log/linecast"));
    assert_eq!(config.backup_count, 3);
}

#[test]
fn test_log_file_name() {
    assert_eq!(log_file_name("koerkana1_4"), "log_koerkana1_4.log");
    assert_eq!(log_file_name("bench-2.lab_0"), "log_bench-2.lab_0.log");
}

#[test]
fn test_log_file_name_cannot_escape_dir() {
    assert_eq!(log_file_name("../../etc/passwd"), "log_.._.._etc_passwd.log");
    assert!(!log_file_name("a/b\\c").contains(['/', '\\']));
}

// =============================================================================
// Persisting
// =============================================================================

#[test]
fn test_persist_strips_source_and_sequence() {
    let dir = TempDir::new().unwrap();
    let mut store = store(&dir);

    store
        .persist_at(
            b"koerkana1_4 00002A 2015-01-14T13:41:37.903Z 'Hello world'",
            now(),
        )
        .unwrap();
    store
        .persist_at(b"koerkana1_4 00002B x2015-01-14T13:41:38.112Z 'Hello wo'", now())
        .unwrap();

    let contents = fs::read_to_string(store.path_for("koerkana1_4")).unwrap();
    assert_eq!(
        contents,
        "2015-01-14T13:41:37.903Z 'Hello world'\nx2015-01-14T13:41:38.112Z 'Hello wo'\n"
    );
}

#[test]
fn test_sources_get_separate_files() {
    let dir = TempDir::new().unwrap();
    let mut store = store(&dir);

    store
        .persist_at(b"koerkana1_1 000000 2015-01-14T13:41:37.903Z 'one'", now())
        .unwrap();
    store
        .persist_at(b"koerkana1_4 000000 2015-01-14T13:41:37.903Z 'four'", now())
        .unwrap();
    store
        .persist_at(b"koerkana1_1 000001 2015-01-14T13:41:37.904Z 'one again'", now())
        .unwrap();

    assert_eq!(store.source_count(), 2);
    assert_eq!(
        fs::read_to_string(dir.path().join("log_koerkana1_1.log")).unwrap(),
        "2015-01-14T13:41:37.903Z 'one'\n2015-01-14T13:41:37.904Z 'one again'\n"
    );
    assert_eq!(
        fs::read_to_string(dir.path().join("log_koerkana1_4.log")).unwrap(),
        "2015-01-14T13:41:37.903Z 'four'\n"
    );

    let snapshot = store.metrics().snapshot();
    assert_eq!(snapshot.lines_written, 3);
    assert_eq!(snapshot.files_opened, 2);
}

#[test]
fn test_malformed_lines_rejected_and_counted() {
    let dir = TempDir::new().unwrap();
    let mut store = store(&dir);

    for line in [&b"justone"[..], b"two tokens", b"", b"\xff\xfe 000000 body"] {
        let err = store.persist_at(line, now()).unwrap_err();
        assert!(matches!(err, SinkError::Malformed(_)));
    }

    assert_eq!(store.source_count(), 0);
    assert_eq!(store.metrics().snapshot().malformed_lines, 4);
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn test_write_error_counted() {
    let dir = TempDir::new().unwrap();
    let mut store = LogStore::new(LogStoreConfig::default().with_dir(dir.path().join("missing")));

    let err = store
        .persist_at(b"koerkana1_4 000000 2015-01-14T13:41:37.903Z 'x'", now())
        .unwrap_err();

    assert!(matches!(err, SinkError::Open { .. }));
    assert_eq!(store.metrics().snapshot().write_errors, 1);
}

#[test]
fn test_rotation_between_appends() {
    let dir = TempDir::new().unwrap();
    let mut store = store(&dir);
    let path = store.path_for("koerkana1_4");
    let rotated = dir.path().join("log_koerkana1_4.log.1");

    store
        .persist_at(b"koerkana1_4 000000 2015-01-14T13:41:37.903Z 'before'", now())
        .unwrap();
    fs::rename(&path, &rotated).unwrap();
    store
        .persist_at(b"koerkana1_4 000001 2015-01-14T13:41:38.903Z 'after'", now())
        .unwrap();

    assert_eq!(
        fs::read_to_string(&rotated).unwrap(),
        "2015-01-14T13:41:37.903Z 'before'\n"
    );
    assert_eq!(
        fs::read_to_string(&path).unwrap(),
        "2015-01-14T13:41:38.903Z 'after'\n"
    );
}
