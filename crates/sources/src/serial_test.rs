//! Serial link tests
//!
//! No hardware is assumed; these cover the reopen schedule against a path
//! that never exists.

use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};

use super::*;

const MISSING: &str = "/dev/linecast-test-no-such-tty";

fn t(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(1_700_000_000_000 + ms).unwrap()
}

#[test]
fn test_open_missing_port_fails() {
    let err = open_port(MISSING, 115_200).err().unwrap();
    assert!(matches!(err, SourceError::SerialOpen { .. }));
    assert!(err.to_string().contains(MISSING));
}

#[test]
fn test_missing_port_is_unavailable_not_fatal() {
    let mut link = SerialLink::new(MISSING, 115_200);
    let mut buf = [0u8; 64];

    assert_eq!(link.poll_read(&mut buf, t(0)), SerialRead::Unavailable);
    assert!(!link.is_open());
    assert_eq!(link.path(), MISSING);
}

#[test]
fn test_reopen_waits_for_delay() {
    let mut link = SerialLink::new(MISSING, 115_200).with_reopen_delay(Duration::from_millis(100));
    let mut buf = [0u8; 64];

    assert_eq!(link.poll_read(&mut buf, t(0)), SerialRead::Unavailable);
    // Within the delay no open is attempted
    assert_eq!(link.poll_read(&mut buf, t(50)), SerialRead::Unavailable);
    assert_eq!(link.next_open, Some(t(100)));

    // After the delay a new attempt pushes the schedule forward
    assert_eq!(link.poll_read(&mut buf, t(120)), SerialRead::Unavailable);
    assert_eq!(link.next_open, Some(t(220)));
}
