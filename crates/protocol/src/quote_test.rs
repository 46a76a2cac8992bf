//! Tests for line quoting

use crate::error::ProtocolError;
use crate::quote::{quote, unquote};

// =============================================================================
// quote tests
// =============================================================================

#[test]
fn test_quote_plain_text() {
    assert_eq!(quote(b"Hello world"), "'Hello world'");
}

#[test]
fn test_quote_empty() {
    assert_eq!(quote(b""), "''");
}

#[test]
fn test_quote_control_characters() {
    assert_eq!(quote(b"a\tb\r\n"), "'a\\tb\\r\\n'");
}

#[test]
fn test_quote_backslash() {
    assert_eq!(quote(b"C:\\dir"), "'C:\\\\dir'");
}

#[test]
fn test_quote_non_printable_bytes() {
    assert_eq!(quote(&[0x00, 0x7f, 0xff]), "'\\x00\\x7f\\xff'");
}

#[test]
fn test_quote_switches_to_double_quotes() {
    assert_eq!(quote(b"it's"), "\"it's\"");
}

#[test]
fn test_quote_escapes_single_quote_when_both_present() {
    assert_eq!(quote(b"it's \"x\""), "'it\\'s \"x\"'");
}

#[test]
fn test_quote_output_has_no_raw_newline() {
    let quoted = quote(b"line1\nline2\n");
    assert!(!quoted.contains('\n'));
}

// =============================================================================
// unquote tests
// =============================================================================

#[test]
fn test_unquote_plain_text() {
    assert_eq!(unquote("'Hello world'").unwrap(), b"Hello world");
}

#[test]
fn test_unquote_double_quoted() {
    assert_eq!(unquote("\"it's\"").unwrap(), b"it's");
}

#[test]
fn test_unquote_escapes() {
    assert_eq!(
        unquote("'a\\tb\\r\\n\\\\\\x00\\xff'").unwrap(),
        b"a\tb\r\n\\\x00\xff"
    );
}

#[test]
fn test_unquote_reverses_quote_for_awkward_input() {
    let inputs: [&[u8]; 5] = [
        b"it's \"x\"",
        b"\x1b[31mred\x1b[0m",
        b"12ab I|temp=21.5",
        b"''\"\"",
        &[0xde, 0xad, 0xbe, 0xef],
    ];
    for input in inputs {
        assert_eq!(unquote(&quote(input)).unwrap(), input);
    }
}

#[test]
fn test_unquote_too_short() {
    assert!(matches!(
        unquote("'"),
        Err(ProtocolError::InvalidQuoting { .. })
    ));
}

#[test]
fn test_unquote_missing_quotes() {
    assert!(unquote("hello").is_err());
    assert!(unquote("'hello").is_err());
    assert!(unquote("'hello\"").is_err());
}

#[test]
fn test_unquote_unknown_escape() {
    let err = unquote("'\\q'").unwrap_err();
    assert!(err.to_string().contains("unknown escape"));
}

#[test]
fn test_unquote_truncated_hex() {
    assert!(unquote("'\\x4'").is_err());
}

#[test]
fn test_unquote_unescaped_quote() {
    assert!(unquote("'a'b'").is_err());
}
