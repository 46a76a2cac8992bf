//! Quoting of original serial lines
//!
//! Serial output is arbitrary bytes. On the wire every line is carried as a
//! quoted literal so that a receiver can always split the wire line on
//! whitespace and never sees a raw newline or control byte inside a record.
//!
//! # Rules
//!
//! - Single quotes by default, double quotes when the text contains `'`
//!   but no `"`
//! - `\\`, the active quote character, `\t`, `\n` and `\r` are backslash
//!   escaped
//! - Any other byte outside printable ASCII becomes `\xNN` (lowercase hex)

use std::fmt::Write as _;

use crate::error::ProtocolError;
use crate::Result;

/// Quote raw line bytes for the wire
pub fn quote(raw: &[u8]) -> String {
    let quote_char = if raw.contains(&b'\'') && !raw.contains(&b'"') {
        b'"'
    } else {
        b'\''
    };

    let mut out = String::with_capacity(raw.len() + 2);
    out.push(quote_char as char);

    for &b in raw {
        match b {
            b'\\' => out.push_str("\\\\"),
            b'\t' => out.push_str("\\t"),
            b'\n' => out.push_str("\\n"),
            b'\r' => out.push_str("\\r"),
            _ if b == quote_char => {
                out.push('\\');
                out.push(quote_char as char);
            }
            0x20..=0x7e => out.push(b as char),
            _ => {
                // Writing to a String cannot fail
                let _ = write!(out, "\\x{b:02x}");
            }
        }
    }

    out.push(quote_char as char);
    out
}

/// Reverse `quote`, returning the original bytes
///
/// # Errors
///
/// Returns `InvalidQuoting` if the literal is not enclosed in matching
/// quotes or contains an unknown or truncated escape.
pub fn unquote(quoted: &str) -> Result<Vec<u8>> {
    let bytes = quoted.as_bytes();
    if bytes.len() < 2 {
        return Err(ProtocolError::quoting(0, "literal too short"));
    }

    let quote_char = bytes[0];
    if quote_char != b'\'' && quote_char != b'"' {
        return Err(ProtocolError::quoting(0, "missing opening quote"));
    }
    if bytes[bytes.len() - 1] != quote_char {
        return Err(ProtocolError::quoting(bytes.len() - 1, "missing closing quote"));
    }

    let body = &bytes[1..bytes.len() - 1];
    let mut out = Vec::with_capacity(body.len());
    let mut i = 0;

    while i < body.len() {
        let b = body[i];
        if b != b'\\' {
            if b == quote_char {
                return Err(ProtocolError::quoting(i + 1, "unescaped quote"));
            }
            out.push(b);
            i += 1;
            continue;
        }

        let Some(&esc) = body.get(i + 1) else {
            return Err(ProtocolError::quoting(i + 1, "unterminated escape"));
        };

        match esc {
            b'\\' | b'\'' | b'"' => out.push(esc),
            b't' => out.push(b'\t'),
            b'n' => out.push(b'\n'),
            b'r' => out.push(b'\r'),
            b'x' => {
                let hex = body
                    .get(i + 2..i + 4)
                    .ok_or_else(|| ProtocolError::quoting(i + 1, "truncated hex escape"))?;
                let hex = std::str::from_utf8(hex)
                    .map_err(|_| ProtocolError::quoting(i + 1, "invalid hex escape"))?;
                let value = u8::from_str_radix(hex, 16)
                    .map_err(|_| ProtocolError::quoting(i + 1, "invalid hex escape"))?;
                out.push(value);
                i += 4;
                continue;
            }
            _ => return Err(ProtocolError::quoting(i + 1, "unknown escape")),
        }
        i += 2;
    }

    Ok(out)
}
