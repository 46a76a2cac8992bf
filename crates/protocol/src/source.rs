//! Source identification types
//!
//! `SourceId` identifies one device/serial-port pair. It is the first token
//! of every wire line and keys the collector's per-source log files.

use std::fmt;
use std::sync::Arc;

/// Source identifier, `<hostname>_<portname>`
///
/// # Example
///
/// ```
/// use linecast_protocol::SourceId;
///
/// let source = SourceId::from_parts("koerkana1", "4");
/// assert_eq!(source.as_str(), "koerkana1_4");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceId(Arc<str>);

impl SourceId {
    /// Create a new source ID
    #[inline]
    pub fn new(id: impl Into<Arc<str>>) -> Self {
        Self(id.into())
    }

    /// Build a source ID from the ingesting host and the serial port name
    ///
    /// Whitespace would break wire-line tokenization, so it is replaced
    /// with `-`.
    pub fn from_parts(hostname: &str, portname: &str) -> Self {
        let id: String = format!("{hostname}_{portname}")
            .chars()
            .map(|c| if c.is_whitespace() { '-' } else { c })
            .collect();
        Self(id.into())
    }

    /// Get the source ID as a string slice
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SourceId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for SourceId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl AsRef<str> for SourceId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
