//! Linecast - Sources
//!
//! Everything that produces lines for the rest of the system.
//!
//! # Components
//!
//! - **Framer** - Splits a serial byte stream into lines, flushing stale
//!   partial lines as broken
//! - **Boot clock** - Rebuilds wall-clock time from device boot-relative
//!   millisecond counters
//! - **Serial** - Self-reopening, non-blocking serial port input
//! - **Listener** - The collector's TCP request endpoint
//!
//! # Example
//!
//! ```ignore
//! use linecast_sources::{BootClock, LineFramer};
//!
//! let mut framer = LineFramer::new();
//! let mut clock = BootClock::new();
//!
//! framer.put(b"1f4 B|BOOT\n7d0 I|up\n", now);
//! for line in framer.lines() {
//!     let stamp = clock.observe(&line, now);
//! }
//! ```

pub mod boot_clock;
pub mod framer;
pub mod listener;
pub mod serial;

mod error;

pub use boot_clock::{BootClock, DEFAULT_TOLERANCE, LineKind, Stamp};
pub use error::{Result, SourceError};
pub use framer::{DEFAULT_IDLE_FLUSH, LineFramer, Lines};
pub use listener::{InboundBatch, ListenerMetrics, ListenerMetricsSnapshot, RequestListener};
pub use serial::{ByteSource, DEFAULT_REOPEN_DELAY, SerialLink, SerialRead, open_port};
