//! Linecast Client - Ingester side of the delivery pipeline
//!
//! Everything that runs next to the serial port:
//!
//! - [`uplink`] - Request/reply connection to a collector
//! - [`outbound`] - Acknowledgment-tracked line window with retry
//! - [`ingester`] - Serial read / frame / stamp / send loop
//! - [`replay`] - Re-delivery of persisted log files
//! - [`test`] - In-memory uplink and byte source for tests
//!
//! # Delivery guarantee
//!
//! Lines are delivered at least once as long as the collector comes back
//! within the retention age. Resends after a timeout or reconnect repeat
//! the same sequence numbers, so duplicates can be dropped downstream by
//! `(source_id, sequence)`.
//!
//! # Example
//!
//! ```ignore
//! use linecast_client::{Ingester, IngesterConfig, OutboundBuffer, OutboundConfig};
//! use linecast_client::{TcpUplink, TcpUplinkConfig, local_source_id};
//! use linecast_sources::{BootClock, SerialLink};
//!
//! let uplink = TcpUplink::new(TcpUplinkConfig::new("collector:14999"));
//! let buffer = OutboundBuffer::new(uplink, OutboundConfig::default());
//! let serial = SerialLink::new("/dev/ttyUSB0", 115_200);
//!
//! let ingester = Ingester::new(
//!     local_source_id("0"),
//!     serial,
//!     BootClock::new(),
//!     buffer,
//!     IngesterConfig::default(),
//! );
//! ingester.run(cancel).await;
//! ```

mod error;

pub mod ingester;
pub mod outbound;
pub mod replay;
pub mod test;
pub mod uplink;

pub use error::{Result, UplinkError};
pub use ingester::{Ingester, IngesterConfig, local_source_id};
pub use outbound::{OutboundBuffer, OutboundConfig, OutboundMetrics, OutboundMetricsSnapshot};
pub use replay::{
    Replay, ReplayConfig, ReplayMetrics, ReplayMetricsSnapshot, parse_persisted_line,
    source_from_path,
};
pub use uplink::{TcpUplink, TcpUplinkConfig, Uplink};
