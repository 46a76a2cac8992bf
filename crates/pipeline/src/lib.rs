//! Linecast Pipeline - The collector loop
//!
//! Ties the request endpoint, the upstream subscription, the publish
//! endpoint and the per-source log store together.
//!
//! ```text
//! RequestListener ──▶ InboundBatch ──┐
//!                                     ├──▶ Collector ──▶ Publisher
//! UpstreamSubscriber ──▶ line ───────┘         │
//!                                               └──────▶ LogStore
//! ```

pub mod collector;
pub mod metrics;

mod error;

pub use collector::Collector;
pub use error::{PipelineError, Result};
pub use metrics::{CollectorMetrics, MetricsSnapshot};
