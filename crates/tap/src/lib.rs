//! Linecast Tap - Live republishing of collected lines
//!
//! Two directions of the publish/subscribe channel:
//!
//! - [`publisher`] - the collector's publish endpoint; every accepted line
//!   goes out verbatim, one framed message per line, to every subscriber
//! - [`upstream`] - a subscription to another collector's publish
//!   endpoint, so collectors can be chained
//!
//! # Architecture
//!
//! ```text
//!   Collector loop
//!        │ publish(line)
//!        ▼
//!    Publisher ──▶ SubscriberManager ──▶ bounded queue per subscriber
//!                                              │
//!                                              ▼
//!                                     PublishServer (TCP) ──▶ clients
//!
//!   UpstreamSubscriber ◀── TCP ── upstream collector
//!        │ mpsc
//!        ▼
//!   Collector loop
//! ```
//!
//! Slow subscribers lose lines instead of slowing the collector down.

mod error;
pub mod publisher;
pub mod subscriber;
pub mod upstream;

pub use error::{Result, TapError};
pub use publisher::{PublishMetrics, PublishMetricsSnapshot, PublishServer, Publisher};
pub use subscriber::{
    BroadcastOutcome, DEFAULT_MAX_SUBSCRIBERS, DEFAULT_QUEUE_SIZE, Delivery, Subscriber,
    SubscriberManager,
};
pub use upstream::{UpstreamConfig, UpstreamMetrics, UpstreamMetricsSnapshot, UpstreamSubscriber};
