//! Subscriber management for the publish endpoint
//!
//! Each connected subscriber gets a `Subscriber` with its own bounded
//! queue. The `SubscriberManager` fans every published line out to all of
//! them without waiting: a subscriber whose queue is full misses the line,
//! and one whose receiver is gone is removed.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::error::{Result, TapError};

/// Counter for generating unique subscriber IDs
static SUBSCRIBER_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Default maximum number of concurrent subscribers
pub const DEFAULT_MAX_SUBSCRIBERS: usize = 100;

/// Default per-subscriber queue length, in lines
pub const DEFAULT_QUEUE_SIZE: usize = 1024;

/// Outcome of offering a line to one subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Queued,
    Dropped,
    Disconnected,
}

/// A single connected subscriber
#[derive(Debug)]
pub struct Subscriber {
    id: u64,
    sender: mpsc::Sender<Bytes>,
    dropped: AtomicU64,
}

impl Subscriber {
    /// Create a subscriber around the sending half of its queue
    pub fn new(sender: mpsc::Sender<Bytes>) -> Self {
        Self {
            id: SUBSCRIBER_ID_COUNTER.fetch_add(1, Ordering::Relaxed),
            sender,
            dropped: AtomicU64::new(0),
        }
    }

    /// Get the subscriber ID
    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Lines this subscriber missed because its queue was full
    #[inline]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Offer a line without waiting
    #[inline]
    pub fn offer(&self, line: Bytes) -> Delivery {
        match self.sender.try_send(line) {
            Ok(()) => Delivery::Queued,
            Err(TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                Delivery::Dropped
            }
            Err(TrySendError::Closed(_)) => Delivery::Disconnected,
        }
    }

    /// Check if the receiving side is still alive
    #[inline]
    pub fn is_connected(&self) -> bool {
        !self.sender.is_closed()
    }
}

/// Result of one broadcast
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastOutcome {
    pub delivered: usize,
    pub dropped: usize,
}

/// Manages all active subscribers
#[derive(Debug)]
pub struct SubscriberManager {
    subscribers: RwLock<Vec<Arc<Subscriber>>>,
    queue_size: usize,
    max_subscribers: usize,
}

impl Default for SubscriberManager {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_SIZE)
    }
}

impl SubscriberManager {
    /// Create a manager whose subscribers queue up to `queue_size` lines
    pub fn new(queue_size: usize) -> Self {
        Self {
            subscribers: RwLock::new(Vec::new()),
            queue_size: queue_size.max(1),
            max_subscribers: DEFAULT_MAX_SUBSCRIBERS,
        }
    }

    /// Set the subscriber limit
    #[must_use]
    pub fn with_max_subscribers(mut self, max: usize) -> Self {
        self.max_subscribers = max;
        self
    }

    /// Register a new subscriber
    ///
    /// Returns the subscriber ID and the receiving end of its queue.
    ///
    /// # Errors
    ///
    /// Returns `MaxSubscribers` when the limit is reached.
    pub fn subscribe(&self) -> Result<(u64, mpsc::Receiver<Bytes>)> {
        let mut subscribers = self.subscribers.write();

        if subscribers.len() >= self.max_subscribers {
            return Err(TapError::MaxSubscribers {
                max: self.max_subscribers,
            });
        }

        let (sender, receiver) = mpsc::channel(self.queue_size);
        let subscriber = Arc::new(Subscriber::new(sender));
        let id = subscriber.id();
        subscribers.push(subscriber);

        Ok((id, receiver))
    }

    /// Unsubscribe by ID
    ///
    /// # Errors
    ///
    /// Returns `SubscriberNotFound` if no subscriber has this ID.
    pub fn unsubscribe(&self, id: u64) -> Result<()> {
        let mut subscribers = self.subscribers.write();
        let original_len = subscribers.len();
        subscribers.retain(|s| s.id() != id);

        if subscribers.len() == original_len {
            return Err(TapError::SubscriberNotFound { id });
        }

        Ok(())
    }

    /// Get number of active subscribers
    pub fn count(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Check if there are any subscribers
    #[inline]
    pub fn has_subscribers(&self) -> bool {
        !self.subscribers.read().is_empty()
    }

    /// Offer a line to every subscriber
    pub fn broadcast(&self, line: &Bytes) -> BroadcastOutcome {
        let mut outcome = BroadcastOutcome::default();
        let mut disconnected = false;

        {
            let subscribers = self.subscribers.read();
            for subscriber in subscribers.iter() {
                match subscriber.offer(line.clone()) {
                    Delivery::Queued => outcome.delivered += 1,
                    Delivery::Dropped => outcome.dropped += 1,
                    Delivery::Disconnected => disconnected = true,
                }
            }
        }

        if disconnected {
            self.cleanup_disconnected();
        }
        outcome
    }

    /// Remove subscribers whose receiver is gone
    pub fn cleanup_disconnected(&self) -> usize {
        let mut subscribers = self.subscribers.write();
        let original_len = subscribers.len();
        subscribers.retain(|s| s.is_connected());
        original_len - subscribers.len()
    }
}

#[cfg(test)]
#[path = "subscriber_test.rs"]
mod tests;
