//! In-memory test doubles for the ingester side
//!
//! No sockets, no serial ports: both types are driven entirely by the test
//! and can be inspected after each tick.
//!
//! - [`MemoryUplink`] - scripted collector connection
//! - [`ScriptedSource`] - serial input fed from a queue of poll results
//!
//! # Example
//!
//! ```ignore
//! use linecast_client::test::MemoryUplink;
//! use linecast_client::{OutboundBuffer, OutboundConfig};
//!
//! let uplink = MemoryUplink::new();
//! let mut buffer = OutboundBuffer::new(uplink.clone(), OutboundConfig::default());
//! buffer.enqueue(record);
//! buffer.tick(now).await;
//!
//! assert_eq!(uplink.sent().len(), 1);
//! uplink.ack();
//! ```

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use linecast_protocol::ACK_PAYLOAD;
use linecast_sources::{ByteSource, SerialRead};
use parking_lot::Mutex;

use crate::error::{Result, UplinkError};
use crate::uplink::Uplink;

#[derive(Debug, Default)]
struct UplinkState {
    connected: bool,
    connect_attempts: usize,
    connect_failures: usize,
    fail_next_send: bool,
    fail_next_recv: bool,
    sent: Vec<Bytes>,
    replies: VecDeque<Bytes>,
}

/// Uplink that records every batch and replies only when told to
///
/// Clones share state, so a test keeps one handle while the buffer owns
/// the other.
#[derive(Debug, Clone, Default)]
pub struct MemoryUplink {
    state: Arc<Mutex<UplinkState>>,
}

impl MemoryUplink {
    /// Create a disconnected uplink
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the collector's acknowledgment
    pub fn ack(&self) {
        self.reply(Bytes::from_static(ACK_PAYLOAD));
    }

    /// Queue an arbitrary reply
    pub fn reply(&self, payload: Bytes) {
        self.state.lock().replies.push_back(payload);
    }

    /// Make the next `n` connect attempts fail
    pub fn fail_connects(&self, n: usize) {
        self.state.lock().connect_failures = n;
    }

    /// Make the next send fail and drop the connection
    pub fn fail_next_send(&self) {
        self.state.lock().fail_next_send = true;
    }

    /// Make the next reply poll report a closed connection
    pub fn fail_next_recv(&self) {
        self.state.lock().fail_next_recv = true;
    }

    /// Mark the uplink connected without a connect attempt
    pub fn force_connected(&self) {
        self.state.lock().connected = true;
    }

    /// Batches sent so far
    pub fn sent(&self) -> Vec<Bytes> {
        self.state.lock().sent.clone()
    }

    /// Connect calls so far, successful or not
    pub fn connect_attempts(&self) -> usize {
        self.state.lock().connect_attempts
    }
}

#[async_trait]
impl Uplink for MemoryUplink {
    async fn connect(&mut self) -> Result<()> {
        let mut state = self.state.lock();
        state.connect_attempts += 1;
        state.replies.clear();
        if state.connect_failures > 0 {
            state.connect_failures -= 1;
            state.connected = false;
            return Err(UplinkError::ConnectionFailed {
                target: "memory".into(),
                source: std::io::ErrorKind::ConnectionRefused.into(),
            });
        }
        state.connected = true;
        Ok(())
    }

    async fn send(&mut self, payload: Bytes) -> Result<()> {
        let mut state = self.state.lock();
        if !state.connected {
            return Err(UplinkError::NotConnected);
        }
        if state.fail_next_send {
            state.fail_next_send = false;
            state.connected = false;
            return Err(UplinkError::Io(std::io::ErrorKind::BrokenPipe.into()));
        }
        state.sent.push(payload);
        Ok(())
    }

    fn try_recv(&mut self) -> Result<Option<Bytes>> {
        let mut state = self.state.lock();
        if !state.connected {
            return Err(UplinkError::NotConnected);
        }
        if state.fail_next_recv {
            state.fail_next_recv = false;
            return Err(UplinkError::Closed);
        }
        Ok(state.replies.pop_front())
    }

    fn disconnect(&mut self) {
        self.state.lock().connected = false;
    }

    fn is_connected(&self) -> bool {
        self.state.lock().connected
    }

    fn target(&self) -> &str {
        "memory"
    }
}

/// One scripted poll result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptedRead {
    /// Bytes delivered by the port
    Data(Vec<u8>),
    /// Port came back after an outage
    Reopened,
    /// Port gone
    Unavailable,
}

/// Byte source that replays a queue of reads, then reports `Empty`
#[derive(Debug, Clone, Default)]
pub struct ScriptedSource {
    script: Arc<Mutex<VecDeque<ScriptedRead>>>,
}

impl ScriptedSource {
    /// Create an empty source
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue bytes for the next poll
    pub fn push(&self, data: impl AsRef<[u8]>) {
        self.script
            .lock()
            .push_back(ScriptedRead::Data(data.as_ref().to_vec()));
    }

    /// Queue a reopen for the next poll
    pub fn reopen(&self) {
        self.script.lock().push_back(ScriptedRead::Reopened);
    }

    /// Queue an outage poll
    pub fn unplug(&self) {
        self.script.lock().push_back(ScriptedRead::Unavailable);
    }

    /// Reads not yet consumed
    pub fn remaining(&self) -> usize {
        self.script.lock().len()
    }
}

impl ByteSource for ScriptedSource {
    fn poll_read(&mut self, buf: &mut [u8], _now: DateTime<Utc>) -> SerialRead {
        let mut script = self.script.lock();
        match script.pop_front() {
            None => SerialRead::Empty,
            Some(ScriptedRead::Reopened) => SerialRead::Reopened,
            Some(ScriptedRead::Unavailable) => SerialRead::Unavailable,
            Some(ScriptedRead::Data(mut data)) => {
                let n = data.len().min(buf.len());
                buf[..n].copy_from_slice(&data[..n]);
                if n < data.len() {
                    // Rest is delivered on the next poll, like a short read
                    script.push_front(ScriptedRead::Data(data.split_off(n)));
                }
                SerialRead::Data(n)
            }
        }
    }
}
