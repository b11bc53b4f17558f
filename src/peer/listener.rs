//! Per-peer listener task
//!
//! Lifecycle: `Idle → Running → Draining → Stopped`. The listener waits on
//! its channel with a bounded timeout and on the shutdown token at the same
//! time, so stop is observed immediately rather than after the next timeout.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::buffers::LocalBuffers;
use crate::protocol::{Envelope, MessageType};
use crate::transport::{PeerAddress, PullChannel};

use super::ListenerStats;

// ─────────────────────────────────────────────────────────────────
// Listener State
// ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ListenerState {
    /// Created, not yet polling
    Idle = 0,
    /// Polling its inbound channel
    Running = 1,
    /// Shutdown observed, releasing the channel
    Draining = 2,
    /// Task finished
    Stopped = 3,
}

impl ListenerState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => ListenerState::Idle,
            1 => ListenerState::Running,
            2 => ListenerState::Draining,
            _ => ListenerState::Stopped,
        }
    }
}

#[derive(Debug)]
struct StateCell(AtomicU8);

impl StateCell {
    fn new(state: ListenerState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    fn get(&self) -> ListenerState {
        ListenerState::from_u8(self.0.load(Ordering::Acquire))
    }

    fn set(&self, state: ListenerState) {
        self.0.store(state as u8, Ordering::Release);
    }
}

// ─────────────────────────────────────────────────────────────────
// Peer Listener
// ─────────────────────────────────────────────────────────────────

/// Drains one inbound channel into the local buffers
pub struct PeerListener {
    channel: PullChannel,
    buffers: Arc<LocalBuffers>,
    stats: Arc<ListenerStats>,
    receive_timeout: Duration,
    state: Arc<StateCell>,
}

impl PeerListener {
    pub fn new(
        channel: PullChannel,
        buffers: Arc<LocalBuffers>,
        stats: Arc<ListenerStats>,
        receive_timeout: Duration,
    ) -> Self {
        Self {
            channel,
            buffers,
            stats,
            receive_timeout,
            state: Arc::new(StateCell::new(ListenerState::Idle)),
        }
    }

    pub fn address(&self) -> &PeerAddress {
        self.channel.address()
    }

    pub fn state(&self) -> ListenerState {
        self.state.get()
    }

    /// Start polling on a tokio task until `shutdown` fires
    pub fn spawn(self, shutdown: CancellationToken) -> ListenerHandle {
        let address = self.address().clone();
        let state = Arc::clone(&self.state);
        let task = tokio::spawn(self.run(shutdown));

        ListenerHandle {
            address,
            state,
            task,
        }
    }

    async fn run(mut self, shutdown: CancellationToken) {
        self.state.set(ListenerState::Running);
        info!(peer = %self.address(), "Peer listener running");

        loop {
            let received = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                received = self.channel.receive(self.receive_timeout) => received,
            };

            match received {
                Ok(Some(frame)) => self.route(&frame),
                Ok(None) => trace!(peer = %self.address(), "No message within receive timeout"),
                Err(e) => {
                    error!(peer = %self.address(), error = %e, "Inbound channel failed, listener exiting");
                    break;
                }
            }
        }

        self.state.set(ListenerState::Draining);
        self.channel.close();
        self.state.set(ListenerState::Stopped);
        info!(peer = %self.address(), "Peer listener stopped");
    }

    /// Decode one frame and push its payload into the matching buffer
    fn route(&self, frame: &[u8]) {
        match Envelope::decode(frame) {
            Ok(Envelope::Workflow(id)) => {
                trace!(peer = %self.address(), id = %id, "Work item received");
                self.buffers.push_work(id);
                self.stats.record(MessageType::Workflow);
            }
            Ok(Envelope::Publication(publication)) => {
                trace!(peer = %self.address(), "Publication received");
                self.buffers.push_publication(publication);
                self.stats.record(MessageType::Publication);
            }
            Err(e) => {
                self.stats.record_malformed();
                warn!(
                    peer = %self.address(),
                    error = %e.format_for_log(),
                    bytes = frame.len(),
                    "Discarding malformed message"
                );
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Listener Handle
// ─────────────────────────────────────────────────────────────────

/// Owner's view of a spawned listener
pub struct ListenerHandle {
    address: PeerAddress,
    state: Arc<StateCell>,
    task: JoinHandle<()>,
}

impl ListenerHandle {
    pub fn address(&self) -> &PeerAddress {
        &self.address
    }

    pub fn state(&self) -> ListenerState {
        self.state.get()
    }

    /// Wait for the task to exit and return its final state
    pub async fn join(self) -> ListenerState {
        if let Err(e) = self.task.await {
            if e.is_panic() {
                error!(peer = %self.address, error = %e, "Peer listener panicked");
            }
            self.state.set(ListenerState::Stopped);
        }
        debug!(peer = %self.address, "Peer listener joined");
        self.state.get()
    }

    /// Stop the task without waiting; used when no runtime context is
    /// available to await on
    pub fn abort(&self) {
        self.task.abort();
        self.state.set(ListenerState::Stopped);
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
