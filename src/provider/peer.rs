//! Networked provider: push to peers, pull from peers and from itself

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, trace, warn};

use crate::buffers::LocalBuffers;
use crate::config::ProviderConfig;
use crate::error::{Error, Result};
use crate::peer::{ListenerState, ListenerStats, StatsSnapshot};
use crate::protocol::{Envelope, Publication};
use crate::transport::PeerAddress;

use super::lifecycle::Lifecycle;
use super::QueueProvider;

/// Queue provider that distributes work across a set of peer nodes
///
/// Every node binds one outbound channel. Each enqueued item goes to exactly
/// one connected puller, which may be this node's own self-loop listener or a
/// listener on another node. Whatever any listener receives lands in the local
/// buffers and is handed out by the `dequeue_*` calls.
pub struct PeerQueueProvider {
    config: ProviderConfig,
    buffers: Arc<LocalBuffers>,
    stats: Arc<ListenerStats>,
    lifecycle: Lifecycle,
}

impl PeerQueueProvider {
    /// Create a stopped provider; nothing is bound until [`start`](QueueProvider::start)
    pub fn new(config: ProviderConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            buffers: Arc::new(LocalBuffers::new()),
            stats: Arc::new(ListenerStats::new()),
            lifecycle: Lifecycle::new(),
        })
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    pub fn is_active(&self) -> bool {
        self.lifecycle.is_active()
    }

    /// Counters for everything the listeners have received since creation
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Address the outbound channel is bound to, while running
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.lifecycle.local_addr()
    }

    pub fn listener_states(&self) -> Vec<(PeerAddress, ListenerState)> {
        self.lifecycle.listener_states()
    }

    /// Pullers currently connected to this node's outbound channel
    pub fn connected_pullers(&self) -> usize {
        self.lifecycle
            .outbound()
            .map_or(0, |outbound| outbound.connected_pullers())
    }

    pub fn pending_work(&self) -> usize {
        self.buffers.pending_work()
    }

    pub fn pending_publications(&self) -> usize {
        self.buffers.pending_publications()
    }

    async fn push(&self, envelope: Envelope) -> Result<()> {
        let Some(outbound) = self.lifecycle.outbound() else {
            debug!(message_type = %envelope.message_type(), "Enqueue rejected, provider not started");
            return Err(Error::NotStarted);
        };

        let frame = envelope.encode();
        let max = self.config.transport.max_frame_bytes;
        if frame.len() > max as usize {
            return Err(Error::FrameTooLarge {
                len: u32::try_from(frame.len()).unwrap_or(u32::MAX),
                max,
            });
        }

        match outbound.send(&frame, self.config.transport.send_timeout()).await {
            Ok(()) => {
                trace!(message_type = %envelope.message_type(), bytes = frame.len(), "Message enqueued");
                Ok(())
            }
            // Stop raced the send
            Err(Error::ChannelClosed) => Err(Error::NotStarted),
            Err(e) => {
                warn!(
                    message_type = %envelope.message_type(),
                    error = %e.format_for_log(),
                    "Message was not delivered"
                );
                Err(e)
            }
        }
    }
}

#[async_trait]
impl QueueProvider for PeerQueueProvider {
    async fn queue_for_processing(&self, id: &str) -> Result<()> {
        self.push(Envelope::workflow(id)).await
    }

    async fn queue_for_publishing(&self, publication: Publication) -> Result<()> {
        self.push(Envelope::publication(publication)).await
    }

    fn dequeue_for_processing(&self) -> Option<String> {
        self.buffers.pop_work()
    }

    fn dequeue_for_publishing(&self) -> Option<Publication> {
        self.buffers.pop_publication()
    }

    async fn start(&self) -> Result<()> {
        self.lifecycle
            .start(&self.config, &self.buffers, &self.stats)
            .await
    }

    async fn stop(&self) {
        self.lifecycle.stop().await;
    }
}
