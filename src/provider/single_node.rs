//! In-process provider with no networking

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tracing::{debug, info};

use crate::buffers::LocalBuffers;
use crate::error::Result;
use crate::protocol::Publication;

use super::QueueProvider;

/// Keeps every enqueued item on this node
///
/// Enqueue works whether or not the provider has been started; start and stop
/// only flip the active flag.
#[derive(Debug, Default)]
pub struct SingleNodeQueueProvider {
    buffers: LocalBuffers,
    active: AtomicBool,
}

impl SingleNodeQueueProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub fn pending_work(&self) -> usize {
        self.buffers.pending_work()
    }

    pub fn pending_publications(&self) -> usize {
        self.buffers.pending_publications()
    }
}

#[async_trait]
impl QueueProvider for SingleNodeQueueProvider {
    async fn queue_for_processing(&self, id: &str) -> Result<()> {
        self.buffers.push_work(id.to_string());
        debug!(id = %id, "Work item queued locally");
        Ok(())
    }

    async fn queue_for_publishing(&self, publication: Publication) -> Result<()> {
        self.buffers.push_publication(publication);
        Ok(())
    }

    fn dequeue_for_processing(&self) -> Option<String> {
        self.buffers.pop_work()
    }

    fn dequeue_for_publishing(&self) -> Option<Publication> {
        self.buffers.pop_publication()
    }

    async fn start(&self) -> Result<()> {
        if !self.active.swap(true, Ordering::AcqRel) {
            info!("Single-node queue provider started");
        }
        Ok(())
    }

    async fn stop(&self) {
        if self.active.swap(false, Ordering::AcqRel) {
            info!("Single-node queue provider stopped");
        }
    }
}
