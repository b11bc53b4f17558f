//! Queue providers
//!
//! [`QueueProvider`] is the contract the workflow engine programs against.
//! [`PeerQueueProvider`] distributes work across a cluster of equal nodes;
//! [`SingleNodeQueueProvider`] keeps everything in-process.

mod lifecycle;
mod peer;
mod single_node;

use async_trait::async_trait;

use crate::error::Result;
use crate::protocol::Publication;

pub use peer::PeerQueueProvider;
pub use single_node::SingleNodeQueueProvider;

/// Work and event distribution as seen by the workflow engine
#[async_trait]
pub trait QueueProvider: Send + Sync {
    /// Hand a work item to some node for processing
    async fn queue_for_processing(&self, id: &str) -> Result<()>;

    /// Hand an event publication to some node
    async fn queue_for_publishing(&self, publication: Publication) -> Result<()>;

    /// Take the next locally buffered work item, if any; never waits
    fn dequeue_for_processing(&self) -> Option<String>;

    /// Take the next locally buffered publication, if any; never waits
    fn dequeue_for_publishing(&self) -> Option<Publication>;

    async fn start(&self) -> Result<()>;

    /// Stop the provider; safe to call repeatedly or before start
    async fn stop(&self);
}
