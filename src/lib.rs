//! peerqueue - peer-to-peer work distribution for workflow engines
//!
//! Every node in a cluster is equal. A node pushes work identifiers and event
//! publications to whichever peer pulls next, itself included, and drains
//! whatever its own listeners receive into local buffers that the engine
//! polls.
//!
//! ```no_run
//! use peerqueue::{PeerQueueProvider, ProviderConfig, QueueProvider};
//!
//! # async fn run() -> peerqueue::Result<()> {
//! let config = ProviderConfig::new(5555, ["10.0.0.2:5555"], true);
//! let provider = PeerQueueProvider::new(config)?;
//! provider.start().await?;
//!
//! provider.queue_for_processing("workflow-42").await?;
//! if let Some(id) = provider.dequeue_for_processing() {
//!     println!("processing {}", id);
//! }
//!
//! provider.stop().await;
//! # Ok(())
//! # }
//! ```

pub mod buffers;
pub mod config;
pub mod error;
pub mod logging;
pub mod peer;
pub mod protocol;
pub mod provider;
pub mod transport;

pub use buffers::{FifoQueue, LocalBuffers};
pub use config::{LoggingSettings, NodeSettings, ProviderConfig, TransportSettings};
pub use error::{Error, ErrorCode, MalformedReason, Result};
pub use peer::{ListenerState, StatsSnapshot};
pub use protocol::{Envelope, MessageType, Publication};
pub use provider::{PeerQueueProvider, QueueProvider, SingleNodeQueueProvider};
pub use transport::{PeerAddress, PeerRole};
