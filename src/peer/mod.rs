//! Peer listeners
//!
//! One listener runs per inbound channel. It polls its channel, decodes each
//! frame and routes the payload into the node's local buffers. Frames that
//! fail to decode are dropped and counted; they never stop the listener.

pub mod listener;
pub mod stats;

pub use listener::*;
pub use stats::*;
