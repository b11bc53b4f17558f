//! TCP push/pull transport
//!
//! A node binds one [`PushChannel`] that every interested peer connects to,
//! and opens one [`PullChannel`] per peer it takes work from. Each frame pushed
//! is written to exactly one connected puller, chosen round-robin; nothing is
//! broadcast.
//!
//! Pull channels connect lazily and keep reconnecting, so peers may start in
//! any order.

mod address;
mod pull;
mod push;

pub use address::*;
pub use pull::*;
pub use push::*;
