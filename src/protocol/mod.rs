//! Wire protocol between nodes
//!
//! Defines the message envelope exchanged between peers and the framing used
//! to carry it over a byte stream. Envelopes are JSON with a `messageType`
//! discriminator; frames are length-prefixed.

mod framing;
mod messages;

pub use framing::*;
pub use messages::*;
