//! Message envelope definitions
//!
//! Every frame on the wire carries exactly one envelope:
//!
//! ```json
//! { "messageType": "Workflow", "content": "wf-42" }
//! { "messageType": "Publication", "content": { ... } }
//! ```
//!
//! Unknown extra fields are ignored so newer nodes can add metadata without
//! breaking older ones. An unknown `messageType` is rejected with a
//! distinguishable error instead of being routed anywhere.

use std::fmt;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, MalformedReason, Result};

// ─────────────────────────────────────────────────────────────────
// Publication
// ─────────────────────────────────────────────────────────────────

/// An event publication record
///
/// The record's shape belongs to the workflow engine; this crate carries it
/// verbatim and never looks inside. It must serialize to a JSON object.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Publication(Value);

impl Publication {
    /// Serialize an engine-side record into a publication
    pub fn from_record<T: Serialize>(record: &T) -> Result<Self> {
        Self::try_from(serde_json::to_value(record)?)
    }

    /// Convert back into the engine-side record type
    pub fn into_record<T: DeserializeOwned>(self) -> Result<T> {
        Ok(serde_json::from_value(self.0)?)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }
}

impl TryFrom<Value> for Publication {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::Object(_) => Ok(Self(value)),
            other => Err(Error::malformed(MalformedReason::InvalidContent(format!(
                "publication must be a record, got {}",
                json_kind(&other)
            )))),
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Message Type
// ─────────────────────────────────────────────────────────────────

/// Discriminator carried in the `messageType` field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    Workflow,
    Publication,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Workflow => "Workflow",
            MessageType::Publication => "Publication",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Workflow" => Ok(MessageType::Workflow),
            "Publication" => Ok(MessageType::Publication),
            other => Err(Error::malformed(MalformedReason::UnknownMessageType(
                other.to_string(),
            ))),
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Envelope
// ─────────────────────────────────────────────────────────────────

/// The unit exchanged between nodes
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    /// Reference to a unit of work
    Workflow(String),

    /// Event publication to deliver to subscriber logic
    Publication(Publication),
}

/// Envelope as it appears on the wire, before the content is interpreted
#[derive(Deserialize)]
struct WireMessage {
    #[serde(rename = "messageType")]
    message_type: String,
    content: Value,
}

impl Envelope {
    pub fn workflow(id: impl Into<String>) -> Self {
        Envelope::Workflow(id.into())
    }

    pub fn publication(publication: Publication) -> Self {
        Envelope::Publication(publication)
    }

    pub fn message_type(&self) -> MessageType {
        match self {
            Envelope::Workflow(_) => MessageType::Workflow,
            Envelope::Publication(_) => MessageType::Publication,
        }
    }

    /// Encode to JSON bytes
    pub fn encode(&self) -> Vec<u8> {
        let content = match self {
            Envelope::Workflow(id) => Value::String(id.clone()),
            Envelope::Publication(publication) => publication.as_value().clone(),
        };

        let mut wire = serde_json::Map::with_capacity(2);
        wire.insert(
            "messageType".to_string(),
            Value::String(self.message_type().as_str().to_string()),
        );
        wire.insert("content".to_string(), content);

        Value::Object(wire).to_string().into_bytes()
    }

    /// Decode JSON bytes into an envelope
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let wire: WireMessage = serde_json::from_slice(bytes)
            .map_err(|e| Error::malformed(MalformedReason::InvalidJson(e.to_string())))?;

        match wire.message_type.parse::<MessageType>()? {
            MessageType::Workflow => match wire.content {
                Value::String(id) => Ok(Envelope::Workflow(id)),
                other => Err(Error::malformed(MalformedReason::InvalidContent(format!(
                    "workflow id must be a string, got {}",
                    json_kind(&other)
                )))),
            },
            MessageType::Publication => decode_publication(wire.content).map(Envelope::Publication),
        }
    }
}

/// Older nodes embed the publication as a serialized JSON string
fn decode_publication(content: Value) -> Result<Publication> {
    match content {
        Value::String(text) => {
            let record = serde_json::from_str::<Value>(&text).map_err(|e| {
                Error::malformed(MalformedReason::InvalidContent(format!(
                    "embedded publication is not JSON: {}",
                    e
                )))
            })?;
            Publication::try_from(record)
        }
        record => Publication::try_from(record),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
