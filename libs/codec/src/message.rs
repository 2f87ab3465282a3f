//! # Message Envelope
//!
//! Every document exchanged with producers and viewers is a JSON object with a
//! `what` discriminator:
//!
//! ```text
//! {"what": "update_positions", "positions": [...]}
//! {"what": "update_cam", "client": "3f2a...", "name": "orbital"}
//! {"what": "get_clientsID"}
//! ```
//!
//! The bridge only looks at `what` and, for targeted commands, `client`.
//! All other fields pass through untouched.

use crate::constants::{what, CLIENT_FIELD, WHAT_FIELD};
use crate::error::{CodecError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Routing class derived from the `what` discriminator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// Registry query answered directly to the producer
    GetClientsId,
    /// Camera command for a single viewer
    UpdateCam,
    /// Orbital camera command for a single viewer
    UpdateOrbital,
    /// Anything else, including a missing discriminator
    Telemetry,
}

impl MessageKind {
    pub fn from_what(value: Option<&str>) -> Self {
        match value {
            Some(what::GET_CLIENTS_ID) => MessageKind::GetClientsId,
            Some(what::UPDATE_CAM) => MessageKind::UpdateCam,
            Some(what::UPDATE_ORBITAL) => MessageKind::UpdateOrbital,
            _ => MessageKind::Telemetry,
        }
    }

    /// Targeted kinds carry a `client` field naming the destination viewer
    pub fn is_targeted(self) -> bool {
        matches!(self, MessageKind::UpdateCam | MessageKind::UpdateOrbital)
    }
}

/// A decoded producer frame
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    body: Map<String, Value>,
}

impl InboundMessage {
    /// Parse one frame of JSON text
    pub fn parse(text: &[u8]) -> Result<Self> {
        let value: Value = serde_json::from_slice(text).map_err(|source| CodecError::Malformed {
            len: text.len(),
            source,
        })?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(body) => Ok(Self { body }),
            other => Err(CodecError::NotAnObject {
                found: json_type_name(&other),
            }),
        }
    }

    /// The `what` discriminator, if present and a string
    pub fn what(&self) -> Option<&str> {
        self.body.get(WHAT_FIELD).and_then(Value::as_str)
    }

    pub fn kind(&self) -> MessageKind {
        MessageKind::from_what(self.what())
    }

    /// Destination viewer id for targeted commands
    pub fn target_client(&self) -> Option<&str> {
        self.body.get(CLIENT_FIELD).and_then(Value::as_str)
    }

    /// Compact JSON text, as forwarded to viewers
    pub fn to_json_text(&self) -> String {
        // A map of serde_json values always serializes
        Value::Object(self.body.clone()).to_string()
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.body)
    }
}

/// Structured reply to `get_clientsID`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientsIdResponse {
    pub what: String,
    pub clients: Vec<String>,
}

impl ClientsIdResponse {
    pub fn new(clients: Vec<String>) -> Self {
        Self {
            what: what::CLIENTS_ID.to_string(),
            clients,
        }
    }
}

/// First message a viewer receives, carrying its routing id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectedGreeting {
    pub what: String,
    pub client: String,
}

impl ConnectedGreeting {
    pub fn new(client: impl Into<String>) -> Self {
        Self {
            what: what::CONNECTED.to_string(),
            client: client.into(),
        }
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
