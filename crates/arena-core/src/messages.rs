//! Wire messages exchanged over the player channel.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::DecodeError;
use crate::ids::PlayerId;

/// The last state a player reported. Opaque to the server beyond being a
/// JSON object.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerState(Map<String, Value>);

impl PlayerState {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Decode a text frame.
    pub fn from_text(text: &str) -> Result<Self, DecodeError> {
        Self::from_value(serde_json::from_str(text)?)
    }

    /// Decode a binary frame carrying UTF-8 JSON.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
        Self::from_value(serde_json::from_slice(bytes)?)
    }

    fn from_value(value: Value) -> Result<Self, DecodeError> {
        match value {
            Value::Object(fields) => Ok(Self(fields)),
            Value::Array(_) => Err(DecodeError::NotAnObject("array")),
            Value::String(_) => Err(DecodeError::NotAnObject("string")),
            Value::Number(_) => Err(DecodeError::NotAnObject("number")),
            Value::Bool(_) => Err(DecodeError::NotAnObject("bool")),
            Value::Null => Err(DecodeError::NotAnObject("null")),
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }
}

impl TryFrom<Value> for PlayerState {
    type Error = DecodeError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::from_value(value)
    }
}

/// Copy of the id → state map at one point in time.
pub type Snapshot = BTreeMap<PlayerId, PlayerState>;

/// Server → client messages.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Full snapshot of every known player state, not a diff.
    StateUpdate { players: Snapshot },
    PlayerDisconnected { player_id: PlayerId },
}

impl ServerMessage {
    pub fn message_type(&self) -> &'static str {
        match self {
            Self::StateUpdate { .. } => "state_update",
            Self::PlayerDisconnected { .. } => "player_disconnected",
        }
    }
}
