//! Coordinator message bodies

use serde::{Deserialize, Serialize};
use serde_json::{json, Value as Json};

use spacedeck_core::sampler::CatalogEntry;
use spacedeck_core::{Instruction, Value};

use crate::error::SyncError;

pub const TAG_ANNOUNCE: &str = "announce";
pub const TAG_SET_STATE: &str = "set-state";
pub const TAG_SET_DISPLAY: &str = "set-display";
pub const TAG_SET_STATUS: &str = "set-status";
pub const TAG_SET_PROGRESS: &str = "set-progress";
pub const TAG_KEEP_ALIVE: &str = "keep-alive";

/// One JSON message in either direction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncMessage {
    pub message: String,
    #[serde(default)]
    pub data: Json,
}

impl SyncMessage {
    /// Full control catalog, sent once per session
    pub fn announce(catalog: &[CatalogEntry]) -> Self {
        Self {
            message: TAG_ANNOUNCE.into(),
            data: json!({ "controls": catalog }),
        }
    }

    /// One changed control
    pub fn set_state(id: &str, value: &Value) -> Self {
        Self {
            message: TAG_SET_STATE.into(),
            data: json!({ "id": id, "state": value.to_string() }),
        }
    }

    pub fn to_json(&self) -> Result<Vec<u8>, SyncError> {
        serde_json::to_vec(self).map_err(|e| SyncError::Protocol(e.to_string()))
    }

    pub fn from_json(body: &[u8]) -> Result<Self, SyncError> {
        serde_json::from_slice(body).map_err(|e| SyncError::Protocol(e.to_string()))
    }

    /// Interpret an inbound message
    pub fn inbound(&self) -> Inbound {
        match self.message.as_str() {
            TAG_SET_DISPLAY => match self.text() {
                Some(text) => Inbound::Instruction(Instruction::Display { text }),
                None => Inbound::Malformed,
            },
            TAG_SET_STATUS => match self.text() {
                Some(text) => Inbound::Instruction(Instruction::Status { text }),
                None => Inbound::Malformed,
            },
            TAG_SET_PROGRESS => match self.progress() {
                Some(value) => Inbound::Instruction(Instruction::Progress { value }),
                None => Inbound::Malformed,
            },
            TAG_KEEP_ALIVE => Inbound::KeepAlive,
            _ => Inbound::Unknown,
        }
    }

    fn text(&self) -> Option<String> {
        match self.data.get("message")? {
            Json::String(s) => Some(s.clone()),
            Json::Null => None,
            other => Some(other.to_string()),
        }
    }

    fn progress(&self) -> Option<f32> {
        match self.data.get("value")? {
            Json::Number(n) => n.as_f64().map(|v| v as f32),
            Json::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

/// What an inbound message means to the console
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Instruction(Instruction),
    KeepAlive,
    /// Known tag with an unusable payload
    Malformed,
    Unknown,
}
