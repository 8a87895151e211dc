//! Messages exchanged between the page and the background context.
//!
//! The `type`/`payload` layout and the type names match what the extension
//! transport carries, so these enums serialize straight onto the wire.
use serde::{Deserialize, Serialize};

pub type TabId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Requests sent from a page to the background context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum PageRequest {
    /// Start (or restart) a streaming generation for the sending tab.
    #[serde(rename = "stream-ollama-chat")]
    StreamChat {
        model: String,
        messages: Vec<ChatMessage>,
    },
    /// Stop the sending tab's generation, if any.
    #[serde(rename = "stop-ollama-stream")]
    StopStream,
    #[serde(rename = "getOllamaStatus")]
    GetStatus,
    #[serde(rename = "getOllamaModels")]
    GetModels,
    /// Point the model client at a new server and re-check connectivity.
    #[serde(rename = "updateOllamaConfig")]
    UpdateConfig { host: String, port: String },
}

impl PageRequest {
    /// Wire name, for log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::StreamChat { .. } => "stream-ollama-chat",
            Self::StopStream => "stop-ollama-stream",
            Self::GetStatus => "getOllamaStatus",
            Self::GetModels => "getOllamaModels",
            Self::UpdateConfig { .. } => "updateOllamaConfig",
        }
    }

    /// Whether the sender waits for a [`Reply`].
    pub fn expects_reply(&self) -> bool {
        matches!(self, Self::GetStatus | Self::GetModels)
    }
}

/// Events pushed from the background context to one tab.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum BackgroundEvent {
    #[serde(rename = "ollama-chunk")]
    Chunk { content: String, done: bool },
    #[serde(rename = "ollama-error")]
    Error { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkState {
    Connected,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReply {
    pub status: LinkState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ModelsReply {
    Models { models: Vec<String> },
    Error { error: String },
}

/// Answers to the request/response subset of [`PageRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Reply {
    Status(StatusReply),
    Models(ModelsReply),
}
