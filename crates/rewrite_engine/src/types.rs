use std::fmt;

use rewrite_core::{ChatMessage, LinkState, StatusReply};

/// One fragment of a streamed chat completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatChunk {
    pub content: String,
    pub done: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelError {
    pub kind: FailureKind,
    pub message: String,
}

impl ModelError {
    pub(crate) fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            // The server already words these for people.
            FailureKind::Server => write!(f, "{}", self.message),
            _ if self.message.is_empty() => write!(f, "{}", self.kind),
            _ => write!(f, "{}: {}", self.kind, self.message),
        }
    }
}

impl std::error::Error for ModelError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    InvalidEndpoint,
    HttpStatus(u16),
    Timeout,
    Network,
    Malformed,
    /// The server reported an error inside an otherwise valid response.
    Server,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::InvalidEndpoint => write!(f, "invalid endpoint"),
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::Network => write!(f, "network error"),
            FailureKind::Malformed => write!(f, "malformed response"),
            FailureKind::Server => write!(f, "server error"),
        }
    }
}

/// Last known reachability of the model server.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConnectionStatus {
    #[default]
    Unknown,
    Connected,
    Unreachable(String),
}

impl ConnectionStatus {
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    pub fn to_reply(&self) -> StatusReply {
        match self {
            Self::Connected => StatusReply {
                status: LinkState::Connected,
                error: None,
            },
            Self::Unknown => StatusReply {
                status: LinkState::Error,
                error: Some("connection has not been checked yet".to_string()),
            },
            Self::Unreachable(reason) => StatusReply {
                status: LinkState::Error,
                error: Some(reason.clone()),
            },
        }
    }
}
