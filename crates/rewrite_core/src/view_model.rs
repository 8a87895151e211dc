use crate::{Anchor, UiPhase};

/// Everything a renderer needs to draw the current surface.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UiViewModel {
    pub phase: UiPhase,
    pub anchor: Option<Anchor>,
    pub selection_preview: Option<String>,
    pub instruction: String,
    pub can_submit: bool,
    pub response: String,
    /// Output is still arriving; the Stop button is shown.
    pub receiving: bool,
    pub can_insert: bool,
    pub error: Option<String>,
    /// Non-fatal message left behind after the surface closed.
    pub notice: Option<String>,
    pub model: String,
    pub dirty: bool,
}

/// User-facing text for a failed generation.
pub fn describe_stream_error(message: &str) -> String {
    format!("Ollama Error: {message}. Is Ollama running and the model available?")
}
