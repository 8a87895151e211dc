use crate::view_model::{describe_stream_error, UiViewModel};
use crate::{preview_selection, SelectionSnapshot, DEFAULT_MODEL};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UiPhase {
    #[default]
    Hidden,
    PromptOpen,
    Streaming,
}

/// Viewport position the surface is anchored to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Anchor {
    pub x: i32,
    pub y: i32,
}

/// Everything taken from the page when the user triggers a rewrite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capture {
    pub snapshot: SelectionSnapshot,
    pub selected_text: String,
    pub anchor: Option<Anchor>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct StreamBuffer {
    pub(crate) text: String,
    /// False once `done`, an error, or a stop has been seen.
    pub(crate) receiving: bool,
    pub(crate) error: Option<String>,
}

impl StreamBuffer {
    fn started() -> Self {
        Self {
            text: String::new(),
            receiving: true,
            error: None,
        }
    }
}

/// The single live surface. The capture lives inside the visible variants so
/// an open surface without a snapshot cannot be represented.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub(crate) enum Surface {
    #[default]
    Hidden,
    Prompt {
        capture: Capture,
        instruction: String,
    },
    Streaming {
        capture: Capture,
        stream: StreamBuffer,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UiState {
    pub(crate) surface: Surface,
    model: String,
    notice: Option<String>,
    dirty: bool,
}

impl Default for UiState {
    fn default() -> Self {
        Self::with_model(DEFAULT_MODEL)
    }
}

impl UiState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_model(model: impl Into<String>) -> Self {
        Self {
            surface: Surface::Hidden,
            model: model.into(),
            notice: None,
            dirty: false,
        }
    }

    pub fn phase(&self) -> UiPhase {
        match self.surface {
            Surface::Hidden => UiPhase::Hidden,
            Surface::Prompt { .. } => UiPhase::PromptOpen,
            Surface::Streaming { .. } => UiPhase::Streaming,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn capture(&self) -> Option<&Capture> {
        match &self.surface {
            Surface::Hidden => None,
            Surface::Prompt { capture, .. } | Surface::Streaming { capture, .. } => Some(capture),
        }
    }

    pub fn last_snapshot(&self) -> Option<&SelectionSnapshot> {
        self.capture().map(|capture| &capture.snapshot)
    }

    pub fn selected_text(&self) -> Option<&str> {
        self.capture().map(|capture| capture.selected_text.as_str())
    }

    /// Text accumulated on the streaming surface so far.
    pub fn response(&self) -> Option<&str> {
        match &self.surface {
            Surface::Streaming { stream, .. } => Some(stream.text.as_str()),
            _ => None,
        }
    }

    pub fn is_receiving(&self) -> bool {
        matches!(&self.surface, Surface::Streaming { stream, .. } if stream.receiving)
    }

    pub fn view(&self) -> UiViewModel {
        let mut view = UiViewModel {
            phase: self.phase(),
            model: self.model.clone(),
            notice: self.notice.clone(),
            dirty: self.dirty,
            ..UiViewModel::default()
        };
        if let Some(capture) = self.capture() {
            view.anchor = capture.anchor;
            view.selection_preview = Some(preview_selection(&capture.selected_text));
        }
        match &self.surface {
            Surface::Hidden => {}
            Surface::Prompt { instruction, .. } => {
                view.instruction = instruction.clone();
                view.can_submit = !instruction.trim().is_empty();
            }
            Surface::Streaming { stream, .. } => {
                view.response = stream.text.clone();
                view.receiving = stream.receiving;
                view.can_insert = !stream.text.is_empty();
                view.error = stream.error.as_deref().map(describe_stream_error);
            }
        }
        view
    }

    /// Returns whether anything visible changed since the last call, and
    /// resets the flag.
    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub(crate) fn set_model(&mut self, model: String) {
        self.model = model;
        self.mark_dirty();
    }

    pub(crate) fn set_notice(&mut self, notice: Option<String>) {
        if self.notice != notice {
            self.notice = notice;
            self.mark_dirty();
        }
    }

    /// Removes the current surface, leaving `Hidden`. Returns it so the
    /// caller can decide what tearing it down requires.
    pub(crate) fn take_surface(&mut self) -> Surface {
        let surface = std::mem::take(&mut self.surface);
        if !matches!(surface, Surface::Hidden) {
            self.mark_dirty();
        }
        surface
    }

    pub(crate) fn open_prompt(&mut self, capture: Capture) {
        self.surface = Surface::Prompt {
            capture,
            instruction: String::new(),
        };
        self.mark_dirty();
    }

    pub(crate) fn open_stream(&mut self, capture: Capture) {
        self.surface = Surface::Streaming {
            capture,
            stream: StreamBuffer::started(),
        };
        self.mark_dirty();
    }

    pub(crate) fn stream_mut(&mut self) -> Option<&mut StreamBuffer> {
        match &mut self.surface {
            Surface::Streaming { stream, .. } => Some(stream),
            _ => None,
        }
    }
}
