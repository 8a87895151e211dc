use crate::{ChatMessage, SelectionSnapshot};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Ask the background to stream a generation for this tab.
    StartStream {
        model: String,
        messages: Vec<ChatMessage>,
    },
    /// Ask the background to stop this tab's generation.
    StopStream,
    /// Replace the snapshotted selection with `text`.
    Restore {
        text: String,
        snapshot: SelectionSnapshot,
    },
}
