//! Rewrite core: selection snapshot model, wire protocol and the pure page
//! state machine.
mod blacklist;
mod effect;
mod msg;
mod prompt;
mod protocol;
mod snapshot;
mod state;
mod update;
mod view_model;

pub use blacklist::is_blacklisted;
pub use effect::Effect;
pub use msg::Msg;
pub use prompt::{
    build_final_prompt, build_messages, preview_selection, DEFAULT_MODEL, PREVIEW_MAX_CHARS,
    SYSTEM_PROMPT_IMPROVE_WRITING,
};
pub use protocol::{
    BackgroundEvent, ChatMessage, LinkState, ModelsReply, PageRequest, Reply, Role, StatusReply,
    TabId,
};
pub use snapshot::{Boundary, ElementId, NodeId, SelectionSnapshot, TextRange};
pub use state::{Anchor, Capture, UiPhase, UiState};
pub use update::update;
pub use view_model::{describe_stream_error, UiViewModel};
