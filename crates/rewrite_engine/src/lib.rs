//! Rewrite engine: model client, per-tab streaming sessions, the selection
//! engine and effect execution for the page state machine.
mod background;
mod client;
mod dom;
mod memory;
mod ndjson;
mod page;
mod persist;
mod selection;
mod session;
mod status;
mod transport;
mod types;
mod utf16;

pub use background::{BackgroundHandle, BackgroundSettings};
pub use client::{ChunkStream, ClientSettings, Endpoint, ModelClient, OllamaClient};
pub use dom::{EditorHost, ElementKind, HostError};
pub use memory::{InputEvent, MemoryDocument, UndoEntry};
pub use ndjson::decode_ndjson;
pub use page::{BackgroundPort, PageRuntime};
pub use persist::{ensure_parent_dir, write_atomically, PersistError};
pub use selection::{capture, restore, selected_text, snapshot, RestoreError};
pub use session::{SessionController, TabTransport};
pub use status::StatusMonitor;
pub use transport::{LocalHub, TabPort};
pub use types::{ChatChunk, ChatRequest, ConnectionStatus, FailureKind, ModelError};
