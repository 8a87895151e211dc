#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    /// User clicked the rewrite affordance. `None` when nothing usable was
    /// selected.
    ActionTriggered(Option<crate::Capture>),
    /// User edited the instruction box.
    InstructionChanged(String),
    /// User submitted the instruction.
    InstructionSubmitted,
    /// Background relayed a piece of model output.
    ChunkReceived { content: String, done: bool },
    /// Background reported that the generation failed.
    StreamFailed { message: String },
    /// User clicked Stop.
    StopClicked,
    /// User clicked Insert.
    InsertClicked,
    /// User clicked Close or pressed Escape.
    CloseClicked,
    /// Writing the response back into the page failed.
    RestoreFailed { message: String },
    /// Settings changed the model used for new requests.
    ModelSelected(String),
    /// UI/render tick to coalesce rendering.
    Tick,
    /// Fallback for placeholder wiring.
    NoOp,
}
