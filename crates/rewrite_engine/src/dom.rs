use rewrite_core::{ElementId, NodeId, TextRange};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    /// Single-line `<input>`.
    TextInput,
    TextArea,
    /// Root of a contenteditable region.
    ContentEditable,
    Other,
}

impl ElementKind {
    /// Form fields expose a value plus native selection offsets.
    pub fn is_field(self) -> bool {
        matches!(self, Self::TextInput | Self::TextArea)
    }

    pub fn is_editable(self) -> bool {
        self != Self::Other
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HostError {
    #[error("element {0:?} does not exist")]
    UnknownElement(ElementId),
    #[error("element {0:?} is not in the document")]
    DetachedElement(ElementId),
    #[error("node {0:?} is not in the document")]
    DetachedNode(NodeId),
    #[error("element {0:?} is not a text field")]
    NotAField(ElementId),
    #[error("range is out of bounds or spans several editing roots")]
    InvalidRange,
    #[error("native text insertion is unavailable")]
    InsertUnsupported,
    #[error("nothing editable has focus")]
    NothingEditable,
}

/// The part of a host document the selection engine reads and edits.
///
/// Offsets are UTF-16 code units, as the browser reports them. Mutating
/// methods either apply completely or leave the document untouched.
pub trait EditorHost {
    fn active_element(&self) -> Option<ElementId>;

    /// `None` for ids the document never issued.
    fn element_kind(&self, element: ElementId) -> Option<ElementKind>;

    fn is_attached(&self, element: ElementId) -> bool;

    fn focus(&mut self, element: ElementId) -> Result<(), HostError>;

    fn field_value(&self, element: ElementId) -> Result<String, HostError>;

    /// Native `selectionStart`/`selectionEnd`; either may be unset.
    fn field_selection(&self, element: ElementId)
        -> Result<(Option<u32>, Option<u32>), HostError>;

    /// Offsets past the end of the value are clamped, like the DOM does.
    fn set_field_selection(
        &mut self,
        element: ElementId,
        start: u32,
        end: u32,
    ) -> Result<(), HostError>;

    /// Programmatic value write. Produces no input event and no undo entry.
    fn set_field_value(&mut self, element: ElementId, value: &str) -> Result<(), HostError>;

    fn window_selection(&self) -> Option<TextRange>;

    /// Fails when any boundary node has left the document.
    fn set_window_selection(&mut self, range: &TextRange) -> Result<(), HostError>;

    /// Nearest contenteditable root containing the whole range.
    fn editable_root(&self, range: &TextRange) -> Option<ElementId>;

    fn range_text(&self, range: &TextRange) -> Result<String, HostError>;

    /// Deletes the range's contents and inserts `text` as a new text node
    /// where the range started. Returns the new node.
    fn replace_range_with_text_node(
        &mut self,
        range: &TextRange,
        text: &str,
    ) -> Result<NodeId, HostError>;

    /// The host's own "insert text" command: replaces the focused element's
    /// current selection the way typing would, firing one input event and
    /// recording one undo step.
    fn insert_text(&mut self, text: &str) -> Result<(), HostError>;
}
