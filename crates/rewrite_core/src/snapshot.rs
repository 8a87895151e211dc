/// Handle to an element of the host document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(pub u64);

/// Handle to a text node of the host document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u64);

/// A position inside a text node, in UTF-16 code units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Boundary {
    pub node: NodeId,
    pub offset: u32,
}

impl Boundary {
    pub fn new(node: NodeId, offset: u32) -> Self {
        Self { node, offset }
    }
}

/// A detached copy of a document range. Holding one does not keep the
/// referenced nodes alive; it must be re-validated before use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextRange {
    pub start: Boundary,
    pub end: Boundary,
}

impl TextRange {
    pub fn new(start: Boundary, end: Boundary) -> Self {
        Self { start, end }
    }

    pub fn collapsed(at: Boundary) -> Self {
        Self { start: at, end: at }
    }

    pub fn is_collapsed(&self) -> bool {
        self.start == self.end
    }
}

/// What was selected, and where, at the moment the user asked for a rewrite.
///
/// The two variants restore through different algorithms and are kept apart
/// on purpose: character offsets mean nothing inside rich content, and a
/// range means nothing inside a form field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionSnapshot {
    /// Offsets into the value of an `<input>` or `<textarea>`.
    Field {
        element: ElementId,
        start: u32,
        end: u32,
    },
    /// A cloned range inside a contenteditable root.
    Range { element: ElementId, range: TextRange },
}

impl SelectionSnapshot {
    /// Builds a field snapshot, ordering the offsets so `start <= end`.
    pub fn field(element: ElementId, start: u32, end: u32) -> Self {
        Self::Field {
            element,
            start: start.min(end),
            end: start.max(end),
        }
    }

    pub fn range(element: ElementId, range: TextRange) -> Self {
        Self::Range { element, range }
    }

    /// The element the snapshot is anchored to.
    pub fn element(&self) -> ElementId {
        match self {
            Self::Field { element, .. } | Self::Range { element, .. } => *element,
        }
    }
}
