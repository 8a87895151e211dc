//! An in-memory host document: form fields, contenteditable roots made of
//! text nodes, focus, a window selection, and a native insert-text command
//! with input events and an undo stack.
use std::collections::BTreeMap;

use rewrite_core::{Boundary, ElementId, NodeId, TextRange};

use crate::utf16;
use crate::{EditorHost, ElementKind, HostError};

/// What the page's `input` listeners would have observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputEvent {
    pub target: ElementId,
    pub input_type: &'static str,
    pub data: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UndoEntry {
    pub target: ElementId,
    pub before: String,
    pub after: String,
}

#[derive(Debug, Clone)]
enum Content {
    Field {
        value: String,
        selection: Option<(u32, u32)>,
    },
    Nodes(Vec<NodeId>),
    Opaque,
}

#[derive(Debug, Clone)]
struct ElementEntry {
    kind: ElementKind,
    attached: bool,
    content: Content,
}

#[derive(Debug, Clone)]
struct TextNode {
    owner: ElementId,
    text: String,
}

#[derive(Debug, Clone)]
pub struct MemoryDocument {
    elements: BTreeMap<ElementId, ElementEntry>,
    nodes: BTreeMap<NodeId, TextNode>,
    active: Option<ElementId>,
    selection: Option<TextRange>,
    next_id: u64,
    native_insert: bool,
    input_events: Vec<InputEvent>,
    undo_stack: Vec<UndoEntry>,
}

impl Default for MemoryDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDocument {
    pub fn new() -> Self {
        Self {
            elements: BTreeMap::new(),
            nodes: BTreeMap::new(),
            active: None,
            selection: None,
            next_id: 1,
            native_insert: true,
            input_events: Vec::new(),
            undo_stack: Vec::new(),
        }
    }

    pub fn add_text_input(&mut self, value: &str) -> ElementId {
        self.add_field(ElementKind::TextInput, value)
    }

    pub fn add_textarea(&mut self, value: &str) -> ElementId {
        self.add_field(ElementKind::TextArea, value)
    }

    /// Adds a contenteditable root holding one text node per entry.
    pub fn add_contenteditable(&mut self, texts: &[&str]) -> ElementId {
        let element = ElementId(self.alloc());
        let mut ids = Vec::with_capacity(texts.len());
        for text in texts {
            let node = NodeId(self.alloc());
            self.nodes.insert(
                node,
                TextNode {
                    owner: element,
                    text: (*text).to_string(),
                },
            );
            ids.push(node);
        }
        self.elements.insert(
            element,
            ElementEntry {
                kind: ElementKind::ContentEditable,
                attached: true,
                content: Content::Nodes(ids),
            },
        );
        element
    }

    /// Adds a non-editable element, e.g. a button.
    pub fn add_element(&mut self) -> ElementId {
        let element = ElementId(self.alloc());
        self.elements.insert(
            element,
            ElementEntry {
                kind: ElementKind::Other,
                attached: true,
                content: Content::Opaque,
            },
        );
        element
    }

    pub fn text_nodes(&self, element: ElementId) -> Vec<NodeId> {
        match self.elements.get(&element).map(|entry| &entry.content) {
            Some(Content::Nodes(ids)) => ids.clone(),
            _ => Vec::new(),
        }
    }

    /// Field value, or the concatenated text of a contenteditable root.
    pub fn text(&self, element: ElementId) -> Option<String> {
        match &self.elements.get(&element)?.content {
            Content::Field { value, .. } => Some(value.clone()),
            Content::Nodes(ids) => Some(
                ids.iter()
                    .filter_map(|id| self.nodes.get(id))
                    .map(|node| node.text.as_str())
                    .collect(),
            ),
            Content::Opaque => None,
        }
    }

    /// Collapsed field selection, i.e. the caret offset.
    pub fn caret(&self, element: ElementId) -> Option<u32> {
        match self.elements.get(&element)?.content {
            Content::Field {
                selection: Some((start, end)),
                ..
            } if start == end => Some(start),
            _ => None,
        }
    }

    /// Simulates pages or browsers without a native insert-text command.
    pub fn set_native_insert(&mut self, enabled: bool) {
        self.native_insert = enabled;
    }

    /// Removes an element from the document, as a framework re-render would.
    pub fn detach(&mut self, element: ElementId) {
        if let Some(entry) = self.elements.get_mut(&element) {
            entry.attached = false;
        }
        if self.active == Some(element) {
            self.active = None;
        }
        let selection_inside = self
            .selection
            .as_ref()
            .is_some_and(|range| self.nodes.get(&range.start.node).map(|n| n.owner) == Some(element));
        if selection_inside {
            self.selection = None;
        }
    }

    /// Removes one text node from its root.
    pub fn remove_text_node(&mut self, node: NodeId) -> bool {
        let Some(removed) = self.nodes.remove(&node) else {
            return false;
        };
        if let Some(Content::Nodes(ids)) = self
            .elements
            .get_mut(&removed.owner)
            .map(|entry| &mut entry.content)
        {
            ids.retain(|id| *id != node);
        }
        true
    }

    /// Focuses a field and sets its selection, as a user drag would.
    pub fn select_field(&mut self, element: ElementId, start: u32, end: u32) -> Result<(), HostError> {
        self.focus(element)?;
        self.set_field_selection(element, start, end)
    }

    /// Selects a range inside a contenteditable root and focuses the root.
    pub fn select_text(&mut self, range: TextRange) -> Result<(), HostError> {
        let (owner, _, _) = self.locate(&range)?;
        self.active = Some(owner);
        self.selection = Some(range);
        Ok(())
    }

    pub fn input_events(&self) -> &[InputEvent] {
        &self.input_events
    }

    pub fn undo_stack(&self) -> &[UndoEntry] {
        &self.undo_stack
    }

    /// Reverts the last native edit. Returns false when there is none or
    /// its element can no longer be written; the entry then stays put.
    pub fn undo(&mut self) -> bool {
        let Some(entry) = self.undo_stack.pop() else {
            return false;
        };
        if self.revert(&entry).is_err() {
            self.undo_stack.push(entry);
            return false;
        }
        self.input_events.push(InputEvent {
            target: entry.target,
            input_type: "historyUndo",
            data: String::new(),
        });
        true
    }

    fn revert(&mut self, entry: &UndoEntry) -> Result<(), HostError> {
        if !self.is_attached(entry.target) {
            return Err(HostError::DetachedElement(entry.target));
        }
        match self.element_kind(entry.target) {
            Some(kind) if kind.is_field() => self.set_field_value(entry.target, &entry.before),
            Some(ElementKind::ContentEditable) => {
                let node = NodeId(self.alloc());
                let old = self.text_nodes(entry.target);
                for id in &old {
                    self.nodes.remove(id);
                }
                self.nodes.insert(
                    node,
                    TextNode {
                        owner: entry.target,
                        text: entry.before.clone(),
                    },
                );
                if let Some(element) = self.elements.get_mut(&entry.target) {
                    element.content = Content::Nodes(vec![node]);
                }
                self.selection = None;
                Ok(())
            }
            _ => Err(HostError::NotAField(entry.target)),
        }
    }

    fn add_field(&mut self, kind: ElementKind, value: &str) -> ElementId {
        let element = ElementId(self.alloc());
        self.elements.insert(
            element,
            ElementEntry {
                kind,
                attached: true,
                content: Content::Field {
                    value: value.to_string(),
                    selection: None,
                },
            },
        );
        element
    }

    fn alloc(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn entry(&self, element: ElementId) -> Result<&ElementEntry, HostError> {
        self.elements
            .get(&element)
            .ok_or(HostError::UnknownElement(element))
    }

    /// Owner root and index of an attached text node.
    fn node_position(&self, node: NodeId) -> Result<(ElementId, usize), HostError> {
        let owner = self
            .nodes
            .get(&node)
            .map(|n| n.owner)
            .ok_or(HostError::DetachedNode(node))?;
        let entry = self.entry(owner)?;
        if !entry.attached {
            return Err(HostError::DetachedNode(node));
        }
        match &entry.content {
            Content::Nodes(ids) => ids
                .iter()
                .position(|id| *id == node)
                .map(|index| (owner, index))
                .ok_or(HostError::DetachedNode(node)),
            _ => Err(HostError::DetachedNode(node)),
        }
    }

    fn node_text(&self, node: NodeId) -> &str {
        self.nodes.get(&node).map(|n| n.text.as_str()).unwrap_or("")
    }

    /// Checks that both boundaries are attached, in bounds, ordered and in
    /// the same root. Returns the root and both node indices.
    fn locate(&self, range: &TextRange) -> Result<(ElementId, usize, usize), HostError> {
        let (owner, start_index) = self.node_position(range.start.node)?;
        let (end_owner, end_index) = self.node_position(range.end.node)?;
        if owner != end_owner {
            return Err(HostError::InvalidRange);
        }
        let in_bounds = |b: &Boundary| b.offset <= utf16::len(self.node_text(b.node));
        if !in_bounds(&range.start) || !in_bounds(&range.end) {
            return Err(HostError::InvalidRange);
        }
        if (start_index, range.start.offset) > (end_index, range.end.offset) {
            return Err(HostError::InvalidRange);
        }
        Ok((owner, start_index, end_index))
    }

    fn record_edit(&mut self, target: ElementId, before: String, data: &str) {
        let after = self.text(target).unwrap_or_default();
        self.undo_stack.push(UndoEntry {
            target,
            before,
            after,
        });
        self.input_events.push(InputEvent {
            target,
            input_type: "insertText",
            data: data.to_string(),
        });
    }
}

impl EditorHost for MemoryDocument {
    fn active_element(&self) -> Option<ElementId> {
        self.active
    }

    fn element_kind(&self, element: ElementId) -> Option<ElementKind> {
        self.elements.get(&element).map(|entry| entry.kind)
    }

    fn is_attached(&self, element: ElementId) -> bool {
        self.elements.get(&element).is_some_and(|entry| entry.attached)
    }

    fn focus(&mut self, element: ElementId) -> Result<(), HostError> {
        if !self.entry(element)?.attached {
            return Err(HostError::DetachedElement(element));
        }
        self.active = Some(element);
        Ok(())
    }

    fn field_value(&self, element: ElementId) -> Result<String, HostError> {
        match &self.entry(element)?.content {
            Content::Field { value, .. } => Ok(value.clone()),
            _ => Err(HostError::NotAField(element)),
        }
    }

    fn field_selection(
        &self,
        element: ElementId,
    ) -> Result<(Option<u32>, Option<u32>), HostError> {
        match &self.entry(element)?.content {
            Content::Field { selection, .. } => {
                Ok((selection.map(|(s, _)| s), selection.map(|(_, e)| e)))
            }
            _ => Err(HostError::NotAField(element)),
        }
    }

    fn set_field_selection(
        &mut self,
        element: ElementId,
        start: u32,
        end: u32,
    ) -> Result<(), HostError> {
        let entry = self
            .elements
            .get_mut(&element)
            .ok_or(HostError::UnknownElement(element))?;
        match &mut entry.content {
            Content::Field { value, selection } => {
                let len = utf16::len(value);
                let end = end.min(len);
                *selection = Some((start.min(end), end));
                Ok(())
            }
            _ => Err(HostError::NotAField(element)),
        }
    }

    fn set_field_value(&mut self, element: ElementId, new_value: &str) -> Result<(), HostError> {
        let entry = self
            .elements
            .get_mut(&element)
            .ok_or(HostError::UnknownElement(element))?;
        match &mut entry.content {
            Content::Field { value, selection } => {
                *value = new_value.to_string();
                let len = utf16::len(value);
                *selection = Some((len, len));
                Ok(())
            }
            _ => Err(HostError::NotAField(element)),
        }
    }

    fn window_selection(&self) -> Option<TextRange> {
        self.selection.clone()
    }

    fn set_window_selection(&mut self, range: &TextRange) -> Result<(), HostError> {
        self.locate(range)?;
        self.selection = Some(range.clone());
        Ok(())
    }

    fn editable_root(&self, range: &TextRange) -> Option<ElementId> {
        let (owner, _, _) = self.locate(range).ok()?;
        (self.element_kind(owner) == Some(ElementKind::ContentEditable)).then_some(owner)
    }

    fn range_text(&self, range: &TextRange) -> Result<String, HostError> {
        let (owner, start_index, end_index) = self.locate(range)?;
        let start_text = self.node_text(range.start.node);
        if start_index == end_index {
            return Ok(utf16::slice(start_text, range.start.offset, range.end.offset).to_string());
        }
        let mut out = utf16::slice(start_text, range.start.offset, u32::MAX).to_string();
        for node in &self.text_nodes(owner)[start_index + 1..end_index] {
            out.push_str(self.node_text(*node));
        }
        out.push_str(utf16::slice(self.node_text(range.end.node), 0, range.end.offset));
        Ok(out)
    }

    fn replace_range_with_text_node(
        &mut self,
        range: &TextRange,
        text: &str,
    ) -> Result<NodeId, HostError> {
        // Validate everything before touching the tree.
        let (owner, start_index, end_index) = self.locate(range)?;
        let prefix = utf16::slice(self.node_text(range.start.node), 0, range.start.offset).to_string();
        let suffix =
            utf16::slice(self.node_text(range.end.node), range.end.offset, u32::MAX).to_string();

        let inserted = NodeId(self.alloc());
        let trailing = (!suffix.is_empty()).then(|| NodeId(self.alloc()));

        let Some(Content::Nodes(ids)) = self
            .elements
            .get_mut(&owner)
            .map(|entry| &mut entry.content)
        else {
            return Err(HostError::InvalidRange);
        };
        let removed: Vec<NodeId> = ids.drain(start_index + 1..=end_index).collect();
        ids.insert(start_index + 1, inserted);
        if let Some(trailing) = trailing {
            ids.insert(start_index + 2, trailing);
        }

        for node in removed {
            self.nodes.remove(&node);
        }
        if let Some(start) = self.nodes.get_mut(&range.start.node) {
            start.text = prefix;
        }
        self.nodes.insert(
            inserted,
            TextNode {
                owner,
                text: text.to_string(),
            },
        );
        if let Some(trailing) = trailing {
            self.nodes.insert(trailing, TextNode { owner, text: suffix });
        }
        self.selection = Some(TextRange::collapsed(Boundary::new(
            inserted,
            utf16::len(text),
        )));
        Ok(inserted)
    }

    fn insert_text(&mut self, text: &str) -> Result<(), HostError> {
        if !self.native_insert {
            return Err(HostError::InsertUnsupported);
        }
        let active = self
            .active
            .filter(|element| self.is_attached(*element))
            .ok_or(HostError::NothingEditable)?;

        match self.element_kind(active) {
            Some(kind) if kind.is_field() => {
                let before = self.field_value(active)?;
                let len = utf16::len(&before);
                let (start, end) = match self.field_selection(active)? {
                    (Some(start), Some(end)) => (start.min(len), end.min(len)),
                    _ => (len, len),
                };
                let after = utf16::splice(&before, start, end, text);
                let caret = start + utf16::len(text);
                self.set_field_value(active, &after)?;
                self.set_field_selection(active, caret, caret)?;
                self.record_edit(active, before, text);
                Ok(())
            }
            Some(ElementKind::ContentEditable) => {
                let range = self.selection.clone().ok_or(HostError::NothingEditable)?;
                if self.editable_root(&range) != Some(active) {
                    return Err(HostError::NothingEditable);
                }
                let before = self.text(active).unwrap_or_default();
                self.replace_range_with_text_node(&range, text)?;
                self.record_edit(active, before, text);
                Ok(())
            }
            _ => Err(HostError::NothingEditable),
        }
    }
}
