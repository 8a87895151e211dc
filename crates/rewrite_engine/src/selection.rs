//! Captures what the user selected and later writes replacement text back
//! over it, even after the page has moved focus or re-rendered.
use rewrite_core::{Anchor, Boundary, Capture, ElementId, SelectionSnapshot, TextRange};
use rewrite_logging::{excerpt, rewrite_debug, rewrite_info, rewrite_warn};
use thiserror::Error;

use crate::utf16;
use crate::{EditorHost, ElementKind, HostError};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RestoreError {
    #[error("the selected element is no longer on the page")]
    StaleTarget,
    #[error("the selection could not be re-established: {0}")]
    SelectionRejected(HostError),
    #[error("the text could not be inserted: {0}")]
    InsertionFailed(HostError),
}

/// Snapshot of the current selection, or `None` when there is nothing a
/// rewrite could replace.
pub fn snapshot<H: EditorHost + ?Sized>(host: &H) -> Option<SelectionSnapshot> {
    if let Some(element) = host.active_element() {
        if host.element_kind(element).is_some_and(ElementKind::is_field) {
            let (start, end) = host.field_selection(element).ok()?;
            return Some(SelectionSnapshot::field(
                element,
                start.unwrap_or(0),
                end.unwrap_or(0),
            ));
        }
    }

    let range = host.window_selection()?;
    if range.is_collapsed() {
        return None;
    }
    let root = host.editable_root(&range)?;
    Some(SelectionSnapshot::range(root, range))
}

/// The text the snapshot covers right now. Empty when it can no longer be
/// read.
pub fn selected_text<H: EditorHost + ?Sized>(host: &H, snapshot: &SelectionSnapshot) -> String {
    let text = match snapshot {
        SelectionSnapshot::Field {
            element,
            start,
            end,
        } => host
            .field_value(*element)
            .map(|value| utf16::slice(&value, *start, *end).to_string()),
        SelectionSnapshot::Range { range, .. } => host.range_text(range),
    };
    text.unwrap_or_else(|err| {
        rewrite_debug!("selection text unavailable: {}", err);
        String::new()
    })
}

/// Snapshot plus its text, taken together when the user triggers a rewrite.
pub fn capture<H: EditorHost + ?Sized>(host: &H, anchor: Option<Anchor>) -> Option<Capture> {
    let snapshot = snapshot(host)?;
    let selected_text = selected_text(host, &snapshot);
    Some(Capture {
        snapshot,
        selected_text,
        anchor,
    })
}

/// Replaces the snapshotted selection with `text`.
///
/// When the snapshot's element has left the document the text goes to the
/// focused editable element instead, if there is one.
pub fn restore<H: EditorHost + ?Sized>(
    host: &mut H,
    text: &str,
    snapshot: &SelectionSnapshot,
) -> Result<(), RestoreError> {
    if host.is_attached(snapshot.element()) {
        return replace(host, text, snapshot);
    }
    rewrite_info!(
        "restore target {:?} left the document",
        snapshot.element()
    );
    let current = focused_selection(host).ok_or(RestoreError::StaleTarget)?;
    rewrite_info!("inserting at focused element {:?} instead", current.element());
    replace(host, text, &current)
}

fn replace<H: EditorHost + ?Sized>(
    host: &mut H,
    text: &str,
    snapshot: &SelectionSnapshot,
) -> Result<(), RestoreError> {
    let element = snapshot.element();
    host.focus(element)
        .map_err(RestoreError::SelectionRejected)?;

    match snapshot {
        SelectionSnapshot::Field { start, end, .. } => {
            host.set_field_selection(element, *start, *end)
                .map_err(RestoreError::SelectionRejected)?;
            if insert_natively(host, text) {
                return Ok(());
            }
            splice_field(host, element, *start, *end, text)
                .map_err(RestoreError::InsertionFailed)
        }
        SelectionSnapshot::Range { range, .. } => {
            host.set_window_selection(range)
                .map_err(RestoreError::SelectionRejected)?;
            if insert_natively(host, text) {
                return Ok(());
            }
            let node = host
                .replace_range_with_text_node(range, text)
                .map_err(RestoreError::InsertionFailed)?;
            // The document already holds the new text here.
            let after = TextRange::collapsed(Boundary::new(node, utf16::len(text)));
            if let Err(err) = host.set_window_selection(&after) {
                rewrite_warn!("could not place the caret after the inserted text: {}", err);
            }
            Ok(())
        }
    }
}

fn insert_natively<H: EditorHost + ?Sized>(host: &mut H, text: &str) -> bool {
    match host.insert_text(text) {
        Ok(()) => {
            rewrite_debug!("inserted {} natively", excerpt(text));
            true
        }
        Err(err) => {
            rewrite_warn!("native insert failed ({}); replacing manually", err);
            false
        }
    }
}

fn splice_field<H: EditorHost + ?Sized>(
    host: &mut H,
    element: ElementId,
    start: u32,
    end: u32,
    text: &str,
) -> Result<(), HostError> {
    let value = host.field_value(element)?;
    let len = utf16::len(&value);
    let (start, end) = (start.min(len), end.min(len));
    host.set_field_value(element, &utf16::splice(&value, start, end, text))?;
    let caret = start + utf16::len(text);
    host.set_field_selection(element, caret, caret)
}

/// The focused element's current selection, collapsed or not.
fn focused_selection<H: EditorHost + ?Sized>(host: &H) -> Option<SelectionSnapshot> {
    let element = host.active_element().filter(|el| host.is_attached(*el))?;
    match host.element_kind(element)? {
        kind if kind.is_field() => {
            let value = host.field_value(element).ok()?;
            let caret = utf16::len(&value);
            let (start, end) = host.field_selection(element).ok()?;
            Some(SelectionSnapshot::field(
                element,
                start.unwrap_or(caret),
                end.unwrap_or(caret),
            ))
        }
        ElementKind::ContentEditable => {
            let range = host.window_selection()?;
            (host.editable_root(&range) == Some(element))
                .then(|| SelectionSnapshot::range(element, range))
        }
        _ => None,
    }
}
