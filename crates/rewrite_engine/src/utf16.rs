//! Conversions between UTF-16 offsets (what the browser reports) and byte
//! indices into Rust strings.

pub(crate) fn len(text: &str) -> u32 {
    text.encode_utf16().count() as u32
}

/// Byte index of UTF-16 `offset`, clamped to the end of `text`. An offset
/// inside a surrogate pair rounds down to the start of that character.
pub(crate) fn byte_index(text: &str, offset: u32) -> usize {
    let mut units = 0u32;
    for (index, ch) in text.char_indices() {
        let next = units + ch.len_utf16() as u32;
        if next > offset {
            return index;
        }
        units = next;
    }
    text.len()
}

pub(crate) fn slice(text: &str, start: u32, end: u32) -> &str {
    let start = byte_index(text, start);
    let end = byte_index(text, end).max(start);
    &text[start..end]
}

/// `text` with the UTF-16 range `[start, end)` replaced by `insert`.
pub(crate) fn splice(text: &str, start: u32, end: u32, insert: &str) -> String {
    let start = byte_index(text, start);
    let end = byte_index(text, end).max(start);
    let mut out = String::with_capacity(text.len() - (end - start) + insert.len());
    out.push_str(&text[..start]);
    out.push_str(insert);
    out.push_str(&text[end..]);
    out
}
