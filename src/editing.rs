//! Text editing helpers for snippet editors.

/// Indent inserted for a Tab key press.
pub const INDENT: &str = "  ";

/// Replace the selection `start..end` of `text` with [`INDENT`].
///
/// Offsets are byte offsets; they are clamped to the text length and moved
/// back to the nearest char boundary, and swapped if reversed. Returns the new
/// text and the cursor position just after the inserted indent.
///
/// ```
/// let (text, cursor) = snipshot::editing::insert_indent("ab", 1, 1);
/// assert_eq!(text, "a  b");
/// assert_eq!(cursor, 3);
/// ```
pub fn insert_indent(text: &str, start: usize, end: usize) -> (String, usize) {
    let mut start = floor_char_boundary(text, start);
    let mut end = floor_char_boundary(text, end);
    if start > end {
        std::mem::swap(&mut start, &mut end);
    }

    let mut out = String::with_capacity(text.len() - (end - start) + INDENT.len());
    out.push_str(&text[..start]);
    out.push_str(INDENT);
    out.push_str(&text[end..]);
    (out, start + INDENT.len())
}

fn floor_char_boundary(text: &str, index: usize) -> usize {
    let mut i = index.min(text.len());
    while !text.is_char_boundary(i) {
        i -= 1;
    }
    i
}
