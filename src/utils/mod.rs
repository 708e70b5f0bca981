pub mod paths;

/// Convert a usize to a u32 for use in `lsp_types::Position`.
#[allow(clippy::cast_possible_truncation)]
#[must_use]
pub fn as_pos_idx(x: usize) -> u32 {
    x as u32
}

/// Convert a UTF-16 code unit offset, as LSP positions measure characters,
/// into a byte offset into `s`. Clamped to the end of the string.
#[must_use]
pub fn utf16_to_byte_idx(s: &str, utf16_idx: usize) -> usize {
    let mut units = 0;
    for (byte_idx, c) in s.char_indices() {
        if units >= utf16_idx {
            return byte_idx;
        }
        units += c.len_utf16();
    }
    s.len()
}

/// Convert a byte offset into `s` back into UTF-16 code units.
#[must_use]
pub fn byte_to_utf16_idx(s: &str, byte_idx: usize) -> usize {
    s[..byte_idx.min(s.len())].chars().map(char::len_utf16).sum()
}
