/// Convert a byte offset within a line to a UTF-16 column, which is what LSP
/// positions carry. Offsets past the end of the line clamp to its length.
pub fn byte_offset_to_utf16_column(line: &str, byte_offset: usize) -> u32 {
    let mut end = byte_offset.min(line.len());
    while !line.is_char_boundary(end) {
        end -= 1;
    }
    line[..end].encode_utf16().count() as u32
}
