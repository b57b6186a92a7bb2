//! Interned string literals laid out in one backing blob

use std::collections::HashMap;

use super::constpool::modified_utf8_len;

/// Largest modified-UTF-8 payload a single `Utf8` constant can carry
pub const MAX_CHUNK_BYTES: usize = u16::MAX as usize;

/// Distinct literals in insertion order, each at a fixed byte offset.
///
/// The offset of a string is the total UTF-8 length of everything interned
/// before it, so the concatenation of all literals can be placed in linear
/// memory once and each occurrence addressed as `base + offset`.
#[derive(Debug, Clone, Default)]
pub struct InternedStrings {
    blob: String,
    offsets: HashMap<String, usize>,
    count: usize,
}

impl InternedStrings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offset of `value` in the blob, appending it on first sight
    pub fn intern(&mut self, value: &str) -> usize {
        if let Some(&offset) = self.offsets.get(value) {
            return offset;
        }
        let offset = self.blob.len();
        self.blob.push_str(value);
        self.offsets.insert(value.to_string(), offset);
        self.count += 1;
        offset
    }

    /// Number of distinct strings
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Total size of the blob in bytes
    pub fn byte_len(&self) -> usize {
        self.blob.len()
    }

    pub fn blob(&self) -> &str {
        &self.blob
    }

    /// Split the blob into pieces that each fit in one string constant.
    ///
    /// Pieces break on character boundaries and concatenate back to the blob.
    pub fn chunks(&self) -> Vec<&str> {
        let mut chunks = Vec::new();
        let mut start = 0;
        let mut size = 0;
        for (at, c) in self.blob.char_indices() {
            let mut buf = [0u8; 4];
            let width = modified_utf8_len(c.encode_utf8(&mut buf));
            if size + width > MAX_CHUNK_BYTES {
                chunks.push(&self.blob[start..at]);
                start = at;
                size = 0;
            }
            size += width;
        }
        if start < self.blob.len() {
            chunks.push(&self.blob[start..]);
        }
        chunks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offsets_are_cumulative_utf8_lengths() {
        let mut strings = InternedStrings::new();
        assert_eq!(strings.intern("hi"), 0);
        assert_eq!(strings.intern("héllo"), 2);
        assert_eq!(strings.intern("hi"), 0);
        assert_eq!(strings.intern("x\0"), 8);
        assert_eq!(strings.len(), 3);
        assert_eq!(strings.byte_len(), 10);
    }

    #[test]
    fn chunks_fit_in_constants() {
        let mut strings = InternedStrings::new();
        strings.intern(&"a".repeat(MAX_CHUNK_BYTES));
        strings.intern("\0\0");
        let chunks = strings.chunks();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks.concat(), strings.blob());
        assert_eq!(chunks[1], "\0\0");
    }
}
