//! Fixed-size sliding-window chunking.
//!
//! Documents are split into windows of `size` characters (Unicode scalar values, not bytes).
//! Each window starts `size - overlap` characters after the previous one, so neighbouring
//! chunks share `overlap` characters of context. Highlights:
//!
//! - Validation happens once, in [`ChunkConfig::new`]: an overlap that is not strictly smaller
//!   than the window would never advance and is rejected before any work starts.
//! - [`chunk`] is lazy and allocation-free; the returned [`Chunks`] iterator borrows the text
//!   and can be cloned to restart the sequence from the beginning.
//! - Windows that are empty or all whitespace are skipped but still consume a position, so
//!   ordinals count emitted chunks only.

use super::types::ChunkingError;

/// Validated window parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkConfig {
    size: usize,
    overlap: usize,
}

impl ChunkConfig {
    /// Validate a window size and overlap, both in characters.
    pub fn new(size: usize, overlap: usize) -> Result<Self, ChunkingError> {
        if overlap >= size {
            return Err(ChunkingError::InvalidConfiguration { size, overlap });
        }
        Ok(Self { size, overlap })
    }

    /// Window size in characters.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Characters shared by neighbouring windows.
    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Distance between the starts of two consecutive windows.
    pub fn stride(&self) -> usize {
        self.size - self.overlap
    }
}

/// One emitted window of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk<'a> {
    /// Window contents, untrimmed.
    pub text: &'a str,
    /// Position among the emitted chunks of this document, starting at 0.
    pub ordinal: usize,
}

/// Lazy iterator over the chunks of a document.
#[derive(Debug, Clone)]
pub struct Chunks<'a> {
    text: &'a str,
    config: ChunkConfig,
    start: usize,
    next_ordinal: usize,
}

/// Split `text` into overlapping windows described by `config`.
pub fn chunk(text: &str, config: ChunkConfig) -> Chunks<'_> {
    Chunks {
        text,
        config,
        start: 0,
        next_ordinal: 0,
    }
}

/// Eagerly chunk `text`, validating the parameters first.
pub fn chunk_text(text: &str, size: usize, overlap: usize) -> Result<Vec<String>, ChunkingError> {
    let config = ChunkConfig::new(size, overlap)?;
    Ok(chunk(text, config)
        .map(|chunk| chunk.text.to_string())
        .collect())
}

impl<'a> Iterator for Chunks<'a> {
    type Item = Chunk<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.start < self.text.len() {
            let rest = &self.text[self.start..];
            let end = self.start + byte_offset_of_char(rest, self.config.size);
            let window = &self.text[self.start..end];
            self.start += byte_offset_of_char(rest, self.config.stride());

            if window.trim().is_empty() {
                continue;
            }

            let ordinal = self.next_ordinal;
            self.next_ordinal += 1;
            return Some(Chunk {
                text: window,
                ordinal,
            });
        }
        None
    }
}

/// Byte offset of the `n`th character of `text`, or its length when it is shorter.
fn byte_offset_of_char(text: &str, n: usize) -> usize {
    text.char_indices()
        .nth(n)
        .map(|(offset, _)| offset)
        .unwrap_or(text.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(size: usize, overlap: usize) -> ChunkConfig {
        ChunkConfig::new(size, overlap).expect("valid config")
    }

    #[test]
    fn rejects_overlap_not_smaller_than_size() {
        for (size, overlap) in [(10, 10), (10, 11), (0, 0)] {
            let err = ChunkConfig::new(size, overlap).expect_err("must fail");
            assert!(matches!(
                err,
                ChunkingError::InvalidConfiguration { size: s, overlap: o } if s == size && o == overlap
            ));
        }
        assert!(chunk_text("abc", 3, 3).is_err());
    }

    #[test]
    fn empty_text_yields_nothing() {
        assert_eq!(chunk("", config(5, 1)).count(), 0);
        assert!(chunk_text("", 5, 1).expect("chunks").is_empty());
    }

    #[test]
    fn windows_advance_by_stride() {
        let text = "abcdefghijklmnopqrstuvwxyz";
        let chunks: Vec<_> = chunk(text, config(10, 3)).collect();
        let texts: Vec<_> = chunks.iter().map(|chunk| chunk.text).collect();
        assert_eq!(
            texts,
            vec!["abcdefghij", "hijklmnopq", "opqrstuvwx", "vwxyz"]
        );
        let ordinals: Vec<_> = chunks.iter().map(|chunk| chunk.ordinal).collect();
        assert_eq!(ordinals, vec![0, 1, 2, 3]);
    }

    #[test]
    fn windows_cover_text_for_many_shapes() {
        let text: String = (0..137u32)
            .map(|i| char::from_u32('a' as u32 + i % 26).expect("ascii letter"))
            .collect();
        for size in 1..12 {
            for overlap in 0..size {
                let stride = size - overlap;
                let chunks: Vec<_> = chunk(&text, config(size, overlap)).collect();
                for (index, chunk) in chunks.iter().enumerate() {
                    let start = index * stride;
                    let expected_end = (start + size).min(text.len());
                    assert_eq!(chunk.text, &text[start..expected_end]);
                }
                let last_start = (chunks.len() - 1) * stride;
                assert!(last_start < text.len());
                assert!(last_start + stride >= text.len());
            }
        }
    }

    #[test]
    fn whitespace_windows_are_skipped_but_consume_positions() {
        let text = "aaaa        bbbb";
        let chunks: Vec<_> = chunk(text, config(4, 0)).collect();
        assert_eq!(
            chunks,
            vec![
                Chunk {
                    text: "aaaa",
                    ordinal: 0
                },
                Chunk {
                    text: "bbbb",
                    ordinal: 1
                },
            ]
        );
    }

    #[test]
    fn counts_characters_not_bytes() {
        let text = "日本語のテキストです";
        let chunks = chunk_text(text, 4, 1).expect("chunks");
        assert_eq!(chunks, vec!["日本語の", "のテキス", "ストです", "す"]);
    }

    #[test]
    fn sequence_restarts_when_cloned() {
        let chunks = chunk("one two three four", config(5, 2));
        let first: Vec<_> = chunks.clone().collect();
        let second: Vec<_> = chunks.collect();
        assert_eq!(first, second);
        assert!(!first.is_empty());
    }
}
