//! Document chunking.
//!
//! This module provides the [`Chunker`] trait and [`RecursiveChunker`], which
//! cuts text into overlapping windows of at most `chunk_size` characters,
//! preferring to end a chunk on a paragraph break, then a line break, then a
//! sentence end, then a space, and only cutting mid-word when the window holds
//! none of those.

use crate::config::{DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};
use crate::document::{Chunk, Document};

/// A strategy for splitting documents into chunks.
pub trait Chunker: Send + Sync {
    /// Split a document into chunks in reading order.
    ///
    /// Returns an empty `Vec` if the document has empty text.
    fn chunk(&self, document: &Document) -> Vec<Chunk>;
}

/// Break points tried in order, from the largest semantic unit to the smallest.
/// Separators within one level are equivalent; the latest match wins.
const BOUNDARIES: &[&[&str]] = &[&["\n\n"], &["\n"], &[". ", "! ", "? "], &[" "]];

/// Splits text on the largest boundary that fits, with character overlap.
///
/// Chunk IDs are generated as `{document_id}_{position}`. Each chunk records the
/// character offset it starts at, so consecutive chunks can be stitched back
/// together by dropping the overlapping prefix of the later one.
///
/// # Example
///
/// ```rust,ignore
/// use docrag::RecursiveChunker;
///
/// let chunker = RecursiveChunker::new(1000, 200);
/// let chunks = chunker.chunk(&document);
/// ```
#[derive(Debug, Clone)]
pub struct RecursiveChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl RecursiveChunker {
    /// Create a new `RecursiveChunker`.
    ///
    /// # Arguments
    ///
    /// * `chunk_size` - maximum number of characters per chunk
    /// * `chunk_overlap` - maximum number of characters shared by consecutive chunks
    ///
    /// An overlap of `chunk_size` or more is clamped to `chunk_size - 1`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self { chunk_size, chunk_overlap: chunk_overlap.min(chunk_size - 1) }
    }
}

impl Default for RecursiveChunker {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE, DEFAULT_CHUNK_OVERLAP)
    }
}

impl Chunker for RecursiveChunker {
    fn chunk(&self, document: &Document) -> Vec<Chunk> {
        if document.text.is_empty() {
            return Vec::new();
        }

        let text = CharText::new(&document.text);
        text.spans(self.chunk_size, self.chunk_overlap)
            .into_iter()
            .enumerate()
            .map(|(position, (start, end))| Chunk {
                id: format!("{}_{position}", document.id),
                document_id: document.id.clone(),
                text: text.slice(start, end).to_string(),
                position,
                start,
                source: document.source.clone(),
            })
            .collect()
    }
}

/// Text indexed by character, for cutting on character counts.
struct CharText<'a> {
    text: &'a str,
    /// Byte offset of every character, plus `text.len()` as a sentinel.
    offsets: Vec<usize>,
}

impl<'a> CharText<'a> {
    fn new(text: &'a str) -> Self {
        let offsets = text.char_indices().map(|(i, _)| i).chain(std::iter::once(text.len())).collect();
        Self { text, offsets }
    }

    fn char_count(&self) -> usize {
        self.offsets.len() - 1
    }

    fn slice(&self, start: usize, end: usize) -> &'a str {
        &self.text[self.offsets[start]..self.offsets[end]]
    }

    fn char_at(&self, index: usize) -> Option<char> {
        self.slice(index, index + 1).chars().next()
    }

    /// Character index of a byte offset that lies on a character boundary.
    fn char_index(&self, byte: usize) -> usize {
        self.offsets.binary_search(&byte).unwrap_or_else(|i| i)
    }

    fn spans(&self, chunk_size: usize, chunk_overlap: usize) -> Vec<(usize, usize)> {
        let total = self.char_count();
        let mut spans = Vec::new();
        if total == 0 {
            return spans;
        }

        let mut start = 0;
        loop {
            if total - start <= chunk_size {
                spans.push((start, total));
                break;
            }
            let limit = start + chunk_size;
            let end = self.find_break(start, limit, chunk_overlap).unwrap_or(limit);
            spans.push((start, end));
            start = self.next_start(start, end, chunk_overlap);
        }
        spans
    }

    /// The latest boundary in `(start, limit]` at the highest level that still
    /// leaves more than `min_len` characters in the chunk.
    fn find_break(&self, start: usize, limit: usize, min_len: usize) -> Option<usize> {
        let base = self.offsets[start];
        let window = self.slice(start, limit);
        for level in BOUNDARIES {
            let best = level
                .iter()
                .filter_map(|separator| window.rfind(separator).map(|pos| pos + separator.len()))
                .max();
            if let Some(byte_end) = best {
                let end = self.char_index(base + byte_end);
                if end - start > min_len {
                    return Some(end);
                }
            }
        }
        None
    }

    /// Where the chunk after `[start, end)` begins: `overlap` characters back
    /// from `end`, moved forward to the first word start in that window.
    fn next_start(&self, start: usize, end: usize, overlap: usize) -> usize {
        if overlap == 0 {
            return end;
        }
        let floor = end.saturating_sub(overlap).max(start + 1);
        (floor..end)
            .find(|&i| {
                let prev_is_space = self.char_at(i - 1).is_some_and(char::is_whitespace);
                let here_is_word = self.char_at(i).is_some_and(|c| !c.is_whitespace());
                prev_is_space && here_is_word
            })
            .unwrap_or(floor)
    }
}
