//! Document chunking strategies.
//!
//! This module provides the [`Chunker`] trait, the character-window primitive
//! [`split`], and two implementations:
//!
//! - [`FixedSizeChunker`]: splits by character count with configurable overlap
//! - [`SeparatorChunker`]: packs paragraphs into chunks, hard-splitting oversized ones
//!
//! Sizes are counted in Unicode scalar values, never bytes, so multi-byte text
//! is never cut inside a character.

use std::sync::Arc;

use uuid::Uuid;

use crate::config::{ChunkStrategy, RagConfig};
use crate::document::{CHUNK_INDEX_KEY, Chunk, Document};

/// A strategy for splitting documents into chunks.
pub trait Chunker: Send + Sync {
    /// Split a document into chunks.
    ///
    /// Returns an empty `Vec` if the document has empty text. Every chunk gets
    /// a fresh unique id and a copy of the document's metadata.
    fn chunk(&self, document: &Document) -> Vec<Chunk>;
}

/// Build the chunker described by a pipeline configuration.
pub fn chunker_for(config: &RagConfig) -> Arc<dyn Chunker> {
    match config.chunk_strategy {
        ChunkStrategy::Fixed => {
            Arc::new(FixedSizeChunker::new(config.chunk_size, config.chunk_overlap))
        }
        ChunkStrategy::Separator => {
            Arc::new(SeparatorChunker::new(config.chunk_size, config.chunk_overlap))
        }
    }
}

/// Split `text` into windows of at most `max_chunk_size` characters.
///
/// Windows start every `max_chunk_size - overlap` characters, so adjacent
/// windows share `overlap` characters. The last window always ends at the end
/// of the text. With `overlap == 0` the windows concatenate back to `text`.
///
/// Callers are expected to pass `max_chunk_size > 0` and
/// `overlap < max_chunk_size`; out-of-range values are clamped.
pub fn split(text: &str, max_chunk_size: usize, overlap: usize) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }

    let max_chunk_size = max_chunk_size.max(1);
    let step = max_chunk_size.saturating_sub(overlap).max(1);

    // Byte offset of every character start, plus the end of the text.
    let boundaries: Vec<usize> =
        text.char_indices().map(|(i, _)| i).chain(std::iter::once(text.len())).collect();
    let char_count = boundaries.len() - 1;

    let mut windows = Vec::with_capacity(char_count.div_ceil(step));
    let mut start = 0;
    loop {
        let end = (start + max_chunk_size).min(char_count);
        windows.push(text[boundaries[start]..boundaries[end]].to_string());
        if end == char_count {
            break;
        }
        start += step;
    }
    windows
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

fn into_chunks(document: &Document, texts: Vec<String>) -> Vec<Chunk> {
    texts
        .into_iter()
        .enumerate()
        .map(|(i, text)| {
            let mut metadata = document.metadata.clone();
            metadata.insert(CHUNK_INDEX_KEY.to_string(), i.to_string());
            Chunk { id: Uuid::new_v4().to_string(), text, metadata }
        })
        .collect()
}

/// Splits text into fixed-size chunks by character count with configurable overlap.
///
/// # Example
///
/// ```rust,ignore
/// use docvault_rag::FixedSizeChunker;
///
/// let chunker = FixedSizeChunker::new(1000, 0);
/// let chunks = chunker.chunk(&document);
/// ```
#[derive(Debug, Clone)]
pub struct FixedSizeChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl FixedSizeChunker {
    /// Create a new `FixedSizeChunker`.
    ///
    /// # Arguments
    ///
    /// * `chunk_size`: maximum number of characters per chunk
    /// * `chunk_overlap`: number of overlapping characters between consecutive chunks
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self { chunk_size, chunk_overlap }
    }
}

impl Chunker for FixedSizeChunker {
    fn chunk(&self, document: &Document) -> Vec<Chunk> {
        into_chunks(document, split(&document.text, self.chunk_size, self.chunk_overlap))
    }
}

/// Packs paragraphs (separated by `"\n\n"`) into chunks of at most `chunk_size`
/// characters.
///
/// Separators stay attached to the paragraph before them, so with no overlap
/// the chunks concatenate back to the original text. A paragraph longer than
/// the budget is cut into fixed windows. With overlap, each chunk after the
/// first is prefixed with the last `chunk_overlap` characters of the previous
/// one and new content is limited to `chunk_size - chunk_overlap` characters.
#[derive(Debug, Clone)]
pub struct SeparatorChunker {
    chunk_size: usize,
    chunk_overlap: usize,
    separator: String,
}

impl SeparatorChunker {
    /// Create a new `SeparatorChunker` splitting on blank lines.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self { chunk_size, chunk_overlap, separator: "\n\n".to_string() }
    }

    /// Use a different separator.
    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }

    fn bodies(&self, text: &str) -> Vec<String> {
        let budget = self.chunk_size.max(1).saturating_sub(self.chunk_overlap).max(1);
        let mut bodies = Vec::new();
        let mut current = String::new();
        let mut current_len = 0;

        for segment in split_keeping_separator(text, &self.separator) {
            let segment_len = char_len(segment);
            if segment_len > budget {
                if !current.is_empty() {
                    bodies.push(std::mem::take(&mut current));
                    current_len = 0;
                }
                bodies.extend(split(segment, budget, 0));
            } else if current_len + segment_len <= budget {
                current.push_str(segment);
                current_len += segment_len;
            } else {
                bodies.push(std::mem::replace(&mut current, segment.to_string()));
                current_len = segment_len;
            }
        }
        if !current.is_empty() {
            bodies.push(current);
        }
        bodies
    }
}

/// Split text at a separator while keeping the separator attached to the preceding segment.
fn split_keeping_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    if separator.is_empty() {
        return vec![text];
    }

    let mut result = Vec::new();
    let mut start = 0;

    while let Some(pos) = text[start..].find(separator) {
        let end = start + pos + separator.len();
        result.push(&text[start..end]);
        start = end;
    }

    if start < text.len() {
        result.push(&text[start..]);
    }

    result
}

/// Prefix every body after the first with the tail of the previous body.
fn with_overlap(bodies: Vec<String>, overlap: usize) -> Vec<String> {
    if overlap == 0 {
        return bodies;
    }

    let mut chunks = Vec::with_capacity(bodies.len());
    let mut previous: Option<&str> = None;
    for body in &bodies {
        let chunk = match previous {
            Some(prev) => {
                let skip = char_len(prev).saturating_sub(overlap);
                let tail: String = prev.chars().skip(skip).collect();
                tail + body
            }
            None => body.clone(),
        };
        chunks.push(chunk);
        previous = Some(body);
    }
    chunks
}

impl Chunker for SeparatorChunker {
    fn chunk(&self, document: &Document) -> Vec<Chunk> {
        if document.text.is_empty() {
            return Vec::new();
        }
        let texts = with_overlap(self.bodies(&document.text), self.chunk_overlap);
        into_chunks(document, texts)
    }
}
