//! Sliding-window chunking of extracted document text
//!
//! Offsets are character offsets into the extracted text. Each window covers
//! `[start, min(start + chunk_size, len))` and the next window starts
//! `overlap` characters before the previous end. Once a window reaches the end
//! of the text there is nothing left to cover, so no trailing window is
//! emitted.

use crate::{Error, Result};

/// Chunk geometry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub overlap: usize,
}

impl ChunkingConfig {
    /// Create a validated geometry
    ///
    /// # Errors
    ///
    /// Returns error if `chunk_size` is zero or `overlap >= chunk_size`
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(Error::Config("chunk size must be positive".to_string()));
        }
        if overlap >= chunk_size {
            return Err(Error::Config(format!(
                "chunk overlap ({overlap}) must be smaller than chunk size ({chunk_size})"
            )));
        }
        Ok(Self {
            chunk_size,
            overlap,
        })
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            overlap: 200,
        }
    }
}

/// A window of text produced by [`split_text`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextSpan {
    /// Start offset in characters, inclusive
    pub start: usize,
    /// End offset in characters, exclusive
    pub end: usize,
    /// Trimmed window text
    pub text: String,
}

/// Split `text` into overlapping windows
///
/// Windows whose trimmed text is empty are skipped.
#[must_use]
pub fn split_text(text: &str, config: ChunkingConfig) -> Vec<TextSpan> {
    // Byte offset of every char boundary, plus the end of the string
    let boundaries: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();
    let len = boundaries.len() - 1;

    let mut spans = Vec::new();
    let mut start = 0;

    while start < len {
        let end = (start + config.chunk_size).min(len);
        let window = text[boundaries[start]..boundaries[end]].trim();

        if !window.is_empty() {
            spans.push(TextSpan {
                start,
                end,
                text: window.to_string(),
            });
        }

        if end == len {
            break;
        }

        let next = end.saturating_sub(config.overlap);
        start = if next <= start { end } else { next };
    }

    tracing::trace!(chars = len, spans = spans.len(), "text split");
    spans
}
