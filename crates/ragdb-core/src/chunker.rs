//! Boundary-aware text chunking.
//!
//! Windows are measured in characters. Each window is cut at the last
//! paragraph break, else the last sentence boundary, else the last
//! whitespace, else at the character limit. Only cuts that leave at least
//! `min_chunk_size` characters qualify; the final chunk of a source is exempt.

use unicode_segmentation::UnicodeSegmentation;

use crate::config::ChunkingConfig;
use crate::error::Result;
use crate::types::{chunk_id, Chunk, Meta, SourceDocument};

#[derive(Debug, Clone)]
pub struct Chunker {
    config: ChunkingConfig,
}

impl Chunker {
    pub fn new(config: ChunkingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ChunkingConfig {
        &self.config
    }

    pub fn chunk<'a>(&self, doc: &'a SourceDocument) -> Chunks<'a> {
        Chunks::new(&doc.text, &doc.id, &doc.metadata, self.config)
    }
}

/// Chunk `text` without a prepared [`Chunker`].
///
/// The minimum chunk size is a fifth of `chunk_size`.
pub fn chunk(text: &str, source_id: &str, metadata: &Meta, chunk_size: usize, overlap: usize) -> Result<Vec<Chunk>> {
    let config = ChunkingConfig { chunk_size, overlap, min_chunk_size: chunk_size / 5 };
    config.validate()?;
    Ok(Chunks::new(text, source_id, metadata, config).collect())
}

/// Lazy iterator over the chunks of one source, in source order.
///
/// Finite and deterministic: calling [`Chunker::chunk`] again restarts the
/// sequence and yields the same chunks.
#[derive(Debug, Clone)]
pub struct Chunks<'a> {
    text: &'a str,
    source_id: &'a str,
    metadata: &'a Meta,
    config: ChunkingConfig,
    pos: usize,
    index: usize,
    done: bool,
}

impl<'a> Chunks<'a> {
    fn new(text: &'a str, source_id: &'a str, metadata: &'a Meta, config: ChunkingConfig) -> Self {
        Self { text, source_id, metadata, config, pos: 0, index: 0, done: false }
    }

    /// Byte offset where the chunk starting at `start` ends (exclusive).
    fn cut(&self, start: usize, limit: usize) -> usize {
        let text = self.text;
        let window = &text[start..limit];
        let min = self.config.min_chunk_size;
        let qualifies = |cut: usize| cut > start && char_len(text[start..cut].trim_end()) >= min;

        if let Some(p) = window.rfind("\n\n") {
            if qualifies(start + p) {
                return start + p;
            }
        }
        if let Some((p, _)) = window.split_sentence_bound_indices().filter(|(p, _)| *p > 0).last() {
            if qualifies(start + p) {
                return start + p;
            }
        }
        let ws = if text[limit..].starts_with(char::is_whitespace) {
            Some(limit)
        } else {
            window.rfind(char::is_whitespace).map(|p| start + p)
        };
        if let Some(cut) = ws {
            if qualifies(cut) {
                return cut;
            }
        }
        limit
    }

    fn next_start(&self, start: usize, end: usize) -> usize {
        let text = self.text;
        let back = retreat_chars(text, end, self.config.overlap);
        let snapped = snap_to_word_start(text, back, end);
        if snapped <= start {
            end
        } else {
            snapped
        }
    }
}

impl Iterator for Chunks<'_> {
    type Item = Chunk;

    fn next(&mut self) -> Option<Chunk> {
        if self.done {
            return None;
        }
        let text = self.text;
        let rest = &text[self.pos..];
        let start = self.pos + (rest.len() - rest.trim_start().len());
        if start >= text.len() {
            self.done = true;
            return None;
        }

        let limit = advance_chars(text, start, self.config.chunk_size);
        let last = limit == text.len();
        let cut = if last { limit } else { self.cut(start, limit) };
        let trimmed = start + text[start..cut].trim_end().len();
        // A hard cut keeps trailing whitespace rather than dropping under the minimum.
        let end = if last || char_len(&text[start..trimmed]) >= self.config.min_chunk_size {
            trimmed
        } else {
            cut
        };

        let chunk = Chunk {
            id: chunk_id(self.source_id, self.index),
            source_id: self.source_id.to_string(),
            index: self.index,
            start,
            text: text[start..end].to_string(),
            metadata: self.metadata.clone(),
        };
        self.index += 1;
        // Nothing but whitespace left after this chunk.
        if last || text[end..].trim().is_empty() {
            self.done = true;
        } else {
            self.pos = self.next_start(start, end);
        }
        Some(chunk)
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Byte offset `n` characters after `from`, clamped to the end of `text`.
fn advance_chars(text: &str, from: usize, n: usize) -> usize {
    text[from..].char_indices().nth(n).map_or(text.len(), |(i, _)| from + i)
}

/// Byte offset `n` characters before `from`, clamped to zero.
fn retreat_chars(text: &str, from: usize, n: usize) -> usize {
    text[..from].char_indices().rev().take(n).last().map_or(from, |(i, _)| i)
}

/// Move `pos` forward to the start of the next word if it sits inside one.
/// Never moves past `bound`; if no word starts before it, `pos` is kept.
fn snap_to_word_start(text: &str, pos: usize, bound: usize) -> usize {
    let inside_word = text[..pos].chars().next_back().is_some_and(|c| !c.is_whitespace())
        && text[pos..].chars().next().is_some_and(|c| !c.is_whitespace());
    if !inside_word {
        return pos;
    }
    let span = &text[pos..bound];
    match span.find(char::is_whitespace) {
        Some(ws) => {
            let after = &span[ws..];
            let word = pos + ws + (after.len() - after.trim_start().len());
            if word < bound {
                word
            } else {
                pos
            }
        }
        None => pos,
    }
}
