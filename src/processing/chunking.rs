//! Character-budget chunking with separator-aware cuts and a fixed sliding overlap.
//!
//! Highlights:
//!
//! - Budget: every chunk holds at most `chunk_size` characters (Unicode scalar values).
//! - Boundaries: a chunk ends right after the last separator occurrence that fits the budget;
//!   when none fits, the chunk is cut hard at the budget.
//! - Overlap: each chunk after the first starts exactly `overlap` characters before the end of
//!   its predecessor, so text around a cut stays visible to retrieval. Overlaps at or above the
//!   chunk size are clamped to `chunk_size - 1`.

use super::types::ChunkingError;

const DEFAULT_CHUNK_SIZE: usize = 1000;
const DEFAULT_CHUNK_OVERLAP: usize = 200;
const DEFAULT_SEPARATOR: &str = "\n";

/// Chunker parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkingOptions {
    /// Maximum characters per chunk.
    pub chunk_size: usize,
    /// Characters shared between neighbouring chunks.
    pub overlap: usize,
    /// Preferred split boundary.
    pub separator: String,
}

impl Default for ChunkingOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_CHUNK_OVERLAP,
            separator: DEFAULT_SEPARATOR.to_string(),
        }
    }
}

impl ChunkingOptions {
    /// Chunk `text` with these options.
    pub fn chunk(&self, text: &str) -> Result<Vec<String>, ChunkingError> {
        chunk_text(text, self.chunk_size, self.overlap, &self.separator)
    }
}

/// Split `text` into overlapping chunks of at most `chunk_size` characters.
///
/// Returns an empty vector when the input is empty or all whitespace.
pub fn chunk_text(
    text: &str,
    chunk_size: usize,
    overlap: usize,
    separator: &str,
) -> Result<Vec<String>, ChunkingError> {
    if chunk_size == 0 {
        return Err(ChunkingError::InvalidChunkSize);
    }
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }

    // Byte offset of every char boundary, including the end of the text.
    let offsets: Vec<usize> = text
        .char_indices()
        .map(|(offset, _)| offset)
        .chain(std::iter::once(text.len()))
        .collect();
    let char_count = offsets.len() - 1;
    let separator_ends = separator_ends(text, separator, &offsets);
    let overlap = overlap.min(chunk_size - 1);

    let mut chunks = Vec::new();
    let mut start = 0;
    loop {
        let limit = start + chunk_size;
        if limit >= char_count {
            chunks.push(text[offsets[start]..].to_string());
            break;
        }

        let end = preferred_cut(&separator_ends, start + overlap, limit).unwrap_or(limit);
        chunks.push(text[offsets[start]..offsets[end]].to_string());
        start = end - overlap;
    }

    Ok(chunks)
}

/// Char index just past each separator occurrence, ascending.
fn separator_ends(text: &str, separator: &str, offsets: &[usize]) -> Vec<usize> {
    if separator.is_empty() {
        return Vec::new();
    }
    text.match_indices(separator)
        .filter_map(|(byte_start, matched)| offsets.binary_search(&(byte_start + matched.len())).ok())
        .collect()
}

/// Last separator end in `(floor, limit]`; anything at or below `floor` would stall progress.
fn preferred_cut(separator_ends: &[usize], floor: usize, limit: usize) -> Option<usize> {
    let idx = separator_ends.partition_point(|&end| end <= limit);
    let candidate = *separator_ends.get(idx.checked_sub(1)?)?;
    (candidate > floor).then_some(candidate)
}
