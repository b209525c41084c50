//! In-memory vector index over embedded chunks.
//!
//! The index is built once per processed document set and never mutated afterwards; lookups are
//! a brute-force cosine scan, which is plenty for a single session's corpus.

use crate::embedding::{EmbeddingClient, EmbeddingProviderError};
use serde::Serialize;
use std::cmp::Ordering;

/// A segment of extracted text, the unit of retrieval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chunk {
    /// Position of the chunk within the processed corpus.
    pub ordinal: usize,
    /// Chunk text.
    pub text: String,
}

/// A chunk returned by [`VectorIndex::search`] with its similarity score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    /// Matched chunk.
    pub chunk: Chunk,
    /// Cosine similarity between the query and the chunk embedding.
    pub score: f32,
}

struct Entry {
    embedding: Vec<f32>,
    chunk: Chunk,
}

/// Immutable collection of (embedding, chunk) pairs.
#[derive(Default)]
pub struct VectorIndex {
    entries: Vec<Entry>,
}

impl std::fmt::Debug for VectorIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorIndex")
            .field("len", &self.entries.len())
            .field("dimension", &self.dimension())
            .finish()
    }
}

impl VectorIndex {
    /// Embed every chunk and build the index.
    ///
    /// Either every chunk is embedded and indexed, or an error is returned and no index exists.
    /// An empty chunk list produces an empty index without contacting the provider.
    pub async fn build(
        chunks: Vec<String>,
        embedder: &dyn EmbeddingClient,
    ) -> Result<Self, EmbeddingProviderError> {
        if chunks.is_empty() {
            tracing::debug!("No chunks to index; building empty index");
            return Ok(Self::default());
        }

        let embeddings = embedder.generate_embeddings(chunks.clone()).await?;
        if embeddings.len() != chunks.len() {
            return Err(EmbeddingProviderError::InvalidResponse(format!(
                "expected {} vectors, got {}",
                chunks.len(),
                embeddings.len()
            )));
        }

        let entries = chunks
            .into_iter()
            .zip(embeddings)
            .enumerate()
            .map(|(ordinal, (text, embedding))| Entry {
                embedding,
                chunk: Chunk { ordinal, text },
            })
            .collect();

        Ok(Self { entries })
    }

    /// Number of indexed chunks.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the index holds no chunks.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Embedding dimension, if any chunk is indexed.
    pub fn dimension(&self) -> Option<usize> {
        self.entries.first().map(|entry| entry.embedding.len())
    }

    /// Iterate over indexed chunks in corpus order.
    pub fn chunks(&self) -> impl Iterator<Item = &Chunk> {
        self.entries.iter().map(|entry| &entry.chunk)
    }

    /// Return up to `k` chunks ordered by descending similarity to `query`.
    ///
    /// Equal scores keep corpus order. An empty index yields an empty result.
    pub fn search(&self, query: &[f32], k: usize) -> Vec<SearchHit> {
        let mut scored: Vec<(f32, &Entry)> = self
            .entries
            .iter()
            .map(|entry| (cosine_similarity(query, &entry.embedding), entry))
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));

        scored
            .into_iter()
            .take(k.min(self.entries.len()))
            .map(|(score, entry)| SearchHit {
                chunk: entry.chunk.clone(),
                score,
            })
            .collect()
    }
}

/// Cosine similarity; mismatched or zero-magnitude vectors score `0.0`.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if mag_a < f32::EPSILON || mag_b < f32::EPSILON {
        0.0
    } else {
        dot / (mag_a * mag_b)
    }
}
