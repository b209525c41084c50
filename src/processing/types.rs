//! Core data types and error definitions for the ingestion pipeline.

use crate::{embedding::EmbeddingProviderError, extract::ExtractionError};
use thiserror::Error;

/// Errors produced while turning raw text into chunks.
#[derive(Debug, Error)]
pub enum ChunkingError {
    /// Ingestion configured an impossible chunk budget.
    #[error("chunk size must be greater than zero")]
    InvalidChunkSize,
}

/// Errors emitted by the Process action (extract, chunk, embed, index).
#[derive(Debug, Error)]
pub enum ProcessingError {
    /// The upload contained no documents.
    #[error("No documents were uploaded")]
    NoDocuments,
    /// A document could not be read.
    #[error(transparent)]
    Extraction(#[from] ExtractionError),
    /// Chunking step failed to segment the corpus.
    #[error("Failed to chunk documents: {0}")]
    Chunking(#[from] ChunkingError),
    /// Embedding provider failed to produce vectors for the chunks.
    #[error(transparent)]
    Embedding(#[from] EmbeddingProviderError),
}

/// Summary of a completed Process action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessingOutcome {
    /// Number of documents read.
    pub document_count: usize,
    /// Characters of extracted text.
    pub text_chars: usize,
    /// Number of chunks embedded into the new index.
    pub chunk_count: usize,
    /// Chunk size used during processing.
    pub chunk_size: usize,
}
