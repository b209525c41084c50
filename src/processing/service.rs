//! Processing service coordinating extraction, chunking, embedding and engine construction.

use crate::{
    conversation::{ContextWindowBuilder, ConversationEngine, ConversationSettings, FullHistory},
    embedding::EmbeddingClient,
    extract::{Document, PdfTextExtractor, TextExtractor, extract_blocking},
    generation::ChatClient,
    index::VectorIndex,
    metrics::SessionMetrics,
    processing::{
        chunking::ChunkingOptions,
        types::{ProcessingError, ProcessingOutcome},
    },
};
use std::sync::Arc;

/// Settings shared by every Process action.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineSettings {
    /// Chunker parameters.
    pub chunking: ChunkingOptions,
    /// Conversation engine parameters.
    pub conversation: ConversationSettings,
}

impl PipelineSettings {
    /// Derive pipeline settings from the loaded configuration.
    pub fn from_config(config: &crate::config::Config) -> Self {
        Self {
            chunking: ChunkingOptions {
                chunk_size: config.text_splitter_chunk_size,
                overlap: config.text_splitter_chunk_overlap,
                separator: config.text_splitter_separator.clone(),
            },
            conversation: ConversationSettings {
                top_k: config.retrieval_top_k,
                condense_question: config.condense_question,
            },
        }
    }
}

/// Runs the ingestion pipeline and hands out freshly bound conversation engines.
///
/// The service owns long-lived handles to the embedding and chat providers plus the metrics
/// registry. Construct it once near process start and share it through an `Arc`.
pub struct ProcessingService {
    extractor: Arc<dyn TextExtractor>,
    embedder: Arc<dyn EmbeddingClient>,
    chat: Arc<dyn ChatClient>,
    context: Arc<dyn ContextWindowBuilder>,
    settings: PipelineSettings,
    metrics: Arc<SessionMetrics>,
}

impl ProcessingService {
    /// Build a service around the given providers.
    ///
    /// Defaults to PDF extraction and a context window that resubmits the full history.
    pub fn new(
        embedder: Arc<dyn EmbeddingClient>,
        chat: Arc<dyn ChatClient>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            extractor: Arc::new(PdfTextExtractor),
            embedder,
            chat,
            context: Arc::new(FullHistory),
            settings,
            metrics: Arc::new(SessionMetrics::new()),
        }
    }

    /// Replace the document text extractor.
    pub fn with_extractor(mut self, extractor: Arc<dyn TextExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    /// Replace the context window strategy.
    pub fn with_context_builder(mut self, context: Arc<dyn ContextWindowBuilder>) -> Self {
        self.context = context;
        self
    }

    /// Shared metrics registry.
    pub fn metrics(&self) -> Arc<SessionMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Extract, chunk and embed `documents`, returning a new engine with an empty history.
    ///
    /// Nothing is returned unless every step succeeded.
    pub async fn process(
        &self,
        documents: Vec<Document>,
    ) -> Result<(ConversationEngine, ProcessingOutcome), ProcessingError> {
        if documents.is_empty() {
            return Err(ProcessingError::NoDocuments);
        }
        let document_count = documents.len();
        tracing::info!(documents = document_count, "Processing documents");

        let text = extract_blocking(Arc::clone(&self.extractor), documents).await?;
        let text_chars = text.chars().count();

        let chunking = &self.settings.chunking;
        let chunks = chunking.chunk(&text)?;
        let chunk_count = chunks.len();
        tracing::debug!(
            text_chars,
            chunks = chunk_count,
            chunk_size = chunking.chunk_size,
            overlap = chunking.overlap,
            "Chunked extracted text"
        );

        let index = VectorIndex::build(chunks, self.embedder.as_ref()).await?;
        let engine = ConversationEngine::new(
            Arc::new(index),
            Arc::clone(&self.embedder),
            Arc::clone(&self.chat),
            Arc::clone(&self.context),
            self.settings.conversation,
        );

        self.metrics
            .record_processing(document_count as u64, chunk_count as u64);
        tracing::info!(
            documents = document_count,
            text_chars,
            chunks = chunk_count,
            "Documents indexed"
        );

        Ok((
            engine,
            ProcessingOutcome {
                document_count,
                text_chars,
                chunk_count,
                chunk_size: chunking.chunk_size,
            },
        ))
    }
}
