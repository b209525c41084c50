//! Per-session state: the uploaded documents and the conversation engine built from them.
//!
//! A session starts empty. Each Process action swaps documents, index, engine and history in
//! one step, and only after the replacement engine was fully built; a failed action leaves the
//! previous state as it was. Reprocessing starts the dialogue afresh.

use crate::{
    conversation::{ConversationEngine, ConversationError, Exchange, History},
    extract::Document,
    index::VectorIndex,
    processing::{ProcessingError, ProcessingOutcome, ProcessingService},
};
use std::sync::Arc;
use thiserror::Error;

static EMPTY_HISTORY: History = History::new();

/// Errors surfaced to the user by a session action.
#[derive(Debug, Error)]
pub enum SessionError {
    /// A question was asked before any documents were processed.
    #[error("Upload your PDFs and click 'Process' before asking questions")]
    NotProcessed,
    /// The Process action failed.
    #[error(transparent)]
    Processing(#[from] ProcessingError),
    /// Answering the question failed.
    #[error(transparent)]
    Conversation(#[from] ConversationError),
}

/// State owned by one interactive session.
pub struct Session {
    service: Arc<ProcessingService>,
    documents: Vec<Document>,
    engine: Option<ConversationEngine>,
}

impl Session {
    /// Create an empty session backed by `service`.
    pub fn new(service: Arc<ProcessingService>) -> Self {
        Self {
            service,
            documents: Vec::new(),
            engine: None,
        }
    }

    /// Build a new index and engine from `documents`, replacing the current ones on success.
    pub async fn process(
        &mut self,
        documents: Vec<Document>,
    ) -> Result<ProcessingOutcome, SessionError> {
        let (engine, outcome) = self.service.process(documents.clone()).await?;
        if let Some(previous) = &self.engine {
            tracing::debug!(
                previous_chunks = previous.index().len(),
                discarded_turns = previous.history().len(),
                "Replacing conversation engine"
            );
        }
        self.documents = documents;
        self.engine = Some(engine);
        Ok(outcome)
    }

    /// Answer `question`. Blank input is ignored and yields `Ok(None)`.
    pub async fn ask(&mut self, question: &str) -> Result<Option<Exchange>, SessionError> {
        let question = question.trim();
        if question.is_empty() {
            return Ok(None);
        }
        let engine = self.engine.as_mut().ok_or(SessionError::NotProcessed)?;

        tracing::info!(history_turns = engine.history().len(), "Answering question");
        let exchange = engine.ask_detailed(question).await?;
        self.service
            .metrics()
            .record_answer(exchange.prompt_tokens as u64);
        Ok(Some(exchange))
    }

    /// Whether a processed document set is ready for questions.
    pub fn is_ready(&self) -> bool {
        self.engine.is_some()
    }

    /// Documents of the most recent successful Process action.
    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    /// Current index, if documents have been processed.
    pub fn index(&self) -> Option<&VectorIndex> {
        self.engine.as_ref().map(ConversationEngine::index)
    }

    /// Dialogue of the current engine; empty before the first Process action.
    pub fn history(&self) -> &History {
        self.engine
            .as_ref()
            .map(ConversationEngine::history)
            .unwrap_or(&EMPTY_HISTORY)
    }
}
