//! Retrieval-augmented question answering bound to one index and one history.

use super::context::{ContextWindowBuilder, estimate_tokens};
use super::history::History;
use crate::embedding::{EmbeddingClient, EmbeddingProviderError};
use crate::generation::{ChatClient, GenerationError};
use crate::index::{SearchHit, VectorIndex};
use std::sync::Arc;
use thiserror::Error;

const DEFAULT_TOP_K: usize = 4;

/// Errors raised while answering a question. History is never modified when one is returned.
#[derive(Debug, Error)]
pub enum ConversationError {
    /// Embedding the question (and therefore searching the index) failed.
    #[error("Failed to retrieve context: {0}")]
    Retrieval(#[source] EmbeddingProviderError),
    /// The generative model failed to condense the question or produce an answer.
    #[error("Failed to generate answer: {0}")]
    Generation(#[source] GenerationError),
}

/// Tunables for [`ConversationEngine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConversationSettings {
    /// Chunks retrieved per question.
    pub top_k: usize,
    /// Rephrase follow-ups into standalone questions before retrieval.
    pub condense_question: bool,
}

impl Default for ConversationSettings {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            condense_question: true,
        }
    }
}

/// Details of one completed question.
#[derive(Debug, Clone, PartialEq)]
pub struct Exchange {
    /// Question as asked.
    pub question: String,
    /// Question used for retrieval (differs from `question` only when condensed).
    pub standalone_question: String,
    /// Generated answer.
    pub answer: String,
    /// Chunks the answer was conditioned on.
    pub sources: Vec<SearchHit>,
    /// Estimated size of the answer prompt.
    pub prompt_tokens: usize,
}

/// Binds an index, a dialogue history and the model providers.
pub struct ConversationEngine {
    index: Arc<VectorIndex>,
    history: History,
    embedder: Arc<dyn EmbeddingClient>,
    chat: Arc<dyn ChatClient>,
    context: Arc<dyn ContextWindowBuilder>,
    settings: ConversationSettings,
}

impl ConversationEngine {
    /// Create an engine with an empty history.
    pub fn new(
        index: Arc<VectorIndex>,
        embedder: Arc<dyn EmbeddingClient>,
        chat: Arc<dyn ChatClient>,
        context: Arc<dyn ContextWindowBuilder>,
        settings: ConversationSettings,
    ) -> Self {
        Self {
            index,
            history: History::new(),
            embedder,
            chat,
            context,
            settings,
        }
    }

    /// Index the engine retrieves from.
    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    /// Dialogue so far.
    pub fn history(&self) -> &History {
        &self.history
    }

    /// Answer `question`, recording the exchange in the history on success.
    pub async fn ask(&mut self, question: &str) -> Result<String, ConversationError> {
        self.ask_detailed(question).await.map(|exchange| exchange.answer)
    }

    /// Like [`ConversationEngine::ask`], also returning the retrieved sources and prompt size.
    pub async fn ask_detailed(&mut self, question: &str) -> Result<Exchange, ConversationError> {
        let standalone_question = self.standalone_question(question).await?;

        let query = self
            .embedder
            .embed(&standalone_question)
            .await
            .map_err(ConversationError::Retrieval)?;
        let sources = self.index.search(&query, self.settings.top_k);
        tracing::debug!(
            retrieved = sources.len(),
            top_score = ?sources.first().map(|hit| hit.score),
            "Retrieved context"
        );

        let messages = self
            .context
            .answer_messages(&self.history, &sources, question);
        let prompt_tokens = estimate_tokens(&messages);
        tracing::debug!(
            messages = messages.len(),
            prompt_tokens,
            history_turns = self.history.len(),
            "Generating answer"
        );

        let answer = self
            .chat
            .complete(messages)
            .await
            .map_err(ConversationError::Generation)?;

        self.history
            .record_exchange(question.to_string(), answer.clone());

        Ok(Exchange {
            question: question.to_string(),
            standalone_question,
            answer,
            sources,
            prompt_tokens,
        })
    }

    async fn standalone_question(&self, question: &str) -> Result<String, ConversationError> {
        if !self.settings.condense_question || self.history.is_empty() {
            return Ok(question.to_string());
        }

        let messages = self.context.condense_messages(&self.history, question);
        let condensed = self
            .chat
            .complete(messages)
            .await
            .map_err(ConversationError::Generation)?;
        if condensed.trim().is_empty() {
            return Ok(question.to_string());
        }
        tracing::debug!(condensed = %condensed, "Condensed follow-up question");
        Ok(condensed)
    }
}

impl std::fmt::Debug for ConversationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationEngine")
            .field("index", &self.index)
            .field("history_turns", &self.history.len())
            .field("settings", &self.settings)
            .finish()
    }
}
