use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters describing pipeline activity.
#[derive(Default)]
pub struct SessionMetrics {
    documents_processed: AtomicU64,
    chunks_indexed: AtomicU64,
    questions_answered: AtomicU64,
    last_prompt_tokens: AtomicU64,
}

impl SessionMetrics {
    /// Create an empty metrics accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a completed Process action.
    pub fn record_processing(&self, document_count: u64, chunk_count: u64) {
        self.documents_processed
            .fetch_add(document_count, Ordering::Relaxed);
        self.chunks_indexed.fetch_add(chunk_count, Ordering::Relaxed);
    }

    /// Record an answered question and the size of the prompt that produced it.
    pub fn record_answer(&self, prompt_tokens: u64) {
        self.questions_answered.fetch_add(1, Ordering::Relaxed);
        self.last_prompt_tokens
            .store(prompt_tokens, Ordering::Relaxed);
    }

    /// Return a snapshot of the current counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let last_prompt_tokens = self.last_prompt_tokens.load(Ordering::Relaxed);
        MetricsSnapshot {
            documents_processed: self.documents_processed.load(Ordering::Relaxed),
            chunks_indexed: self.chunks_indexed.load(Ordering::Relaxed),
            questions_answered: self.questions_answered.load(Ordering::Relaxed),
            last_prompt_tokens: (last_prompt_tokens > 0).then_some(last_prompt_tokens),
        }
    }
}

/// Immutable view of the counters used for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct MetricsSnapshot {
    /// Documents read across all Process actions since startup.
    pub documents_processed: u64,
    /// Chunks embedded across all Process actions since startup.
    pub chunks_indexed: u64,
    /// Questions answered since startup.
    pub questions_answered: u64,
    /// Estimated token count of the most recent answer prompt.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_prompt_tokens: Option<u64>,
}
