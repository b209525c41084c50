#![allow(dead_code)]

use async_trait::async_trait;
use pdfchat::{
    conversation::ConversationSettings,
    embedding::{EmbeddingClient, EmbeddingProviderError},
    extract::{Document, ExtractionError, TextExtractor},
    generation::{ChatClient, ChatMessage, ChatRole, GenerationError},
    processing::{ChunkingOptions, PipelineSettings, ProcessingService},
};
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, Ordering},
};

pub const DIMENSION: usize = 64;
pub const CRUMBVILLE_FACT: &str = "Crumbville was founded in 1850 by a guild of bakers.";
pub const CONDENSED_FOLLOW_UP: &str = "What year was Crumbville founded?";

/// Treats the upload bytes as one page of UTF-8 text.
pub struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    fn extract_pages(&self, document: &Document) -> Result<Vec<String>, ExtractionError> {
        std::str::from_utf8(&document.bytes)
            .map(|text| vec![text.to_string()])
            .map_err(|error| ExtractionError::Unreadable {
                filename: document.filename.clone(),
                reason: error.to_string(),
            })
    }
}

/// Bag-of-words embedding: each lowercase word is hashed (FNV-1a) into one of `DIMENSION` buckets.
#[derive(Default)]
pub struct WordHashEmbedder {
    failing: AtomicBool,
}

impl WordHashEmbedder {
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

pub fn word_hash_embedding(text: &str) -> Vec<f32> {
    let mut vector = vec![0.0; DIMENSION];
    for word in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
    {
        let mut hash: u32 = 0x811c_9dc5;
        for byte in word.to_lowercase().bytes() {
            hash ^= u32::from(byte);
            hash = hash.wrapping_mul(0x0100_0193);
        }
        vector[hash as usize % DIMENSION] += 1.0;
    }
    vector
}

#[async_trait]
impl EmbeddingClient for WordHashEmbedder {
    async fn generate_embeddings(
        &self,
        texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingProviderError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(EmbeddingProviderError::Rejected {
                status: 503,
                message: "embedding service unavailable".into(),
            });
        }
        Ok(texts.iter().map(|text| word_hash_embedding(text)).collect())
    }
}

/// Answers from the retrieved context only and records every request.
#[derive(Default)]
pub struct ContextEchoChat {
    requests: Mutex<Vec<Vec<ChatMessage>>>,
    failing: AtomicBool,
}

impl ContextEchoChat {
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn requests(&self) -> Vec<Vec<ChatMessage>> {
        self.requests.lock().expect("requests lock").clone()
    }
}

#[async_trait]
impl ChatClient for ContextEchoChat {
    async fn complete(&self, messages: Vec<ChatMessage>) -> Result<String, GenerationError> {
        self.requests
            .lock()
            .expect("requests lock")
            .push(messages.clone());
        if self.failing.load(Ordering::SeqCst) {
            return Err(GenerationError::ProviderUnavailable(
                "chat service unavailable".into(),
            ));
        }

        let first = messages.first().map(|m| m.content.as_str()).unwrap_or("");
        if first.contains("Standalone question:") {
            return Ok(CONDENSED_FOLLOW_UP.to_string());
        }
        let system = messages
            .iter()
            .find(|m| m.role == ChatRole::System)
            .map(|m| m.content.as_str())
            .unwrap_or("");
        if system.contains(CRUMBVILLE_FACT) {
            Ok("Crumbville was founded in 1850.".to_string())
        } else {
            Ok("I don't know.".to_string())
        }
    }
}

pub fn small_settings() -> PipelineSettings {
    PipelineSettings {
        chunking: ChunkingOptions {
            chunk_size: 80,
            overlap: 10,
            separator: "\n".into(),
        },
        conversation: ConversationSettings {
            top_k: 1,
            condense_question: true,
        },
    }
}

pub struct Harness {
    pub service: Arc<ProcessingService>,
    pub embedder: Arc<WordHashEmbedder>,
    pub chat: Arc<ContextEchoChat>,
}

pub fn harness() -> Harness {
    let embedder = Arc::new(WordHashEmbedder::default());
    let chat = Arc::new(ContextEchoChat::default());
    let service = ProcessingService::new(embedder.clone(), chat.clone(), small_settings())
        .with_extractor(Arc::new(PlainTextExtractor));
    Harness {
        service: Arc::new(service),
        embedder,
        chat,
    }
}

pub fn text_document(filename: &str, text: &str) -> Document {
    Document::new(filename, text.as_bytes().to_vec())
}

pub fn town_documents() -> Vec<Document> {
    vec![
        text_document(
            "history.pdf",
            &format!("{CRUMBVILLE_FACT}\nThe bakers built ovens near the square.\n"),
        ),
        text_document(
            "geography.pdf",
            "The river Lune flows north through the valley.\nMountains surround the eastern farms.\n",
        ),
    ]
}
