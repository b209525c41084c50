//! Retrieval-augmented conversation: dialogue history, prompt assembly and the engine.

mod context;
mod engine;
mod history;

pub use context::{ContextWindowBuilder, FullHistory, estimate_tokens};
pub use engine::{ConversationEngine, ConversationError, ConversationSettings, Exchange};
pub use history::{DialogueTurn, History, Speaker};
