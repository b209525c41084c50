//! Document processing pipeline: extraction, chunking, embedding and engine construction.

pub mod chunking;
mod service;
pub mod types;

pub use chunking::{ChunkingOptions, chunk_text};
pub use service::{PipelineSettings, ProcessingService};
pub use types::{ChunkingError, ProcessingError, ProcessingOutcome};
