#![deny(missing_docs)]

//! Core library for chatting with the contents of uploaded PDF documents.

/// HTTP routing and page handlers.
pub mod api;
/// Environment-driven configuration management.
pub mod config;
/// Question answering over an index with dialogue history.
pub mod conversation;
/// Embedding client abstraction and adapters.
pub mod embedding;
/// Document text extraction.
pub mod extract;
/// Chat completion client abstraction and adapters.
pub mod generation;
/// In-memory similarity index.
pub mod index;
/// Structured logging and tracing setup.
pub mod logging;
/// Pipeline metrics helpers.
pub mod metrics;
/// Document processing pipeline utilities.
pub mod processing;
/// HTML page rendering.
pub mod render;
/// Per-session state.
pub mod session;
