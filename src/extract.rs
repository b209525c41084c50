//! Document text extraction.
//!
//! Pages are read in page order and concatenated without a separator, first across the pages
//! of one document and then across documents, so the corpus reads as one continuous text.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use thiserror::Error;

/// Errors raised while turning uploaded documents into text.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// The byte-stream is not a readable PDF (or one of its pages could not be decoded).
    #[error("Failed to extract text from '{filename}': {reason}")]
    Unreadable {
        /// Upload name of the offending document.
        filename: String,
        /// Parser diagnostic.
        reason: String,
    },
    /// The blocking extraction task did not complete.
    #[error("Extraction task failed: {0}")]
    Task(String),
}

/// An uploaded document: original filename plus raw bytes.
///
/// The bytes are kept after extraction so the page can display the PDF again.
#[derive(Debug, Clone)]
pub struct Document {
    /// Name supplied by the browser upload.
    pub filename: String,
    /// Raw document bytes.
    pub bytes: Arc<[u8]>,
}

impl Document {
    /// Wrap raw upload bytes.
    pub fn new(filename: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            filename: filename.into(),
            bytes: bytes.into(),
        }
    }
}

/// Reads the text of a single document, one string per page.
pub trait TextExtractor: Send + Sync {
    /// Page texts in page order.
    fn extract_pages(&self, document: &Document) -> Result<Vec<String>, ExtractionError>;
}

/// PDF extraction backed by `pdf-extract`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfTextExtractor;

impl TextExtractor for PdfTextExtractor {
    fn extract_pages(&self, document: &Document) -> Result<Vec<String>, ExtractionError> {
        let unreadable = |reason: String| ExtractionError::Unreadable {
            filename: document.filename.clone(),
            reason,
        };

        // The parser panics on some malformed inputs; treat that like any other parse failure.
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            pdf_extract::extract_text_from_mem_by_pages(&document.bytes)
        }))
        .map_err(|_| unreadable("PDF parser aborted on malformed input".to_string()))?;

        outcome.map_err(|error| unreadable(error.to_string()))
    }
}

/// Extract the text of every page of every document, in order, with no separator.
///
/// Any unreadable document aborts the whole extraction.
pub fn extract(
    extractor: &dyn TextExtractor,
    documents: &[Document],
) -> Result<String, ExtractionError> {
    let mut text = String::new();
    for document in documents {
        let pages = extractor.extract_pages(document)?;
        tracing::debug!(
            filename = %document.filename,
            pages = pages.len(),
            bytes = document.bytes.len(),
            "Extracted document text"
        );
        for page in pages {
            text.push_str(&page);
        }
    }
    Ok(text)
}

/// Run [`extract`] on the blocking thread pool.
pub async fn extract_blocking(
    extractor: Arc<dyn TextExtractor>,
    documents: Vec<Document>,
) -> Result<String, ExtractionError> {
    tokio::task::spawn_blocking(move || extract(extractor.as_ref(), &documents))
        .await
        .map_err(|error| ExtractionError::Task(error.to_string()))?
}
