//! HTTP surface for the PDF chat.
//!
//! The router serves one interactive session:
//!
//! - `GET /` – The page: upload form, PDF viewer and chat history.
//! - `POST /process` – Multipart upload (`documents` fields) that replaces the session's documents.
//! - `POST /ask` – Form submission of a `question`; renders the page with the updated history.
//! - `GET /documents/:index` – Raw bytes of an uploaded PDF for the embedded viewer.
//! - `POST /api/ask` – JSON variant of `/ask`.
//! - `GET /api/history` – Current dialogue as JSON.
//! - `GET /metrics` – Pipeline counters.
//!
//! Every route locks the session for the whole action, so actions never interleave.

use crate::{
    conversation::{DialogueTurn, History, Speaker},
    extract::Document,
    index::SearchHit,
    metrics::{MetricsSnapshot, SessionMetrics},
    processing::{ProcessingError, ProcessingService},
    render::{Notice, PageView, render_page},
    session::{Session, SessionError},
};
use axum::{
    Form, Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path, State, multipart::MultipartError},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Multipart field carrying the uploaded PDFs.
pub const DOCUMENTS_FIELD: &str = "documents";

const PROCESSED_NOTICE: &str = "Processing completed! You can now chat with PDF.";

/// Shared router state: the session and the metrics registry.
#[derive(Clone)]
pub struct AppState {
    session: Arc<Mutex<Session>>,
    metrics: Arc<SessionMetrics>,
}

impl AppState {
    /// Start an empty session backed by `service`.
    pub fn new(service: Arc<ProcessingService>) -> Self {
        let metrics = service.metrics();
        Self {
            session: Arc::new(Mutex::new(Session::new(service))),
            metrics,
        }
    }
}

/// Build the HTTP router. Request bodies above `max_upload_bytes` are rejected.
pub fn create_router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/", get(show_page))
        .route("/process", post(process_documents))
        .route("/ask", post(ask_form))
        .route("/documents/:index", get(get_document))
        .route("/api/ask", post(ask_json))
        .route("/api/history", get(get_history))
        .route("/metrics", get(get_metrics))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .with_state(state)
}

async fn show_page(State(state): State<AppState>) -> Html<String> {
    let session = state.session.lock().await;
    Html(page(&session, None))
}

async fn process_documents(State(state): State<AppState>, multipart: Multipart) -> Response {
    let documents = match read_documents(multipart).await {
        Ok(documents) => documents,
        Err(error) => {
            tracing::warn!(error = %error, "Rejected upload");
            let session = state.session.lock().await;
            return page_response(&session, Err(error));
        }
    };

    let mut session = state.session.lock().await;
    let result = session.process(documents).await;
    match &result {
        Ok(outcome) => tracing::info!(
            documents = outcome.document_count,
            chunks = outcome.chunk_count,
            "Process request completed"
        ),
        Err(error) => tracing::warn!(error = %error, "Process request failed"),
    }
    let notice = result
        .map(|_| Some(Notice::success(PROCESSED_NOTICE)))
        .map_err(AppError::from);
    page_response(&session, notice)
}

/// Form body for `POST /ask` and JSON body for `POST /api/ask`.
#[derive(Deserialize)]
struct AskRequest {
    #[serde(default)]
    question: String,
}

async fn ask_form(State(state): State<AppState>, Form(request): Form<AskRequest>) -> Response {
    let mut session = state.session.lock().await;
    let result = session.ask(&request.question).await;
    if let Err(error) = &result {
        tracing::warn!(error = %error, "Question failed");
    }
    page_response(&session, result.map(|_| None).map_err(AppError::from))
}

async fn get_document(State(state): State<AppState>, Path(index): Path<usize>) -> Response {
    let session = state.session.lock().await;
    let Some(document) = session.documents().get(index) else {
        return AppError::DocumentNotFound(index).into_response();
    };
    let disposition = format!(
        "inline; filename=\"{}\"",
        document.filename.replace(['"', '\\', '\r', '\n'], "_")
    );
    (
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        document.bytes.to_vec(),
    )
        .into_response()
}

/// One dialogue turn as exposed over JSON.
#[derive(Serialize)]
struct TurnView {
    role: Speaker,
    content: String,
    timestamp: String,
}

impl From<&DialogueTurn> for TurnView {
    fn from(turn: &DialogueTurn) -> Self {
        Self {
            role: turn.role,
            content: turn.content.clone(),
            timestamp: turn.timestamp(),
        }
    }
}

fn history_view(history: &History) -> Vec<TurnView> {
    history.turns().iter().map(TurnView::from).collect()
}

/// Response body for `POST /api/ask`.
#[derive(Serialize)]
struct AskResponse {
    answer: String,
    standalone_question: String,
    sources: Vec<SearchHit>,
    history: Vec<TurnView>,
}

async fn ask_json(
    State(state): State<AppState>,
    Json(request): Json<AskRequest>,
) -> Result<Json<AskResponse>, AppError> {
    let mut session = state.session.lock().await;
    let exchange = session
        .ask(&request.question)
        .await?
        .ok_or(AppError::EmptyQuestion)?;
    tracing::info!(
        sources = exchange.sources.len(),
        prompt_tokens = exchange.prompt_tokens,
        "Ask request completed"
    );
    Ok(Json(AskResponse {
        answer: exchange.answer,
        standalone_question: exchange.standalone_question,
        sources: exchange.sources,
        history: history_view(session.history()),
    }))
}

/// Response body for `GET /api/history`.
#[derive(Serialize)]
struct HistoryResponse {
    ready: bool,
    documents: Vec<String>,
    history: Vec<TurnView>,
}

async fn get_history(State(state): State<AppState>) -> Json<HistoryResponse> {
    let session = state.session.lock().await;
    Json(HistoryResponse {
        ready: session.is_ready(),
        documents: session
            .documents()
            .iter()
            .map(|document| document.filename.clone())
            .collect(),
        history: history_view(session.history()),
    })
}

async fn get_metrics(State(state): State<AppState>) -> Json<MetricsSnapshot> {
    Json(state.metrics.snapshot())
}

/// Collect the uploaded PDFs in submission order.
///
/// Empty file inputs are skipped; anything that is not named `*.pdf` is rejected.
async fn read_documents(mut multipart: Multipart) -> Result<Vec<Document>, AppError> {
    let mut documents = Vec::new();
    while let Some(field) = multipart.next_field().await.map_err(AppError::Upload)? {
        if field.name() != Some(DOCUMENTS_FIELD) {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let bytes = field.bytes().await.map_err(AppError::Upload)?;
        if filename.is_empty() && bytes.is_empty() {
            continue;
        }
        if !filename.to_ascii_lowercase().ends_with(".pdf") {
            return Err(AppError::NotPdf(filename));
        }
        tracing::debug!(filename = %filename, bytes = bytes.len(), "Received upload");
        documents.push(Document::new(filename, bytes.to_vec()));
    }
    Ok(documents)
}

fn page(session: &Session, notice: Option<Notice>) -> String {
    render_page(&PageView {
        documents: session.documents(),
        history: session.history(),
        ready: session.is_ready(),
        notice,
    })
}

/// Render the page for an action outcome; failures keep their status code.
fn page_response(session: &Session, outcome: Result<Option<Notice>, AppError>) -> Response {
    match outcome {
        Ok(notice) => Html(page(session, notice)).into_response(),
        Err(error) => {
            let status = error.status();
            let body = page(session, Some(Notice::error(error.to_string())));
            (status, Html(body)).into_response()
        }
    }
}

#[derive(Debug, thiserror::Error)]
enum AppError {
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("Upload failed: {0}")]
    Upload(MultipartError),
    #[error("'{0}' is not a PDF; only .pdf files can be processed")]
    NotPdf(String),
    #[error("Question must not be empty")]
    EmptyQuestion,
    #[error("No document at position {0}")]
    DocumentNotFound(usize),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Session(SessionError::NotProcessed) => StatusCode::CONFLICT,
            Self::Session(SessionError::Processing(error)) => match error {
                ProcessingError::NoDocuments | ProcessingError::Chunking(_) => {
                    StatusCode::BAD_REQUEST
                }
                ProcessingError::Extraction(_) => StatusCode::UNPROCESSABLE_ENTITY,
                ProcessingError::Embedding(_) => StatusCode::BAD_GATEWAY,
            },
            Self::Session(SessionError::Conversation(_)) => StatusCode::BAD_GATEWAY,
            Self::Upload(error) => error.status(),
            Self::NotPdf(_) | Self::EmptyQuestion => StatusCode::BAD_REQUEST,
            Self::DocumentNotFound(_) => StatusCode::NOT_FOUND,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.status(), Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::{AppState, DOCUMENTS_FIELD, create_router};
    use crate::{
        embedding::{EmbeddingClient, EmbeddingProviderError},
        extract::{Document, ExtractionError, TextExtractor},
        generation::{ChatClient, ChatMessage, GenerationError},
        processing::{PipelineSettings, ProcessingService},
    };
    use async_trait::async_trait;
    use axum::{
        Router,
        body::{Body, to_bytes},
        http::{Method, Request, StatusCode, header},
        response::Response,
    };
    use serde_json::json;
    use std::sync::Arc;
    use tower::ServiceExt;

    const BOUNDARY: &str = "pdfchat-test-boundary";

    /// Reads the uploaded bytes as one page of UTF-8 text.
    struct Utf8Pages;

    impl TextExtractor for Utf8Pages {
        fn extract_pages(&self, document: &Document) -> Result<Vec<String>, ExtractionError> {
            String::from_utf8(document.bytes.to_vec())
                .map(|text| vec![text])
                .map_err(|error| ExtractionError::Unreadable {
                    filename: document.filename.clone(),
                    reason: error.to_string(),
                })
        }
    }

    struct LengthEmbedder;

    #[async_trait]
    impl EmbeddingClient for LengthEmbedder {
        async fn generate_embeddings(
            &self,
            texts: Vec<String>,
        ) -> Result<Vec<Vec<f32>>, EmbeddingProviderError> {
            Ok(texts
                .iter()
                .map(|text| vec![1.0, text.len() as f32])
                .collect())
        }
    }

    struct CannedChat;

    #[async_trait]
    impl ChatClient for CannedChat {
        async fn complete(&self, _messages: Vec<ChatMessage>) -> Result<String, GenerationError> {
            Ok("Canned <b>answer</b>".into())
        }
    }

    fn test_router() -> Router {
        let service = ProcessingService::new(
            Arc::new(LengthEmbedder),
            Arc::new(CannedChat),
            PipelineSettings::default(),
        )
        .with_extractor(Arc::new(Utf8Pages));
        create_router(AppState::new(Arc::new(service)), 1024 * 1024)
    }

    fn multipart_body(files: &[(&str, &str)]) -> String {
        let mut body = String::new();
        for (filename, content) in files {
            body.push_str(&format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{DOCUMENTS_FIELD}\"; filename=\"{filename}\"\r\nContent-Type: application/pdf\r\n\r\n{content}\r\n"
            ));
        }
        body.push_str(&format!("--{BOUNDARY}--\r\n"));
        body
    }

    async fn upload(app: &Router, files: &[(&str, &str)]) -> Response {
        app.clone()
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/process")
                    .header(
                        header::CONTENT_TYPE,
                        format!("multipart/form-data; boundary={BOUNDARY}"),
                    )
                    .body(Body::from(multipart_body(files)))
                    .expect("request"),
            )
            .await
            .expect("router response")
    }

    async fn send(app: &Router, method: Method, uri: &str, body: Option<serde_json::Value>) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(value) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };
        app.clone()
            .oneshot(builder.body(body).expect("request"))
            .await
            .expect("router response")
    }

    async fn body_text(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        String::from_utf8(bytes.to_vec()).expect("utf-8 body")
    }

    #[tokio::test]
    async fn page_renders_before_any_upload() {
        let app = test_router();
        let response = send(&app, Method::GET, "/", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        let html = body_text(response).await;
        assert!(html.contains("Upload your PDFs here"));
        assert!(!html.contains("/documents/0"));
    }

    #[tokio::test]
    async fn asking_before_processing_is_a_conflict() {
        let app = test_router();
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/ask")
                    .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .body(Body::from("question=hello"))
                    .expect("request"),
            )
            .await
            .expect("router response");
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert!(body_text(response).await.contains("notice error"));
    }

    #[tokio::test]
    async fn process_then_ask_updates_history_and_metrics() {
        let app = test_router();
        let response = upload(&app, &[("guide.pdf", "Crumbville is a town.")]).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("Processing completed!"));

        let response = send(
            &app,
            Method::POST,
            "/api/ask",
            Some(json!({ "question": "Where?" })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let json: serde_json::Value =
            serde_json::from_str(&body_text(response).await).expect("json body");
        assert_eq!(json["answer"], "Canned <b>answer</b>");
        assert_eq!(json["history"].as_array().map(Vec::len), Some(2));
        assert_eq!(json["history"][0]["role"], "user");
        assert_eq!(json["history"][1]["role"], "assistant");

        let html = body_text(send(&app, Method::GET, "/", None).await).await;
        assert!(html.contains("Canned &lt;b&gt;answer&lt;/b&gt;"));

        let metrics = body_text(send(&app, Method::GET, "/metrics", None).await).await;
        let metrics: serde_json::Value = serde_json::from_str(&metrics).expect("metrics json");
        assert_eq!(metrics["documents_processed"], 1);
        assert_eq!(metrics["questions_answered"], 1);
    }

    #[tokio::test]
    async fn uploaded_documents_are_served_back() {
        let app = test_router();
        upload(&app, &[("a.pdf", "first"), ("b.pdf", "second")]).await;

        let response = send(&app, Method::GET, "/documents/1", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).map(|v| v.as_bytes()),
            Some(&b"application/pdf"[..])
        );
        assert_eq!(body_text(response).await, "second");

        let missing = send(&app, Method::GET, "/documents/2", None).await;
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn non_pdf_upload_is_rejected_without_touching_the_session() {
        let app = test_router();
        let response = upload(&app, &[("notes.txt", "plain")]).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let history = body_text(send(&app, Method::GET, "/api/history", None).await).await;
        let history: serde_json::Value = serde_json::from_str(&history).expect("history json");
        assert_eq!(history["ready"], false);
        assert_eq!(history["documents"].as_array().map(Vec::len), Some(0));
    }

    #[tokio::test]
    async fn empty_upload_reports_no_documents() {
        let app = test_router();
        let response = upload(&app, &[]).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn blank_json_question_is_rejected() {
        let app = test_router();
        upload(&app, &[("guide.pdf", "text")]).await;
        let response = send(
            &app,
            Method::POST,
            "/api/ask",
            Some(json!({ "question": "   " })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
