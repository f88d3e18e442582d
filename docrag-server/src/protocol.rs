use docrag::AnswerStatus;
use serde::{Deserialize, Serialize};

pub const WELCOME_MESSAGE: &str = "Welcome to the docrag API. Use /upload and /query endpoints.";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WelcomeResponse {
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    /// Chunks in the active index, `None` before anything is indexed.
    pub indexed_chunks: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    pub status: String,
    pub message: String,
    pub chunks: usize,
}

/// Response of the PDF-only upload route. Table extraction is not performed,
/// so `tables` is always empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PdfUploadResponse {
    pub status: String,
    pub message: String,
    pub tables: Vec<serde_json::Value>,
}

/// Form body of `POST /query`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryForm {
    #[serde(default)]
    pub query: String,
}

/// Query string of `GET /query/`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryParams {
    #[serde(default)]
    pub q: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    pub query: String,
    pub response: String,
    pub status: AnswerStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerResponse {
    pub answer: String,
    pub query: String,
    pub status: AnswerStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
