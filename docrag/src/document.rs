//! Data types for documents, chunks, and pipeline results.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A source document waiting to be chunked.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// Unique identifier for the document.
    pub id: String,
    /// The text content of the document.
    pub text: String,
    /// Name of the file the text came from, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl Document {
    /// Create a document with a fresh random ID.
    pub fn new(text: impl Into<String>, source: Option<String>) -> Self {
        Self { id: Uuid::new_v4().to_string(), text: text.into(), source }
    }
}

/// A contiguous segment of a [`Document`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    /// Unique identifier for the chunk, `{document_id}_{position}`.
    pub id: String,
    /// The ID of the parent [`Document`].
    pub document_id: String,
    /// The text content of the chunk.
    pub text: String,
    /// Position of the chunk in reading order.
    pub position: usize,
    /// Character offset of the chunk's first character in the document text.
    pub start: usize,
    /// Name of the file the parent document came from, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl Chunk {
    /// Character offset one past the chunk's last character.
    pub fn end(&self) -> usize {
        self.start + self.text.chars().count()
    }
}

/// A [`Chunk`] with the embedding computed for it at insertion time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbeddedChunk {
    /// The stored chunk.
    #[serde(flatten)]
    pub chunk: Chunk,
    /// The vector embedding for the chunk's text.
    pub embedding: Vec<f32>,
}

/// A retrieved [`Chunk`] paired with a relevance score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredChunk {
    /// The retrieved chunk.
    pub chunk: Chunk,
    /// The cosine similarity to the query (higher is more relevant).
    pub score: f32,
}

/// Outcome of a successful ingest.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexResult {
    /// ID assigned to the ingested document.
    pub document_id: String,
    /// Number of chunks produced from the document.
    pub chunk_count: usize,
    /// Name of the uploaded file, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Number of chunks searchable after the ingest.
    pub corpus_size: usize,
}

/// How an answer was produced.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AnswerStatus {
    /// The language model answered from the retrieved context.
    Answered,
    /// No corpus has been indexed or could be loaded.
    NoDocuments,
    /// The corpus exists but retrieval returned nothing.
    NoRelevantResults,
    /// No language model credential; the context is returned as is.
    CredentialMissing,
    /// The language model call failed; the context is returned with the error.
    SynthesisFailed,
    /// Embedding the query or searching the index failed.
    RetrievalFailed,
}

/// The text returned for a query together with the context it used.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnswerResult {
    /// The answer, or an informational message for the non-answered statuses.
    pub answer: String,
    /// Retrieved chunk texts joined by blank lines; empty when nothing was retrieved.
    pub context: String,
    /// How the answer was produced.
    pub status: AnswerStatus,
}

impl AnswerResult {
    pub(crate) fn informational(status: AnswerStatus, message: impl Into<String>) -> Self {
        Self { answer: message.into(), context: String::new(), status }
    }
}
