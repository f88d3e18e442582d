//! Error types for the `docrag` crate.

use thiserror::Error;

/// Errors that can occur in RAG operations.
#[derive(Debug, Error)]
pub enum RagError {
    /// The uploaded file has an extension the extractor does not handle.
    #[error("Unsupported file format '{extension}'. Use PDF or TXT.")]
    UnsupportedFormat {
        /// The offending extension (empty when the file name has none).
        extension: String,
    },

    /// The input could not be turned into text.
    #[error("Failed to extract text from {format} input: {message}")]
    Extraction {
        /// The declared format of the input.
        format: String,
        /// A description of the failure.
        message: String,
    },

    /// A provider credential is not configured.
    #[error("{provider} API key is not configured")]
    MissingCredential {
        /// The provider whose credential is missing.
        provider: String,
    },

    /// An ingest failed; nothing from it was made visible.
    #[error("Indexing failed: {source}")]
    IndexingFailed {
        /// The underlying cause.
        #[source]
        source: Box<RagError>,
    },

    /// An error occurred during embedding generation.
    #[error("Embedding error ({provider}): {message}")]
    EmbeddingError {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// An error occurred while generating an answer.
    #[error("Synthesis error ({provider}): {message}")]
    SynthesisError {
        /// The language model provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// An error occurred in the vector index.
    #[error("Vector store error ({backend}): {message}")]
    VectorStoreError {
        /// The vector index backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// A filesystem error.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl RagError {
    /// Wrap an ingest failure, leaving already-wrapped errors alone.
    pub fn indexing_failed(source: RagError) -> Self {
        match source {
            err @ RagError::IndexingFailed { .. } => err,
            other => RagError::IndexingFailed { source: Box::new(other) },
        }
    }

    /// Whether the error was caused by the caller's input rather than the service.
    pub fn is_client_error(&self) -> bool {
        match self {
            RagError::UnsupportedFormat { .. } | RagError::Extraction { .. } => true,
            RagError::IndexingFailed { source } => source.is_client_error(),
            _ => false,
        }
    }
}

/// A convenience result type for RAG operations.
pub type Result<T> = std::result::Result<T, RagError>;
