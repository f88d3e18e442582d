//! Retrieval-augmented question answering over a single uploaded corpus.
//!
//! An uploaded PDF or text file is extracted, split into overlapping chunks,
//! embedded, and persisted in an on-disk [`VectorIndex`]. Questions are
//! answered by retrieving the top-k chunks by cosine similarity and asking a
//! language model to answer from them alone. When the language model is not
//! configured or fails, the retrieved context is returned instead.
//!
//! The [`RagPipeline`] ties the pieces together and exposes the two service
//! operations, [`RagPipeline::index_document`] / [`RagPipeline::index_text`]
//! and [`RagPipeline::answer`].

pub mod chunking;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod index;
#[cfg(feature = "openai")]
pub mod openai;
pub mod pipeline;
pub mod synthesis;

pub use chunking::{Chunker, RecursiveChunker};
pub use config::{CorpusMode, RagConfig, RagConfigBuilder};
pub use document::{
    AnswerResult, AnswerStatus, Chunk, Document, EmbeddedChunk, IndexResult, ScoredChunk,
};
pub use embedding::EmbeddingProvider;
pub use error::{RagError, Result};
pub use extract::{DocumentFormat, FileTextExtractor, TextExtractor};
pub use index::{VectorIndex, cosine_similarity};
pub use pipeline::{
    NO_DOCUMENTS_MESSAGE, NO_RELEVANT_RESULTS_MESSAGE, RagPipeline, RagPipelineBuilder,
};
pub use synthesis::{AnswerSynthesizer, build_prompt};
