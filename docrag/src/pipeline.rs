//! RAG pipeline orchestrator.
//!
//! The [`RagPipeline`] owns the active [`VectorIndex`] handle and coordinates
//! the two operations the service exposes:
//!
//! - ingest: extract → chunk → embed → store, all-or-nothing
//! - answer: resolve index → retrieve top-k → build prompt → synthesize
//!
//! # Example
//!
//! ```rust,ignore
//! use docrag::{RagConfig, RagPipeline};
//!
//! let pipeline = RagPipeline::builder()
//!     .config(RagConfig::default())
//!     .embedding_provider(Arc::new(embedder))
//!     .synthesizer(Arc::new(chat))
//!     .build()?;
//!
//! pipeline.index_document(&bytes, "handbook.pdf").await?;
//! let answer = pipeline.answer("How many vacation days do I get?").await;
//! ```

use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tracing::{error, info, warn};

use crate::chunking::{Chunker, RecursiveChunker};
use crate::config::{CorpusMode, RagConfig};
use crate::document::{AnswerResult, AnswerStatus, Chunk, Document, IndexResult, ScoredChunk};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::extract::{DocumentFormat, FileTextExtractor, TextExtractor};
use crate::index::VectorIndex;
use crate::synthesis::{AnswerSynthesizer, build_prompt};

/// Returned when no corpus has been indexed or loaded.
pub const NO_DOCUMENTS_MESSAGE: &str = "No documents found. Please upload a file first.";

/// Returned when retrieval comes back empty.
pub const NO_RELEVANT_RESULTS_MESSAGE: &str = "No relevant documents found for your query.";

/// Separator placed between retrieved chunk texts in the context.
pub const CONTEXT_SEPARATOR: &str = "\n\n";

/// The RAG pipeline orchestrator.
///
/// Holds at most one active [`VectorIndex`]. It is absent until the first
/// successful ingest or the first successful lazy load from the configured
/// index directory. Ingests are serialized internally; queries run
/// concurrently against a shared handle.
pub struct RagPipeline {
    config: RagConfig,
    extractor: Arc<dyn TextExtractor>,
    chunker: Arc<dyn Chunker>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    synthesizer: Option<Arc<dyn AnswerSynthesizer>>,
    active: RwLock<Option<Arc<VectorIndex>>>,
    ingest_lock: Mutex<()>,
}

impl std::fmt::Debug for RagPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RagPipeline")
            .field("config", &self.config)
            .field("embedding_provider", &self.embedding_provider.as_ref().map(|p| p.name()))
            .field("synthesizer", &self.synthesizer.as_ref().map(|s| s.model()))
            .finish_non_exhaustive()
    }
}

impl RagPipeline {
    /// Create a new [`RagPipelineBuilder`].
    pub fn builder() -> RagPipelineBuilder {
        RagPipelineBuilder::default()
    }

    /// Return a reference to the pipeline configuration.
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Whether an embedding provider (and so its credential) is configured.
    pub fn has_embedding_provider(&self) -> bool {
        self.embedding_provider.is_some()
    }

    /// Whether a language model (and so its credential) is configured.
    pub fn has_synthesizer(&self) -> bool {
        self.synthesizer.is_some()
    }

    /// Extract, chunk, embed, and store an uploaded file.
    ///
    /// The format is taken from `filename`'s extension.
    ///
    /// # Errors
    ///
    /// - [`RagError::UnsupportedFormat`] for anything but `.pdf` / `.txt`
    /// - [`RagError::Extraction`] if the bytes cannot be read as that format
    /// - the errors of [`index_text`](Self::index_text)
    pub async fn index_document(&self, bytes: &[u8], filename: &str) -> Result<IndexResult> {
        let format = DocumentFormat::from_filename(filename)?;
        let text = self.extractor.extract(bytes, format)?;
        info!(filename, %format, text_len = text.len(), "extracted document text");
        self.index_text(text, Some(filename.to_string())).await
    }

    /// Chunk, embed, and store `text`, then make it the active corpus.
    ///
    /// In [`CorpusMode::Replace`] the persisted index is rebuilt from this text
    /// alone; in [`CorpusMode::Union`] its chunks are appended to whatever is
    /// already persisted. Either way nothing becomes visible unless the whole
    /// ingest succeeds, and on failure the previous handle stays active.
    /// Empty or whitespace-only text produces no chunks and leaves the corpus
    /// unchanged.
    ///
    /// # Errors
    ///
    /// - [`RagError::MissingCredential`] if no embedding provider is configured
    /// - [`RagError::IndexingFailed`] wrapping any embedding or storage failure
    pub async fn index_text(
        &self,
        text: impl Into<String>,
        source: Option<String>,
    ) -> Result<IndexResult> {
        let document = Document::new(text, source);

        // 1. Chunk the document; blank text has nothing worth indexing
        let chunks = if document.text.trim().is_empty() {
            Vec::new()
        } else {
            self.chunker.chunk(&document)
        };
        let chunk_count = chunks.len();

        // 2. Require the embedding credential
        let provider = self.embedding_provider.clone().ok_or_else(|| {
            warn!(document.id = %document.id, "embedding provider not configured");
            RagError::MissingCredential { provider: "embedding".to_string() }
        })?;

        // 3. One ingest at a time
        let _guard = self.ingest_lock.lock().await;

        if chunks.is_empty() {
            info!(document.id = %document.id, chunk_count = 0, "ingested document (blank)");
            return Ok(IndexResult {
                document_id: document.id,
                chunk_count: 0,
                source: document.source,
                corpus_size: self.corpus_size().await.unwrap_or(0),
            });
        }

        // 4. Build the new index
        let index = self.build_index(provider, chunks).await.map_err(|e| {
            error!(document.id = %document.id, error = %e, "indexing failed");
            RagError::indexing_failed(e)
        })?;

        // 5. Publish it
        let corpus_size = index.len().await;
        *self.active.write().await = Some(Arc::new(index));
        info!(
            document.id = %document.id,
            chunk_count,
            corpus_size,
            mode = ?self.config.corpus_mode,
            "ingested document"
        );

        Ok(IndexResult {
            document_id: document.id,
            chunk_count,
            source: document.source,
            corpus_size,
        })
    }

    async fn build_index(
        &self,
        provider: Arc<dyn EmbeddingProvider>,
        chunks: Vec<Chunk>,
    ) -> Result<VectorIndex> {
        let dir = self.config.index_dir.clone();
        match self.config.corpus_mode {
            CorpusMode::Replace => VectorIndex::rebuild(dir, provider, chunks).await,
            CorpusMode::Union => {
                let index = match VectorIndex::load(dir.clone(), provider.clone()).await? {
                    Some(index) => index,
                    None => VectorIndex::empty(dir, provider),
                };
                index.insert(chunks).await?;
                Ok(index)
            }
        }
    }

    /// Answer `query` from the corpus.
    ///
    /// Never fails: missing corpora, empty retrievals, a missing language
    /// model credential, and provider failures all produce an
    /// [`AnswerResult`] whose [`status`](AnswerResult::status) says what happened.
    pub async fn answer(&self, query: &str) -> AnswerResult {
        // 1. Resolve the active index
        let Some(index) = self.active_index().await else {
            info!("query received with no corpus available");
            return AnswerResult::informational(AnswerStatus::NoDocuments, NO_DOCUMENTS_MESSAGE);
        };

        // 2. Retrieve
        let results = match index.query(query, self.config.top_k).await {
            Ok(results) => results,
            Err(e) => {
                error!(error = %e, "retrieval failed");
                return AnswerResult::informational(
                    AnswerStatus::RetrievalFailed,
                    format!("Retrieval failed: {e}"),
                );
            }
        };
        if results.is_empty() {
            return AnswerResult::informational(
                AnswerStatus::NoRelevantResults,
                NO_RELEVANT_RESULTS_MESSAGE,
            );
        }

        // 3. Build the context in score order
        let context = results
            .iter()
            .map(|r| r.chunk.text.as_str())
            .collect::<Vec<_>>()
            .join(CONTEXT_SEPARATOR);

        // 4. Degrade without a language model
        let Some(synthesizer) = &self.synthesizer else {
            warn!("language model not configured, returning context only");
            return AnswerResult {
                answer: format!(
                    "Context found:\n{context}\n\nNote: language model API key not configured; \
                     returning retrieved context only."
                ),
                context,
                status: AnswerStatus::CredentialMissing,
            };
        };

        // 5. Synthesize
        let prompt = build_prompt(&context, query);
        match synthesizer.complete(&prompt).await {
            Ok(answer) => {
                info!(model = synthesizer.model(), retrieved = results.len(), "answered query");
                AnswerResult { answer, context, status: AnswerStatus::Answered }
            }
            // 6. Degrade on failure
            Err(e) => {
                error!(model = synthesizer.model(), error = %e, "synthesis failed");
                AnswerResult {
                    answer: format!("Error generating response: {e}\n\nContext:\n{context}"),
                    context,
                    status: AnswerStatus::SynthesisFailed,
                }
            }
        }
    }

    /// Return the top-k chunks for `query`, best first.
    ///
    /// Returns an empty `Vec` when no corpus is available.
    ///
    /// # Errors
    ///
    /// Returns the embedding or index error if retrieval fails.
    pub async fn retrieve(&self, query: &str) -> Result<Vec<ScoredChunk>> {
        match self.active_index().await {
            Some(index) => index.query(query, self.config.top_k).await,
            None => Ok(Vec::new()),
        }
    }

    /// Number of chunks in the active corpus, if one is available.
    pub async fn corpus_size(&self) -> Option<usize> {
        match self.active_index().await {
            Some(index) => Some(index.len().await),
            None => None,
        }
    }

    /// The in-memory handle, or one lazily loaded from disk and cached.
    ///
    /// A missing provider, a missing index, or a load error all yield `None`.
    async fn active_index(&self) -> Option<Arc<VectorIndex>> {
        if let Some(index) = self.active.read().await.as_ref() {
            return Some(index.clone());
        }

        let Some(provider) = self.embedding_provider.clone() else {
            if VectorIndex::exists(&self.config.index_dir).await {
                warn!("persisted index found but no embedding provider is configured");
            }
            return None;
        };

        let mut active = self.active.write().await;
        if let Some(index) = active.as_ref() {
            return Some(index.clone());
        }
        match VectorIndex::load(self.config.index_dir.clone(), provider).await {
            Ok(Some(index)) => {
                let index = Arc::new(index);
                *active = Some(index.clone());
                Some(index)
            }
            Ok(None) => None,
            Err(e) => {
                let dir = self.config.index_dir.display();
                error!(dir = %dir, error = %e, "failed to load vector index");
                None
            }
        }
    }
}

/// Builder for constructing a [`RagPipeline`].
///
/// Only the config is required. The extractor defaults to
/// [`FileTextExtractor`] and the chunker to a [`RecursiveChunker`] sized from
/// the config. Leaving out the embedding provider or the synthesizer models a
/// credential that is not configured.
#[derive(Default)]
pub struct RagPipelineBuilder {
    config: Option<RagConfig>,
    extractor: Option<Arc<dyn TextExtractor>>,
    chunker: Option<Arc<dyn Chunker>>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    synthesizer: Option<Arc<dyn AnswerSynthesizer>>,
}

impl RagPipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the text extractor.
    pub fn extractor(mut self, extractor: Arc<dyn TextExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    /// Set the document chunker.
    pub fn chunker(mut self, chunker: Arc<dyn Chunker>) -> Self {
        self.chunker = Some(chunker);
        self
    }

    /// Set the embedding provider.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// Set the embedding provider if one is available.
    pub fn maybe_embedding_provider(
        mut self,
        provider: Option<Arc<dyn EmbeddingProvider>>,
    ) -> Self {
        self.embedding_provider = provider;
        self
    }

    /// Set the answer synthesizer.
    pub fn synthesizer(mut self, synthesizer: Arc<dyn AnswerSynthesizer>) -> Self {
        self.synthesizer = Some(synthesizer);
        self
    }

    /// Set the answer synthesizer if one is available.
    pub fn maybe_synthesizer(mut self, synthesizer: Option<Arc<dyn AnswerSynthesizer>>) -> Self {
        self.synthesizer = synthesizer;
        self
    }

    /// Build the [`RagPipeline`].
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if the config is missing.
    pub fn build(self) -> Result<RagPipeline> {
        let config =
            self.config.ok_or_else(|| RagError::ConfigError("config is required".to_string()))?;
        let chunker = self.chunker.unwrap_or_else(|| {
            Arc::new(RecursiveChunker::new(config.chunk_size, config.chunk_overlap))
        });

        Ok(RagPipeline {
            extractor: self.extractor.unwrap_or_else(|| Arc::new(FileTextExtractor)),
            chunker,
            embedding_provider: self.embedding_provider,
            synthesizer: self.synthesizer,
            active: RwLock::new(None),
            ingest_lock: Mutex::new(()),
            config,
        })
    }
}
