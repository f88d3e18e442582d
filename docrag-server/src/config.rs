//! Service settings read from the environment.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use docrag::openai::{
    DEFAULT_CHAT_MODEL, DEFAULT_EMBEDDING_MODEL, OpenAIChatSynthesizer, OpenAIConfig,
    OpenAIEmbeddingProvider,
};
use docrag::{AnswerSynthesizer, CorpusMode, EmbeddingProvider, RagConfig, RagPipeline};
use tracing::warn;

/// Settings for the HTTP service and the pipeline behind it.
#[derive(Debug, Clone)]
pub struct Settings {
    pub host: String,
    pub port: u16,
    pub openai_api_key: Option<String>,
    pub openai_base_url: Option<String>,
    pub chat_model: String,
    pub embedding_model: String,
    pub index_dir: PathBuf,
    pub upload_dir: PathBuf,
    pub corpus_mode: CorpusMode,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub top_k: usize,
    pub max_upload_bytes: usize,
    pub request_timeout: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        let rag = RagConfig::default();
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            openai_api_key: None,
            openai_base_url: None,
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            index_dir: rag.index_dir,
            upload_dir: PathBuf::from("uploaded_docs"),
            corpus_mode: rag.corpus_mode,
            chunk_size: rag.chunk_size,
            chunk_overlap: rag.chunk_overlap,
            top_k: rag.top_k,
            max_upload_bytes: 20 * 1024 * 1024,
            request_timeout: Duration::from_secs(60),
        }
    }
}

impl Settings {
    /// Load settings from the process environment, reading `.env` first if present.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from any key lookup; unset keys keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        Ok(Self {
            host: var("DOCRAG_HOST").unwrap_or(defaults.host),
            port: parse_or(var("DOCRAG_PORT"), "DOCRAG_PORT", defaults.port)?,
            openai_api_key: var("OPENAI_API_KEY"),
            openai_base_url: var("OPENAI_BASE_URL"),
            chat_model: var("DOCRAG_CHAT_MODEL").unwrap_or(defaults.chat_model),
            embedding_model: var("DOCRAG_EMBEDDING_MODEL").unwrap_or(defaults.embedding_model),
            index_dir: var("DOCRAG_INDEX_DIR").map(PathBuf::from).unwrap_or(defaults.index_dir),
            upload_dir: var("DOCRAG_UPLOAD_DIR").map(PathBuf::from).unwrap_or(defaults.upload_dir),
            corpus_mode: match var("DOCRAG_CORPUS_MODE") {
                Some(mode) => mode.parse().context("DOCRAG_CORPUS_MODE is invalid")?,
                None => defaults.corpus_mode,
            },
            chunk_size: parse_or(var("DOCRAG_CHUNK_SIZE"), "DOCRAG_CHUNK_SIZE", defaults.chunk_size)?,
            chunk_overlap: parse_or(
                var("DOCRAG_CHUNK_OVERLAP"),
                "DOCRAG_CHUNK_OVERLAP",
                defaults.chunk_overlap,
            )?,
            top_k: parse_or(var("DOCRAG_TOP_K"), "DOCRAG_TOP_K", defaults.top_k)?,
            max_upload_bytes: parse_or(
                var("DOCRAG_MAX_UPLOAD_BYTES"),
                "DOCRAG_MAX_UPLOAD_BYTES",
                defaults.max_upload_bytes,
            )?,
            request_timeout: Duration::from_secs(parse_or(
                var("DOCRAG_REQUEST_TIMEOUT_SECS"),
                "DOCRAG_REQUEST_TIMEOUT_SECS",
                defaults.request_timeout.as_secs(),
            )?),
        })
    }

    /// The validated pipeline configuration.
    pub fn rag_config(&self) -> Result<RagConfig> {
        RagConfig::builder()
            .chunk_size(self.chunk_size)
            .chunk_overlap(self.chunk_overlap)
            .top_k(self.top_k)
            .index_dir(&self.index_dir)
            .corpus_mode(self.corpus_mode)
            .build()
            .context("invalid pipeline configuration")
    }

    /// Build the pipeline, wiring OpenAI providers only when a key is configured.
    pub fn build_pipeline(&self) -> Result<RagPipeline> {
        let (embedder, synthesizer) = match &self.openai_api_key {
            Some(key) => {
                let mut openai = OpenAIConfig::new(key.clone())?.with_timeout(self.request_timeout);
                if let Some(base_url) = &self.openai_base_url {
                    openai = openai.with_base_url(base_url.clone());
                }
                let embedder: Arc<dyn EmbeddingProvider> = Arc::new(
                    OpenAIEmbeddingProvider::new(openai.clone())?
                        .with_model(self.embedding_model.clone()),
                );
                let synthesizer: Arc<dyn AnswerSynthesizer> =
                    Arc::new(OpenAIChatSynthesizer::new(openai)?.with_model(self.chat_model.clone()));
                (Some(embedder), Some(synthesizer))
            }
            None => {
                warn!("OPENAI_API_KEY not set: uploads will fail and answers return context only");
                (None, None)
            }
        };

        Ok(RagPipeline::builder()
            .config(self.rag_config()?)
            .maybe_embedding_provider(embedder)
            .maybe_synthesizer(synthesizer)
            .build()?)
    }
}

fn parse_or<T>(value: Option<String>, key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match value {
        Some(raw) => raw.parse().with_context(|| format!("{key} must be a valid number, got '{raw}'")),
        None => Ok(default),
    }
}
