//! Persistent vector index with cosine similarity search.
//!
//! The corpus lives in a single JSON Lines file, `index.jsonl`, inside the
//! index directory: one [`EmbeddedChunk`] per line. Inserts append to the file;
//! a rebuild writes a fresh file next to it and renames it into place. The
//! whole corpus is also held in memory behind a `tokio::sync::RwLock`, and
//! searches scan it linearly.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::document::{Chunk, EmbeddedChunk, ScoredChunk};
use crate::embedding::{EmbeddingProvider, embed_all};
use crate::error::{RagError, Result};

/// File name of the persisted index inside the index directory.
pub const INDEX_FILE: &str = "index.jsonl";

const BACKEND: &str = "jsonl";

/// `committed_len` value meaning "take the length of the file as it is".
const UNKNOWN_LEN: u64 = u64::MAX;

fn store_error(message: impl Into<String>) -> RagError {
    RagError::VectorStoreError { backend: BACKEND.to_string(), message: message.into() }
}

/// A persisted corpus of embedded chunks.
///
/// Every stored chunk carries the embedding computed when it was inserted;
/// embeddings are never recomputed, and all of them share one dimension.
///
/// # Example
///
/// ```rust,ignore
/// use docrag::VectorIndex;
///
/// let index = VectorIndex::rebuild("vector_store", provider, chunks).await?;
/// let results = index.query("what is the refund policy?", 5).await?;
/// ```
pub struct VectorIndex {
    dir: PathBuf,
    provider: Arc<dyn EmbeddingProvider>,
    records: RwLock<Vec<EmbeddedChunk>>,
    /// Bytes of the index file holding complete records. Only changed while
    /// `records` is write-locked.
    committed_len: AtomicU64,
}

impl std::fmt::Debug for VectorIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorIndex")
            .field("dir", &self.dir)
            .field("provider", &self.provider.name())
            .finish_non_exhaustive()
    }
}

impl VectorIndex {
    /// Path of the index file inside `dir`.
    pub fn index_path(dir: &Path) -> PathBuf {
        dir.join(INDEX_FILE)
    }

    /// Whether a non-empty persisted index exists in `dir`.
    pub async fn exists(dir: &Path) -> bool {
        fs::metadata(Self::index_path(dir))
            .await
            .map(|meta| meta.is_file() && meta.len() > 0)
            .unwrap_or(false)
    }

    /// An index over `dir` with nothing loaded. Nothing is written until the
    /// first insert.
    pub fn empty(dir: impl Into<PathBuf>, provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            dir: dir.into(),
            provider,
            records: RwLock::new(Vec::new()),
            committed_len: AtomicU64::new(UNKNOWN_LEN),
        }
    }

    /// Hydrate an index from `dir`.
    ///
    /// Returns `Ok(None)` when no persisted index exists. An unterminated
    /// trailing record that does not parse is left over from an interrupted
    /// append; it is skipped and overwritten by the next insert.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::VectorStoreError`] if a record cannot be parsed or
    /// the records disagree on embedding dimension, and [`RagError::Io`] if the
    /// file cannot be read.
    pub async fn load(
        dir: impl Into<PathBuf>,
        provider: Arc<dyn EmbeddingProvider>,
    ) -> Result<Option<Self>> {
        let dir = dir.into();
        if !Self::exists(&dir).await {
            return Ok(None);
        }

        let path = Self::index_path(&dir);
        let content = fs::read_to_string(&path).await?;
        let mut records = Vec::new();
        let mut committed = 0usize;
        for (line_number, raw) in content.split_inclusive('\n').enumerate() {
            let line = raw.trim_end_matches(['\n', '\r']);
            if !line.trim().is_empty() {
                match serde_json::from_str::<EmbeddedChunk>(line) {
                    Ok(record) => records.push(record),
                    Err(e) if !raw.ends_with('\n') => {
                        warn!(
                            path = %path.display(),
                            line = line_number + 1,
                            error = %e,
                            "skipping torn trailing record"
                        );
                        break;
                    }
                    Err(e) => {
                        let location = format!("{}:{}", path.display(), line_number + 1);
                        return Err(store_error(format!("invalid record at {location}: {e}")));
                    }
                }
            }
            committed += raw.len();
        }
        check_dimensions(&records, None)?;

        info!(dir = %dir.display(), chunk_count = records.len(), "loaded vector index");
        Ok(Some(Self {
            dir,
            provider,
            records: RwLock::new(records),
            committed_len: AtomicU64::new(committed as u64),
        }))
    }

    /// Replace whatever is persisted in `dir` with `chunks`.
    ///
    /// All chunks are embedded before anything is written, and the new file is
    /// renamed over the old one, so a failure leaves the previous index intact.
    pub async fn rebuild(
        dir: impl Into<PathBuf>,
        provider: Arc<dyn EmbeddingProvider>,
        chunks: Vec<Chunk>,
    ) -> Result<Self> {
        let dir = dir.into();
        let records = embed_chunks(provider.as_ref(), chunks).await?;
        check_dimensions(&records, None)?;
        let payload = serialize_records(&records)?;

        fs::create_dir_all(&dir).await?;
        let path = Self::index_path(&dir);
        let staging = path.with_extension("jsonl.tmp");
        {
            let mut file = fs::File::create(&staging).await?;
            file.write_all(payload.as_bytes()).await?;
            file.sync_all().await?;
        }
        fs::rename(&staging, &path).await?;

        info!(dir = %dir.display(), chunk_count = records.len(), "rebuilt vector index");
        Ok(Self {
            dir,
            provider,
            records: RwLock::new(records),
            committed_len: AtomicU64::new(payload.len() as u64),
        })
    }

    /// Embed `chunks` and append them to the index.
    ///
    /// Inserted chunks are visible to [`query`](Self::query) as soon as this
    /// returns. Nothing is written unless every chunk was embedded, and a
    /// failed write or sync truncates the file back to its previous length.
    ///
    /// Returns the number of chunks inserted.
    pub async fn insert(&self, chunks: Vec<Chunk>) -> Result<usize> {
        if chunks.is_empty() {
            return Ok(0);
        }
        let new_records = embed_chunks(self.provider.as_ref(), chunks).await?;
        let mut payload = serialize_records(&new_records)?;

        let mut records = self.records.write().await;
        let existing = records.first().map(|r| r.embedding.len());
        check_dimensions(&new_records, existing)?;

        fs::create_dir_all(&self.dir).await?;
        let mut file = fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(Self::index_path(&self.dir))
            .await?;
        let committed = match self.committed_len.load(Ordering::Acquire) {
            UNKNOWN_LEN => file.metadata().await?.len(),
            len => len,
        };
        if committed > 0 && !ends_with_newline(&mut file, committed).await? {
            payload.insert(0, '\n');
        }

        // Drops anything past the last complete record before appending.
        file.set_len(committed).await?;
        if let Err(e) = append_at(&mut file, committed, payload.as_bytes()).await {
            if let Err(rollback) = file.set_len(committed).await {
                warn!(error = %rollback, "failed to roll back partial append");
            }
            return Err(e.into());
        }
        self.committed_len.store(committed + payload.len() as u64, Ordering::Release);

        let inserted = new_records.len();
        records.extend(new_records);
        let total = records.len();
        info!(dir = %self.dir.display(), inserted, total, "appended to vector index");
        Ok(inserted)
    }

    /// Embed `text` and return the `k` most similar chunks.
    pub async fn query(&self, text: &str, k: usize) -> Result<Vec<ScoredChunk>> {
        if self.is_empty().await || k == 0 {
            return Ok(Vec::new());
        }
        let embedding = self.provider.embed(text).await?;
        self.search(&embedding, k).await
    }

    /// Return the `k` stored chunks most similar to `embedding`, best first.
    pub async fn search(&self, embedding: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        let records = self.records.read().await;
        if let Some(first) = records.first() {
            if first.embedding.len() != embedding.len() {
                return Err(store_error(format!(
                    "query embedding has {} dimensions, index has {}",
                    embedding.len(),
                    first.embedding.len()
                )));
            }
        }

        let mut scored: Vec<ScoredChunk> = records
            .iter()
            .map(|record| ScoredChunk {
                chunk: record.chunk.clone(),
                score: cosine_similarity(&record.embedding, embedding),
            })
            .collect();

        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(k);
        debug!(candidates = records.len(), returned = scored.len(), "searched vector index");
        Ok(scored)
    }

    /// Number of stored chunks.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// Whether the index holds no chunks.
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    /// Embedding dimension of the stored chunks, if any are stored.
    pub async fn dimensions(&self) -> Option<usize> {
        self.records.read().await.first().map(|r| r.embedding.len())
    }
}

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 if either vector has zero magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

async fn ends_with_newline(file: &mut fs::File, len: u64) -> std::io::Result<bool> {
    let mut last = [0u8; 1];
    file.seek(SeekFrom::Start(len - 1)).await?;
    file.read_exact(&mut last).await?;
    Ok(last[0] == b'\n')
}

async fn append_at(file: &mut fs::File, offset: u64, payload: &[u8]) -> std::io::Result<()> {
    file.seek(SeekFrom::Start(offset)).await?;
    file.write_all(payload).await?;
    file.flush().await?;
    file.sync_data().await
}

async fn embed_chunks(
    provider: &dyn EmbeddingProvider,
    chunks: Vec<Chunk>,
) -> Result<Vec<EmbeddedChunk>> {
    let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
    let embeddings = embed_all(provider, &texts).await?;
    Ok(chunks
        .into_iter()
        .zip(embeddings)
        .map(|(chunk, embedding)| EmbeddedChunk { chunk, embedding })
        .collect())
}

/// Every record must have a non-empty embedding of the same dimension,
/// matching `expected` when the index already holds records.
fn check_dimensions(records: &[EmbeddedChunk], expected: Option<usize>) -> Result<()> {
    let Some(expected) = expected.or_else(|| records.first().map(|r| r.embedding.len())) else {
        return Ok(());
    };
    if expected == 0 {
        return Err(store_error("embeddings must not be empty"));
    }
    if let Some(bad) = records.iter().find(|r| r.embedding.len() != expected) {
        return Err(store_error(format!(
            "chunk '{}' has {} dimensions, expected {expected}",
            bad.chunk.id,
            bad.embedding.len()
        )));
    }
    Ok(())
}

fn serialize_records(records: &[EmbeddedChunk]) -> Result<String> {
    let mut payload = String::new();
    for record in records {
        let line = serde_json::to_string(record).map_err(|e| {
            store_error(format!("failed to serialize chunk '{}': {e}", record.chunk.id))
        })?;
        payload.push_str(&line);
        payload.push('\n');
    }
    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_of_parallel_vectors_is_one() {
        let score = cosine_similarity(&[1.0, 2.0, 3.0], &[2.0, 4.0, 6.0]);
        assert!((score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_with_zero_vector_is_zero() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn rejects_mixed_dimensions() {
        let chunk = Chunk {
            id: "d_0".into(),
            document_id: "d".into(),
            text: "x".into(),
            position: 0,
            start: 0,
            source: None,
        };
        let records = vec![
            EmbeddedChunk { chunk: chunk.clone(), embedding: vec![1.0, 0.0] },
            EmbeddedChunk { chunk, embedding: vec![1.0] },
        ];
        assert!(check_dimensions(&records, None).is_err());
        assert!(check_dimensions(&records[..1], Some(3)).is_err());
        assert!(check_dimensions(&records[..1], Some(2)).is_ok());
    }
}
