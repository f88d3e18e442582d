//! Deterministic stand-ins for the network collaborators.
#![allow(dead_code)]

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use docrag::{AnswerSynthesizer, EmbeddingProvider, RagError};

pub const DIM: usize = 64;

/// Bag-of-words embedding: every lowercase word adds 1.0 to a hashed bucket.
/// Texts sharing words point in similar directions; identical texts are parallel.
/// Setting `offline` makes every call fail, as if the backend went away.
#[derive(Debug, Default)]
pub struct BagOfWordsEmbedder {
    pub calls: AtomicUsize,
    pub offline: AtomicBool,
}

pub fn bag_of_words(text: &str) -> Vec<f32> {
    let mut embedding = vec![0.0f32; DIM];
    for word in text.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty()) {
        let hash = word
            .to_lowercase()
            .bytes()
            .fold(0u64, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u64));
        embedding[(hash % DIM as u64) as usize] += 1.0;
    }
    if embedding.iter().all(|v| *v == 0.0) {
        embedding[0] = 1.0;
    }
    embedding
}

#[async_trait]
impl EmbeddingProvider for BagOfWordsEmbedder {
    fn name(&self) -> &str {
        "bag-of-words"
    }

    async fn embed(&self, text: &str) -> docrag::Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.offline.load(Ordering::SeqCst) {
            return Err(RagError::EmbeddingError {
                provider: "bag-of-words".into(),
                message: "backend offline".into(),
            });
        }
        Ok(bag_of_words(text))
    }

    fn dimensions(&self) -> usize {
        DIM
    }
}

/// An embedder whose backend is always down.
#[derive(Debug, Default)]
pub struct FailingEmbedder;

#[async_trait]
impl EmbeddingProvider for FailingEmbedder {
    fn name(&self) -> &str {
        "failing"
    }

    async fn embed(&self, _text: &str) -> docrag::Result<Vec<f32>> {
        Err(RagError::EmbeddingError {
            provider: "failing".into(),
            message: "connection refused".into(),
        })
    }

    fn dimensions(&self) -> usize {
        DIM
    }
}

/// Echoes a fixed answer and remembers the last prompt it saw.
#[derive(Debug, Default)]
pub struct RecordingSynthesizer {
    pub last_prompt: Mutex<Option<String>>,
}

#[async_trait]
impl AnswerSynthesizer for RecordingSynthesizer {
    fn model(&self) -> &str {
        "recording"
    }

    async fn complete(&self, prompt: &str) -> docrag::Result<String> {
        *self.last_prompt.lock().unwrap() = Some(prompt.to_string());
        Ok("grounded answer".to_string())
    }
}

/// A language model that always errors.
#[derive(Debug, Default)]
pub struct FailingSynthesizer;

#[async_trait]
impl AnswerSynthesizer for FailingSynthesizer {
    fn model(&self) -> &str {
        "failing"
    }

    async fn complete(&self, _prompt: &str) -> docrag::Result<String> {
        Err(RagError::SynthesisError { provider: "failing".into(), message: "rate limited".into() })
    }
}
