//! Tests for the persistent vector index.

mod common;

use std::sync::Arc;

use common::{BagOfWordsEmbedder, DIM, FailingEmbedder, bag_of_words};
use docrag::chunking::{Chunker, RecursiveChunker};
use docrag::document::{Chunk, Document};
use docrag::error::RagError;
use docrag::index::VectorIndex;
use proptest::prelude::*;

fn chunks_of(sentences: &[&str]) -> Vec<Chunk> {
    sentences
        .iter()
        .enumerate()
        .map(|(i, text)| Chunk {
            id: format!("doc_{i}"),
            document_id: "doc".to_string(),
            text: text.to_string(),
            position: i,
            start: 0,
            source: None,
        })
        .collect()
}

const SENTENCES: [&str; 4] = [
    "The payment service retries failed charges three times.",
    "Invoices are emailed to customers at the end of each month.",
    "Refunds take five business days to appear on a statement.",
    "The support desk is open weekdays from nine to five.",
];

#[tokio::test]
async fn missing_directory_does_not_exist_and_loads_nothing() {
    let temp = tempfile::tempdir().unwrap();
    let dir = temp.path().join("vector_store");

    assert!(!VectorIndex::exists(&dir).await);
    let loaded = VectorIndex::load(&dir, Arc::new(BagOfWordsEmbedder::default())).await.unwrap();
    assert!(loaded.is_none());
}

#[tokio::test]
async fn exact_text_query_ranks_its_chunk_first() {
    let temp = tempfile::tempdir().unwrap();
    let provider = Arc::new(BagOfWordsEmbedder::default());
    let index = VectorIndex::rebuild(temp.path(), provider, chunks_of(&SENTENCES)).await.unwrap();

    let results = index.query(SENTENCES[2], 5).await.unwrap();
    assert_eq!(results.len(), SENTENCES.len());
    assert_eq!(results[0].chunk.text, SENTENCES[2]);
    assert!((results[0].score - 1.0).abs() < 1e-5);
    assert!(results.windows(2).all(|w| w[0].score >= w[1].score));
}

#[tokio::test]
async fn query_is_bounded_by_k() {
    let temp = tempfile::tempdir().unwrap();
    let provider = Arc::new(BagOfWordsEmbedder::default());
    let index = VectorIndex::rebuild(temp.path(), provider, chunks_of(&SENTENCES)).await.unwrap();

    assert_eq!(index.query("refunds", 2).await.unwrap().len(), 2);
}

#[tokio::test]
async fn empty_index_returns_no_results_without_embedding() {
    let temp = tempfile::tempdir().unwrap();
    let provider = Arc::new(BagOfWordsEmbedder::default());
    let index = VectorIndex::empty(temp.path(), provider.clone());

    assert!(index.query("anything", 5).await.unwrap().is_empty());
    assert_eq!(provider.calls.load(std::sync::atomic::Ordering::SeqCst), 0);
}

#[tokio::test]
async fn inserted_chunks_are_visible_and_persisted() {
    let temp = tempfile::tempdir().unwrap();
    let provider = Arc::new(BagOfWordsEmbedder::default());
    let index = VectorIndex::empty(temp.path(), provider.clone());

    let inserted = index.insert(chunks_of(&SENTENCES[..2])).await.unwrap();
    assert_eq!(inserted, 2);
    assert_eq!(index.query(SENTENCES[1], 5).await.unwrap()[0].chunk.text, SENTENCES[1]);

    index.insert(chunks_of(&SENTENCES[2..])).await.unwrap();
    assert_eq!(index.len().await, 4);
    assert_eq!(index.dimensions().await, Some(DIM));

    assert!(VectorIndex::exists(temp.path()).await);
    let reloaded = VectorIndex::load(temp.path(), provider).await.unwrap().unwrap();
    assert_eq!(reloaded.len().await, 4);
    let top = reloaded.query(SENTENCES[3], 1).await.unwrap();
    assert_eq!(top[0].chunk.text, SENTENCES[3]);
}

#[tokio::test]
async fn rebuild_replaces_previous_contents() {
    let temp = tempfile::tempdir().unwrap();
    let provider = Arc::new(BagOfWordsEmbedder::default());
    VectorIndex::rebuild(temp.path(), provider.clone(), chunks_of(&SENTENCES)).await.unwrap();
    VectorIndex::rebuild(temp.path(), provider.clone(), chunks_of(&SENTENCES[..1])).await.unwrap();

    let reloaded = VectorIndex::load(temp.path(), provider).await.unwrap().unwrap();
    assert_eq!(reloaded.len().await, 1);
}

#[tokio::test]
async fn failed_embedding_leaves_the_file_untouched() {
    let temp = tempfile::tempdir().unwrap();
    let good = Arc::new(BagOfWordsEmbedder::default());
    let index = VectorIndex::rebuild(temp.path(), good, chunks_of(&SENTENCES[..2])).await.unwrap();
    let before = std::fs::read(VectorIndex::index_path(temp.path())).unwrap();

    let failing = VectorIndex::load(temp.path(), Arc::new(FailingEmbedder)).await.unwrap().unwrap();
    let err = failing.insert(chunks_of(&SENTENCES[2..])).await.unwrap_err();
    assert!(matches!(err, RagError::EmbeddingError { .. }));
    assert_eq!(failing.len().await, 2);

    let err =
        VectorIndex::rebuild(temp.path(), Arc::new(FailingEmbedder), chunks_of(&SENTENCES[2..]))
            .await
            .unwrap_err();
    assert!(matches!(err, RagError::EmbeddingError { .. }));

    let after = std::fs::read(VectorIndex::index_path(temp.path())).unwrap();
    assert_eq!(before, after);
    assert_eq!(index.len().await, 2);
}

#[tokio::test]
async fn malformed_records_fail_to_load() {
    let temp = tempfile::tempdir().unwrap();
    std::fs::write(VectorIndex::index_path(temp.path()), "{not json}\n").unwrap();

    let err = VectorIndex::load(temp.path(), Arc::new(BagOfWordsEmbedder::default()))
        .await
        .unwrap_err();
    assert!(matches!(err, RagError::VectorStoreError { .. }));
}

#[tokio::test]
async fn torn_trailing_record_is_skipped_then_overwritten() {
    let temp = tempfile::tempdir().unwrap();
    let provider = Arc::new(BagOfWordsEmbedder::default());
    let path = VectorIndex::index_path(temp.path());
    VectorIndex::rebuild(temp.path(), provider.clone(), chunks_of(&SENTENCES[..2])).await.unwrap();

    // An append that died halfway through its record.
    let mut content = std::fs::read_to_string(&path).unwrap();
    content.push_str(r#"{"id":"torn_0","document_id":"torn","te"#);
    std::fs::write(&path, &content).unwrap();

    let index = VectorIndex::load(temp.path(), provider.clone()).await.unwrap().unwrap();
    assert_eq!(index.len().await, 2);

    index.insert(chunks_of(&SENTENCES[2..])).await.unwrap();
    let content = std::fs::read_to_string(&path).unwrap();
    assert!(!content.contains("torn_0"));
    assert!(content.ends_with('\n'));

    let reloaded = VectorIndex::load(temp.path(), provider).await.unwrap().unwrap();
    assert_eq!(reloaded.len().await, 4);
    assert_eq!(reloaded.query(SENTENCES[3], 1).await.unwrap()[0].chunk.text, SENTENCES[3]);
}

#[tokio::test]
async fn unterminated_final_record_is_kept_and_appended_after() {
    let temp = tempfile::tempdir().unwrap();
    let provider = Arc::new(BagOfWordsEmbedder::default());
    let path = VectorIndex::index_path(temp.path());
    VectorIndex::rebuild(temp.path(), provider.clone(), chunks_of(&SENTENCES[..2])).await.unwrap();
    let content = std::fs::read_to_string(&path).unwrap();
    std::fs::write(&path, content.trim_end()).unwrap();

    let index = VectorIndex::load(temp.path(), provider.clone()).await.unwrap().unwrap();
    assert_eq!(index.len().await, 2);
    index.insert(chunks_of(&SENTENCES[2..])).await.unwrap();

    let reloaded = VectorIndex::load(temp.path(), provider).await.unwrap().unwrap();
    assert_eq!(reloaded.len().await, 4);
}

#[tokio::test]
async fn chunked_document_round_trips_through_disk() {
    let temp = tempfile::tempdir().unwrap();
    let provider = Arc::new(BagOfWordsEmbedder::default());
    let text = SENTENCES.join("\n\n").repeat(10);
    let document = Document { id: "handbook".into(), text, source: Some("handbook.txt".into()) };
    let chunks = RecursiveChunker::new(200, 40).chunk(&document);
    let count = chunks.len();

    VectorIndex::rebuild(temp.path(), provider.clone(), chunks.clone()).await.unwrap();
    let reloaded = VectorIndex::load(temp.path(), provider).await.unwrap().unwrap();
    assert_eq!(reloaded.len().await, count);

    let results = reloaded.search(&bag_of_words(&chunks[3].text), 1).await.unwrap();
    assert_eq!(results[0].chunk.source.as_deref(), Some("handbook.txt"));
}

/// *For any* stored corpus and query, search returns at most `k` results
/// ordered by descending score.
mod prop_search_ordering {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(50))]

        #[test]
        fn results_ordered_descending_and_bounded_by_k(
            texts in proptest::collection::vec("[a-z]{2,6}( [a-z]{2,6}){0,8}", 1..15),
            query in "[a-z]{2,6}( [a-z]{2,6}){0,4}",
            k in 1usize..20,
        ) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            let results = rt.block_on(async {
                let temp = tempfile::tempdir().unwrap();
                let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
                let index = VectorIndex::rebuild(
                    temp.path(),
                    Arc::new(BagOfWordsEmbedder::default()),
                    chunks_of(&refs),
                )
                .await
                .unwrap();
                index.query(&query, k).await.unwrap()
            });

            prop_assert!(results.len() <= k);
            prop_assert!(results.len() <= texts.len());
            for window in results.windows(2) {
                prop_assert!(window[0].score >= window[1].score);
            }
        }
    }
}
