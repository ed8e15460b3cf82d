//! End-to-end pipeline tests with injected in-memory collaborators:
//! a deterministic bag-of-words embedding provider and a vector store
//! that lives in a mutex-guarded map.

use docs_rag::config::Config;
use docs_rag::embedding::{ChunkEmbedding, EmbeddingProvider};
use docs_rag::error::{EmbeddingError, VectorDbError};
use docs_rag::parser::ParsedCorpus;
use docs_rag::pipeline::DocsRagPipeline;
use docs_rag::types::{
    ChunkType, ContentMetadata, DocumentChunk, EmbeddingStatus, Importance, ParsedContent,
    VectorSearchResult,
};
use docs_rag::vector_db::{SearchFilters, VectorDatabase, VectorStoreStats};
use std::collections::HashMap;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

const DIM: usize = 32;

/// Deterministic bag-of-words embedding: texts sharing words land close
/// together under cosine similarity
struct BagOfWordsProvider;

fn embed_text(text: &str) -> Vec<f32> {
    let mut vector = vec![0.0f32; DIM];
    for word in text
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() >= 3)
    {
        let mut hasher = DefaultHasher::new();
        word.hash(&mut hasher);
        vector[(hasher.finish() % DIM as u64) as usize] += 1.0;
    }
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in &mut vector {
            *v /= norm;
        }
    }
    vector
}

impl EmbeddingProvider for BagOfWordsProvider {
    fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Ok(texts.iter().map(|t| embed_text(t)).collect())
    }

    fn dimension(&self) -> usize {
        DIM
    }

    fn model_name(&self) -> &str {
        "bag-of-words"
    }
}

/// Fails any batch containing the given marker text
struct FailingProvider {
    marker: &'static str,
}

impl EmbeddingProvider for FailingProvider {
    fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.iter().any(|t| t.contains(self.marker)) {
            return Err(EmbeddingError::GenerationFailed(format!(
                "provider rejected text containing '{}'",
                self.marker
            )));
        }
        Ok(texts.iter().map(|t| embed_text(t)).collect())
    }

    fn dimension(&self) -> usize {
        DIM
    }

    fn model_name(&self) -> &str {
        "failing-model"
    }
}

#[derive(Default)]
struct MemoryVectorStore {
    points: Mutex<HashMap<String, (Vec<f32>, DocumentChunk)>>,
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[async_trait::async_trait]
impl VectorDatabase for MemoryVectorStore {
    async fn initialize(&self) -> Result<usize, VectorDbError> {
        Ok(self.points.lock().unwrap().len())
    }

    async fn upsert_chunks(
        &self,
        chunks: &[DocumentChunk],
        embeddings: &[ChunkEmbedding],
    ) -> Result<usize, VectorDbError> {
        let by_id: HashMap<&str, &DocumentChunk> =
            chunks.iter().map(|c| (c.id.as_str(), c)).collect();
        let mut points = self.points.lock().unwrap();
        let mut stored = 0;
        for embedding in embeddings {
            if let Some(chunk) = by_id.get(embedding.chunk_id.as_str()) {
                points.insert(
                    embedding.embedding_id.clone(),
                    (embedding.vector.clone(), (*chunk).clone()),
                );
                stored += 1;
            }
        }
        Ok(stored)
    }

    async fn search(
        &self,
        query_vector: Vec<f32>,
        filters: &SearchFilters,
        limit: usize,
        score_threshold: f32,
    ) -> Result<Vec<VectorSearchResult>, VectorDbError> {
        let points = self.points.lock().unwrap();
        let mut results: Vec<VectorSearchResult> = points
            .iter()
            .filter(|(_, (_, chunk))| {
                let meta = &chunk.metadata;
                filters
                    .namespace
                    .as_ref()
                    .is_none_or(|ns| &meta.namespace == ns)
                    && filters
                        .chunk_type
                        .as_ref()
                        .is_none_or(|t| meta.chunk_type.as_str() == t.as_str())
                    && filters
                        .importance
                        .as_ref()
                        .is_none_or(|i| meta.importance.as_str() == i.as_str())
                    && filters
                        .class_name
                        .as_ref()
                        .is_none_or(|c| meta.class_name.as_deref() == Some(c.as_str()))
                    && filters
                        .method_name
                        .as_ref()
                        .is_none_or(|m| meta.method_name.as_deref() == Some(m.as_str()))
                    && (filters.any_tags.is_empty()
                        || filters.any_tags.iter().any(|t| meta.tags.contains(t)))
            })
            .map(|(id, (vector, chunk))| VectorSearchResult {
                chunk: chunk.clone(),
                similarity: cosine(&query_vector, vector),
                vector_id: id.clone(),
            })
            .filter(|r| r.similarity >= score_threshold)
            .collect();

        results.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(limit);
        Ok(results)
    }

    async fn delete_by_chunk_ids(&self, chunk_ids: &[String]) -> Result<(), VectorDbError> {
        self.points
            .lock()
            .unwrap()
            .retain(|_, (_, chunk)| !chunk_ids.contains(&chunk.id));
        Ok(())
    }

    async fn get_stats(&self) -> Result<VectorStoreStats, VectorDbError> {
        Ok(VectorStoreStats {
            points: self.points.lock().unwrap().len(),
            collection_name: "memory".to_string(),
            dimension: DIM,
        })
    }
}

fn method_item(
    namespace: &str,
    class: &str,
    method: &str,
    description: &str,
    tags: &[&str],
) -> ParsedContent {
    ParsedContent {
        content_type: ChunkType::Method,
        name: format!("{}.{}", class, method),
        description: description.to_string(),
        content: String::new(),
        examples: Vec::new(),
        parameters: Vec::new(),
        returns: None,
        metadata: ContentMetadata {
            namespace: namespace.to_string(),
            source_file: format!("{}.json", namespace),
            importance: Importance::High,
            tags: tags.iter().map(|t| t.to_string()).collect(),
            class_name: Some(class.to_string()),
            line_number: None,
        },
    }
}

/// The three-item sample corpus from the retrieval scenarios
fn sample_corpus() -> ParsedCorpus {
    ParsedCorpus {
        items: vec![
            method_item(
                "core",
                "Endpoint",
                "connect",
                "Connect to the backend bridge over an encrypted websocket channel.",
                &["connection", "lang:typescript"],
            ),
            method_item(
                "core",
                "Endpoint",
                "setup",
                "Prepare platform resources and certificates before any call.",
                &["setup", "lang:typescript"],
            ),
            method_item(
                "threads",
                "ThreadApi",
                "createThread",
                "Create a new message thread for a group of users.",
                &["threads", "lang:java"],
            ),
        ],
        errors: Vec::new(),
    }
}

fn test_config() -> Config {
    let mut config = Config::default();
    config.tracker.db_path = PathBuf::from(":memory:");
    config.chunking.max_chunk_size = 1500;
    // the scenario counts raw method chunks; keep them unmerged
    config.optimizer.merge_related = false;
    config.embedding.batch_size = 1;
    config
}

async fn pipeline_with(
    provider: Arc<dyn EmbeddingProvider>,
    config: Config,
) -> (DocsRagPipeline, Arc<MemoryVectorStore>) {
    let store = Arc::new(MemoryVectorStore::default());
    let pipeline = DocsRagPipeline::init_with(config, provider, store.clone())
        .await
        .unwrap();
    (pipeline, store)
}

#[tokio::test]
async fn test_full_index_run() {
    let (pipeline, store) = pipeline_with(Arc::new(BagOfWordsProvider), test_config()).await;

    let report = pipeline
        .index_corpus(sample_corpus(), &CancellationToken::new())
        .await
        .unwrap();

    // method-level chunking yields exactly one chunk per item
    assert_eq!(report.chunks_built, 3);
    assert_eq!(report.chunks_optimized, 3);
    assert_eq!(report.sync.new, 3);
    assert_eq!(report.sync.updated, 0);
    assert_eq!(report.embedded, 3);
    assert_eq!(report.embedding_failures, 0);
    assert_eq!(report.points_upserted, 3);
    assert!(report.parse_errors.is_empty());

    assert_eq!(store.get_stats().await.unwrap().points, 3);
}

#[tokio::test]
async fn test_resync_after_edit_updates_exactly_one() {
    let (pipeline, _store) = pipeline_with(Arc::new(BagOfWordsProvider), test_config()).await;
    let cancel = CancellationToken::new();

    pipeline
        .index_corpus(sample_corpus(), &cancel)
        .await
        .unwrap();

    // unchanged corpus: nothing to re-embed
    let unchanged = pipeline
        .index_corpus(sample_corpus(), &cancel)
        .await
        .unwrap();
    assert_eq!(unchanged.sync.new, 0);
    assert_eq!(unchanged.sync.updated, 0);
    assert_eq!(unchanged.sync.unchanged, 3);
    assert_eq!(unchanged.embedded, 0);

    // edit one description: exactly that chunk goes through again
    let mut edited = sample_corpus();
    edited.items[2].description =
        "Create a new message thread with custom moderation policies.".to_string();
    let report = pipeline.index_corpus(edited, &cancel).await.unwrap();
    assert_eq!(report.sync.new, 0);
    assert_eq!(report.sync.updated, 1);
    assert_eq!(report.sync.unchanged, 2);
    assert_eq!(report.sync.removed, 0);
    assert_eq!(report.embedded, 1);
}

#[tokio::test]
async fn test_removed_chunks_leave_vector_store() {
    let (pipeline, store) = pipeline_with(Arc::new(BagOfWordsProvider), test_config()).await;
    let cancel = CancellationToken::new();

    pipeline
        .index_corpus(sample_corpus(), &cancel)
        .await
        .unwrap();

    let mut shrunk = sample_corpus();
    shrunk.items.truncate(2);
    let report = pipeline.index_corpus(shrunk, &cancel).await.unwrap();
    assert_eq!(report.sync.removed, 1);
    assert_eq!(store.get_stats().await.unwrap().points, 2);
}

#[tokio::test]
async fn test_lexical_ranks_connect_first() {
    let (pipeline, _store) = pipeline_with(Arc::new(BagOfWordsProvider), test_config()).await;
    pipeline
        .index_corpus(sample_corpus(), &CancellationToken::new())
        .await
        .unwrap();

    let results = pipeline.search_lexical("connect to backend", None).unwrap();
    assert!(!results.is_empty());
    assert_eq!(results[0].chunk_id, "method:core:endpoint.connect");
}

#[tokio::test]
async fn test_lexical_keyword_backend_and_language_filter() {
    let mut config = test_config();
    config.lexical.backend = "keyword".to_string();
    let (pipeline, _store) = pipeline_with(Arc::new(BagOfWordsProvider), config).await;
    pipeline
        .index_corpus(sample_corpus(), &CancellationToken::new())
        .await
        .unwrap();

    // javascript is compatible with the typescript-tagged chunks
    let results = pipeline
        .search_lexical("connect backend", Some("javascript"))
        .unwrap();
    assert_eq!(results[0].chunk_id, "method:core:endpoint.connect");

    // kotlin is not; the typescript hits are filtered out
    let filtered = pipeline
        .search_lexical("connect backend", Some("kotlin"))
        .unwrap();
    assert!(filtered.is_empty());
}

#[tokio::test]
async fn test_semantic_search_with_filters() {
    let (pipeline, _store) = pipeline_with(Arc::new(BagOfWordsProvider), test_config()).await;
    pipeline
        .index_corpus(sample_corpus(), &CancellationToken::new())
        .await
        .unwrap();

    let results = pipeline
        .search_semantic(
            "connect to the backend bridge",
            &SearchFilters::default(),
            5,
            None,
        )
        .await
        .unwrap();
    assert!(!results.is_empty());
    assert_eq!(results[0].chunk.id, "method:core:endpoint.connect");

    let threads_only = pipeline
        .search_semantic(
            "create a thread",
            &SearchFilters {
                namespace: Some("threads".to_string()),
                ..Default::default()
            },
            5,
            None,
        )
        .await
        .unwrap();
    assert_eq!(threads_only.len(), 1);
    assert_eq!(threads_only[0].chunk.metadata.namespace, "threads");
}

#[tokio::test]
async fn test_hybrid_search_fuses_paths() {
    let (pipeline, _store) = pipeline_with(Arc::new(BagOfWordsProvider), test_config()).await;
    pipeline
        .index_corpus(sample_corpus(), &CancellationToken::new())
        .await
        .unwrap();

    let results = pipeline
        .search_hybrid("connect to the backend bridge", 5)
        .await
        .unwrap();
    assert!(!results.is_empty());
    assert_eq!(results[0].chunk_id, "method:core:endpoint.connect");
}

#[tokio::test]
async fn test_failed_embedding_marked_and_retryable() {
    let provider = Arc::new(FailingProvider {
        marker: "ThreadApi",
    });
    let (pipeline, _store) = pipeline_with(provider, test_config()).await;

    let report = pipeline
        .index_corpus(sample_corpus(), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(report.embedded, 2);
    assert_eq!(report.embedding_failures, 1);

    let record = pipeline
        .tracker()
        .get_record("method:threads:threadapi.createthread")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.status, EmbeddingStatus::Failed);
    assert!(record.error_message.is_some());

    // the sweep flips exactly the failed record back to pending
    let reset = pipeline.retry_failed().await.unwrap();
    assert_eq!(reset, 1);
    let record = pipeline
        .tracker()
        .get_record("method:threads:threadapi.createthread")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.status, EmbeddingStatus::Pending);

    let completed = pipeline
        .tracker()
        .get_record("method:core:endpoint.connect")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(completed.status, EmbeddingStatus::Completed);
}

#[tokio::test]
async fn test_stats_and_export() {
    let dir = tempfile::tempdir().unwrap();
    let (pipeline, _store) = pipeline_with(Arc::new(BagOfWordsProvider), test_config()).await;
    pipeline
        .index_corpus(sample_corpus(), &CancellationToken::new())
        .await
        .unwrap();

    let stats = pipeline.stats().await.unwrap();
    assert_eq!(stats.tracking.total, 3);
    assert_eq!(stats.lexical_documents, 3);
    assert_eq!(stats.lexical_namespaces, 2);
    assert_eq!(stats.vector_points, Some(3));

    let snapshot = dir.path().join("dump.json");
    pipeline.export(&snapshot).await.unwrap();
    let raw = std::fs::read_to_string(&snapshot).unwrap();
    assert!(raw.contains("method:core:endpoint.connect"));
}
