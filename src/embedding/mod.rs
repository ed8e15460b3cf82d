//! Embedding generation.
//!
//! The [`EmbeddingProvider`] trait is the only contract the rest of the
//! pipeline sees: a batch of texts in, vectors out, with a model name and
//! dimension. The [`EmbeddingGenerator`] layers batching, bounded
//! concurrency, timeouts, and per-chunk success/failure bookkeeping on
//! top, so a batch-level provider failure never aborts the whole run.

mod fastembed_manager;

pub use fastembed_manager::FastEmbedManager;

use crate::config::EmbeddingConfig;
use crate::error::EmbeddingError;
use crate::types::DocumentChunk;
use futures::StreamExt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Approximate chars-per-token ratio used for usage accounting when the
/// provider does not report token counts itself
pub const CHARS_PER_TOKEN: usize = 4;

/// Trait for embedding generation
pub trait EmbeddingProvider: Send + Sync {
    /// Generate embeddings for a batch of text
    fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    /// Get the dimension of the embeddings
    fn dimension(&self) -> usize;

    /// Get the model name
    fn model_name(&self) -> &str;
}

/// One successful chunk embedding with its audit trail
#[derive(Debug, Clone)]
pub struct ChunkEmbedding {
    pub chunk_id: String,
    /// Freshly generated surface id; doubles as the vector store point id
    pub embedding_id: String,
    pub vector: Vec<f32>,
    pub model: String,
    pub tokens: u32,
    pub generated_at: i64,
}

/// Outcome of one embedding sweep: per-chunk successes and failures
#[derive(Debug, Default)]
pub struct EmbeddingRun {
    pub completed: Vec<ChunkEmbedding>,
    pub failed: Vec<(String, String)>,
}

pub struct EmbeddingGenerator {
    provider: Arc<dyn EmbeddingProvider>,
    batch_size: usize,
    concurrency: usize,
    timeout_secs: u64,
}

impl EmbeddingGenerator {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, config: &EmbeddingConfig) -> Self {
        Self {
            provider,
            batch_size: config.batch_size,
            concurrency: config.concurrency,
            timeout_secs: config.timeout_secs,
        }
    }

    pub fn provider(&self) -> Arc<dyn EmbeddingProvider> {
        self.provider.clone()
    }

    /// Embed a chunk set in batches, multiple batches in flight.
    ///
    /// Cancellation stops issuing further batches; in-flight batches
    /// complete and land in the outcome. Chunks from batches never issued
    /// appear in neither list and simply stay pending in the tracker.
    pub async fn embed_chunks(
        &self,
        chunks: &[DocumentChunk],
        cancel: &CancellationToken,
    ) -> EmbeddingRun {
        if chunks.is_empty() {
            return EmbeddingRun::default();
        }

        let batches: Vec<Vec<(String, String)>> = chunks
            .chunks(self.batch_size)
            .map(|batch| {
                batch
                    .iter()
                    .map(|c| (c.id.clone(), c.content.clone()))
                    .collect()
            })
            .collect();
        let total_batches = batches.len();

        tracing::info!(
            "Embedding {} chunks in {} batches (concurrency {})",
            chunks.len(),
            total_batches,
            self.concurrency
        );

        let outcomes: Vec<EmbeddingRun> = futures::stream::iter(batches)
            .take_while(|_| futures::future::ready(!cancel.is_cancelled()))
            .map(|batch| self.run_batch(batch))
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut run = EmbeddingRun::default();
        for outcome in outcomes {
            run.completed.extend(outcome.completed);
            run.failed.extend(outcome.failed);
        }

        if cancel.is_cancelled() {
            tracing::warn!(
                "Embedding sweep cancelled after {} completed, {} failed",
                run.completed.len(),
                run.failed.len()
            );
        }
        run
    }

    async fn run_batch(&self, batch: Vec<(String, String)>) -> EmbeddingRun {
        let texts: Vec<String> = batch.iter().map(|(_, text)| text.clone()).collect();
        let provider = self.provider.clone();

        let embed_future = tokio::task::spawn_blocking(move || provider.embed_batch(texts));
        let result = tokio::time::timeout(
            std::time::Duration::from_secs(self.timeout_secs),
            embed_future,
        )
        .await;

        let vectors = match result {
            Ok(Ok(Ok(vectors))) if vectors.len() == batch.len() => vectors,
            Ok(Ok(Ok(vectors))) => {
                let batch_len = batch.len();
                return self.fail_batch(
                    batch,
                    &format!(
                        "provider returned {} vectors for {} texts",
                        vectors.len(),
                        batch_len
                    ),
                );
            }
            Ok(Ok(Err(e))) => return self.fail_batch(batch, &e.to_string()),
            Ok(Err(join_err)) => {
                return self.fail_batch(batch, &format!("embedding task panicked: {}", join_err));
            }
            Err(_) => {
                return self.fail_batch(
                    batch,
                    &EmbeddingError::Timeout(self.timeout_secs).to_string(),
                );
            }
        };

        let now = chrono::Utc::now().timestamp();
        let model = self.provider.model_name().to_string();

        EmbeddingRun {
            completed: batch
                .into_iter()
                .zip(vectors)
                .map(|((chunk_id, text), vector)| ChunkEmbedding {
                    chunk_id,
                    embedding_id: uuid::Uuid::new_v4().to_string(),
                    vector,
                    model: model.clone(),
                    tokens: (text.len() / CHARS_PER_TOKEN) as u32,
                    generated_at: now,
                })
                .collect(),
            failed: Vec::new(),
        }
    }

    /// Decompose a batch-level failure into per-chunk failures
    fn fail_batch(&self, batch: Vec<(String, String)>, reason: &str) -> EmbeddingRun {
        tracing::warn!("Embedding batch of {} failed: {}", batch.len(), reason);
        EmbeddingRun {
            completed: Vec::new(),
            failed: batch
                .into_iter()
                .map(|(chunk_id, _)| (chunk_id, reason.to_string()))
                .collect(),
        }
    }

    /// Embed a single query text for search-time use
    pub async fn embed_query(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if text.trim().is_empty() {
            return Err(EmbeddingError::EmptyBatch);
        }

        let provider = self.provider.clone();
        let owned = text.to_string();
        let embed_future = tokio::task::spawn_blocking(move || provider.embed_batch(vec![owned]));

        let vectors = tokio::time::timeout(
            std::time::Duration::from_secs(self.timeout_secs),
            embed_future,
        )
        .await
        .map_err(|_| EmbeddingError::Timeout(self.timeout_secs))?
        .map_err(|e| EmbeddingError::GenerationFailed(format!("task panicked: {}", e)))??;

        vectors
            .into_iter()
            .next()
            .ok_or_else(|| EmbeddingError::GenerationFailed("empty response".to_string()))
    }
}
