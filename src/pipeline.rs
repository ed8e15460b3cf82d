//! Pipeline orchestration.
//!
//! An explicitly constructed object owns every stage: parser, builder,
//! enhancer, optimizer, tracker, embedding generator, vector store, and
//! lexical engine. The caller controls its lifecycle (`init`/`shutdown`);
//! there is no process-wide singleton anywhere. Collaborators are
//! injected, so tests swap the embedding provider and vector store for
//! in-memory fakes.

use crate::chunker::{ChunkBuilder, validate_chunks};
use crate::config::Config;
use crate::embedding::{EmbeddingGenerator, EmbeddingProvider, FastEmbedManager};
use crate::enhancer::ChunkEnhancer;
use crate::error::DocsRagError;
use crate::lexical::{LexicalSearchEngine, LexicalSearchResult, reciprocal_rank_fusion};
use crate::optimizer::ChunkOptimizer;
use crate::parser::{ContentParser, ParsedCorpus};
use crate::tracker::{EmbeddingTracker, TrackingStats};
use crate::types::{DocumentChunk, SyncSummary, VectorSearchResult};
use crate::vector_db::{QdrantVectorStore, SearchFilters, VectorDatabase, VectorStoreStats};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, RwLock};
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// Operator-facing summary of one indexing run
#[derive(Debug, Serialize)]
pub struct IndexReport {
    pub documents_parsed: usize,
    pub parse_errors: Vec<String>,
    pub chunks_built: usize,
    pub chunks_optimized: usize,
    pub validation_warnings: Vec<String>,
    pub sync: SyncSummary,
    pub embedded: usize,
    pub embedding_failures: usize,
    pub points_upserted: usize,
    pub duration_ms: u64,
}

/// One fused hybrid search hit
#[derive(Debug, Clone, Serialize)]
pub struct HybridSearchResult {
    pub chunk_id: String,
    pub score: f32,
}

#[derive(Debug, Serialize)]
pub struct PipelineStats {
    pub tracking: TrackingStats,
    pub lexical_documents: usize,
    pub lexical_namespaces: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vector_points: Option<usize>,
}

pub struct DocsRagPipeline {
    config: Config,
    builder: ChunkBuilder,
    enhancer: ChunkEnhancer,
    optimizer: ChunkOptimizer,
    tracker: EmbeddingTracker,
    generator: EmbeddingGenerator,
    vector_db: Arc<dyn VectorDatabase>,
    lexical: RwLock<LexicalSearchEngine>,
}

impl DocsRagPipeline {
    /// Construct the production pipeline: FastEmbed provider, Qdrant
    /// store, SQLite tracker at the configured path
    pub async fn init(config: Config) -> Result<Self, DocsRagError> {
        let provider: Arc<dyn EmbeddingProvider> =
            Arc::new(FastEmbedManager::new(&config.embedding.model_name)?);
        let vector_db: Arc<dyn VectorDatabase> =
            Arc::new(QdrantVectorStore::new(&config.vector_db)?);
        Self::init_with(config, provider, vector_db).await
    }

    /// Construct with injected collaborators
    pub async fn init_with(
        config: Config,
        provider: Arc<dyn EmbeddingProvider>,
        vector_db: Arc<dyn VectorDatabase>,
    ) -> Result<Self, DocsRagError> {
        config.validate()?;

        let tracker = EmbeddingTracker::open(&config.tracker.db_path).await?;
        let lexical = LexicalSearchEngine::new(&config.lexical)?;

        Ok(Self {
            builder: ChunkBuilder::new(),
            enhancer: ChunkEnhancer::new(),
            optimizer: ChunkOptimizer::new(config.optimizer.clone(), &config.chunking),
            generator: EmbeddingGenerator::new(provider, &config.embedding),
            tracker,
            vector_db,
            lexical: RwLock::new(lexical),
            config,
        })
    }

    /// Walk a documentation directory and run the full indexing pass
    pub async fn index_directory(
        &self,
        dir: &Path,
        cancel: &CancellationToken,
    ) -> Result<IndexReport, DocsRagError> {
        let corpus = ContentParser::new().parse_dir(dir);
        self.index_corpus(corpus, cancel).await
    }

    /// Full pipeline over already-parsed content:
    /// build -> enhance -> optimize -> lexical rebuild -> sync ->
    /// embed pending -> tracker bookkeeping -> vector upsert
    pub async fn index_corpus(
        &self,
        corpus: ParsedCorpus,
        cancel: &CancellationToken,
    ) -> Result<IndexReport, DocsRagError> {
        let start = Instant::now();
        let documents_parsed = corpus.items.len();
        let parse_errors: Vec<String> = corpus.errors.iter().map(|e| e.to_string()).collect();

        let mut chunks = self
            .builder
            .build(&corpus.items, &self.config.chunking.strategy)?;
        let chunks_built = chunks.len();

        self.enhancer.enhance(&mut chunks);
        let chunks = self.optimizer.optimize(chunks);

        let validation_warnings: Vec<String> =
            validate_chunks(&chunks, self.config.chunking.max_chunk_size)
                .iter()
                .map(|w| w.to_string())
                .collect();
        for warning in &validation_warnings {
            tracing::warn!("Validation: {}", warning);
        }

        self.rebuild_lexical(&chunks)?;

        let sync_result = self.tracker.sync(&chunks).await?;
        let sync = sync_result.summary();
        tracing::info!("Sync summary: {}", sync);

        let pending: Vec<DocumentChunk> = sync_result.pending_chunks().cloned().collect();

        if !pending.is_empty() || !sync_result.removed_ids.is_empty() {
            // fail fast before spending embedding work on an unreachable store
            self.vector_db.initialize().await?;
        }

        let run = self.generator.embed_chunks(&pending, cancel).await;

        for embedding in &run.completed {
            self.tracker
                .mark_embedding_completed(
                    &embedding.chunk_id,
                    &embedding.embedding_id,
                    &embedding.model,
                    embedding.tokens,
                    embedding.vector.len() as u32,
                )
                .await?;
        }
        for (chunk_id, reason) in &run.failed {
            self.tracker.mark_embedding_failed(chunk_id, reason).await?;
        }
        if !run.failed.is_empty() {
            tracing::warn!(
                "{} embeddings failed; run retry-failed to sweep them again",
                run.failed.len()
            );
        }

        let points_upserted = if run.completed.is_empty() {
            0
        } else {
            // updated chunks get fresh surface ids; drop their old points
            // so the store never holds two vectors for one chunk id
            let updated_ids: Vec<String> = sync_result
                .updated_chunks
                .iter()
                .map(|c| c.id.clone())
                .collect();
            if !updated_ids.is_empty() {
                self.vector_db.delete_by_chunk_ids(&updated_ids).await?;
            }
            self.vector_db.upsert_chunks(&pending, &run.completed).await?
        };

        if !sync_result.removed_ids.is_empty() {
            self.vector_db
                .delete_by_chunk_ids(&sync_result.removed_ids)
                .await?;
        }

        Ok(IndexReport {
            documents_parsed,
            parse_errors,
            chunks_built,
            chunks_optimized: chunks.len(),
            validation_warnings,
            sync,
            embedded: run.completed.len(),
            embedding_failures: run.failed.len(),
            points_upserted,
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }

    fn rebuild_lexical(&self, chunks: &[DocumentChunk]) -> Result<(), DocsRagError> {
        let mut by_namespace: BTreeMap<&str, Vec<DocumentChunk>> = BTreeMap::new();
        for chunk in chunks {
            by_namespace
                .entry(chunk.metadata.namespace.as_str())
                .or_default()
                .push(chunk.clone());
        }

        let mut lexical = self
            .lexical
            .write()
            .map_err(|e| DocsRagError::other(format!("lexical lock poisoned: {}", e)))?;
        lexical.clear()?;
        for (namespace, group) in by_namespace {
            lexical.add_namespace(namespace, &group)?;
        }
        lexical.build_indices()?;
        Ok(())
    }

    /// Semantic search through the vector store
    pub async fn search_semantic(
        &self,
        query: &str,
        filters: &SearchFilters,
        limit: usize,
        score_threshold: Option<f32>,
    ) -> Result<Vec<VectorSearchResult>, DocsRagError> {
        let vector = self.generator.embed_query(query).await?;
        let threshold = score_threshold.unwrap_or(self.config.vector_db.score_threshold);
        let results = self
            .vector_db
            .search(vector, filters, limit, threshold)
            .await?;
        Ok(results)
    }

    /// Lexical search through the in-memory index
    pub fn search_lexical(
        &self,
        query: &str,
        language: Option<&str>,
    ) -> Result<Vec<LexicalSearchResult>, DocsRagError> {
        let lexical = self
            .lexical
            .read()
            .map_err(|e| DocsRagError::other(format!("lexical lock poisoned: {}", e)))?;
        Ok(lexical.search(query, language)?)
    }

    /// Reciprocal-rank fusion of semantic and lexical hits
    pub async fn search_hybrid(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<HybridSearchResult>, DocsRagError> {
        let semantic = self
            .search_semantic(query, &SearchFilters::default(), limit, None)
            .await?;
        let lexical = self.search_lexical(query, None)?;

        let semantic_ranked: Vec<(String, f32)> = semantic
            .into_iter()
            .map(|r| (r.chunk.id, r.similarity))
            .collect();
        let lexical_ranked: Vec<(String, f32)> = lexical
            .into_iter()
            .map(|r| (r.chunk_id, r.score))
            .collect();

        let fused = reciprocal_rank_fusion(vec![semantic_ranked, lexical_ranked], limit);
        Ok(fused
            .into_iter()
            .map(|(chunk_id, score)| HybridSearchResult { chunk_id, score })
            .collect())
    }

    /// failed -> pending sweep; returns how many records were reset
    pub async fn retry_failed(&self) -> Result<u64, DocsRagError> {
        Ok(self.tracker.reset_failed_embeddings().await?)
    }

    /// Hard-delete outdated tracking records
    pub async fn cleanup(&self) -> Result<u64, DocsRagError> {
        Ok(self.tracker.cleanup_outdated_records().await?)
    }

    /// Write the full tracking-state snapshot to a file
    pub async fn export(&self, path: &Path) -> Result<(), DocsRagError> {
        Ok(self.tracker.export_snapshot(path).await?)
    }

    pub async fn stats(&self) -> Result<PipelineStats, DocsRagError> {
        let tracking = self.tracker.get_statistics().await?;
        let (lexical_documents, lexical_namespaces) = {
            let lexical = self
                .lexical
                .read()
                .map_err(|e| DocsRagError::other(format!("lexical lock poisoned: {}", e)))?;
            let stats = lexical.get_stats();
            (stats.documents, stats.namespaces)
        };

        let vector_points = match self.vector_db.get_stats().await {
            Ok(VectorStoreStats { points, .. }) => Some(points),
            Err(e) => {
                tracing::warn!("Vector store stats unavailable: {}", e);
                None
            }
        };

        Ok(PipelineStats {
            tracking,
            lexical_documents,
            lexical_namespaces,
            vector_points,
        })
    }

    pub fn tracker(&self) -> &EmbeddingTracker {
        &self.tracker
    }

    /// Release the tracker's store connection
    pub async fn shutdown(self) {
        self.tracker.close().await;
    }
}
