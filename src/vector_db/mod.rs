//! Vector store abstraction.
//!
//! The pipeline talks to durable vector storage through the
//! [`VectorDatabase`] trait; the Qdrant adapter is the production
//! implementation. Similarity metric and dimensionality are
//! configuration, never logic.

pub mod qdrant;

pub use qdrant::QdrantVectorStore;

use crate::embedding::ChunkEmbedding;
use crate::error::VectorDbError;
use crate::types::{DocumentChunk, VectorSearchResult};

/// Conjunction of exact-match filters plus an any-of tag filter.
/// Empty fields do not constrain the search.
#[derive(Debug, Clone, Default)]
pub struct SearchFilters {
    pub namespace: Option<String>,
    pub chunk_type: Option<String>,
    pub importance: Option<String>,
    pub class_name: Option<String>,
    pub method_name: Option<String>,
    /// Matches points carrying at least one of these tags
    pub any_tags: Vec<String>,
}

impl SearchFilters {
    pub fn is_empty(&self) -> bool {
        self.namespace.is_none()
            && self.chunk_type.is_none()
            && self.importance.is_none()
            && self.class_name.is_none()
            && self.method_name.is_none()
            && self.any_tags.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct VectorStoreStats {
    pub points: usize,
    pub collection_name: String,
    pub dimension: usize,
}

/// Trait for vector store operations
#[async_trait::async_trait]
pub trait VectorDatabase: Send + Sync {
    /// Create the backing collection if absent; reuse it otherwise.
    /// Returns the number of points already stored. Fails fast with
    /// [`VectorDbError::Unavailable`] when the store is unreachable.
    async fn initialize(&self) -> Result<usize, VectorDbError>;

    /// Store chunk embeddings in batches. Each point gets a freshly
    /// generated surface id and carries the stable chunk id in its
    /// payload; retries are idempotent by point id.
    async fn upsert_chunks(
        &self,
        chunks: &[DocumentChunk],
        embeddings: &[ChunkEmbedding],
    ) -> Result<usize, VectorDbError>;

    /// Nearest-neighbor search, filtered by metadata conjunction
    async fn search(
        &self,
        query_vector: Vec<f32>,
        filters: &SearchFilters,
        limit: usize,
        score_threshold: f32,
    ) -> Result<Vec<VectorSearchResult>, VectorDbError>;

    /// Delete every point belonging to the given chunk ids
    async fn delete_by_chunk_ids(&self, chunk_ids: &[String]) -> Result<(), VectorDbError>;

    /// Get statistics
    async fn get_stats(&self) -> Result<VectorStoreStats, VectorDbError>;
}
