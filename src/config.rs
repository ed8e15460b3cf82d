/// Configuration system for docs-rag
///
/// Supports loading from multiple sources with priority:
/// Environment variables > Config file > Defaults
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Chunk construction configuration
    #[serde(default)]
    pub chunking: ChunkingConfig,

    /// Optimizer pass toggles
    #[serde(default)]
    pub optimizer: OptimizerConfig,

    /// Embedding model configuration
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Vector store configuration
    #[serde(default)]
    pub vector_db: VectorDbConfig,

    /// Embedding tracking ledger configuration
    #[serde(default)]
    pub tracker: TrackerConfig,

    /// Lexical search configuration
    #[serde(default)]
    pub lexical: LexicalConfig,
}

/// Chunk construction configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Strategy name: "method-level", "context-aware", "hierarchical", "hybrid"
    #[serde(default = "default_strategy")]
    pub strategy: String,

    /// Maximum rendered chunk length in characters
    #[serde(default = "default_max_chunk_size")]
    pub max_chunk_size: usize,

    /// Overlap carried across split boundaries, in characters
    #[serde(default = "default_overlap_size")]
    pub overlap_size: usize,
}

/// Per-pass toggles for the corpus-wide optimizer.
///
/// Pass order is fixed (dedup, split, merge, quality, sort) because later
/// passes assume earlier cleanup; toggles only skip individual passes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizerConfig {
    #[serde(default = "default_true")]
    pub deduplicate: bool,

    #[serde(default = "default_true")]
    pub split_oversized: bool,

    #[serde(default = "default_true")]
    pub merge_related: bool,

    #[serde(default = "default_true")]
    pub score_quality: bool,

    #[serde(default = "default_true")]
    pub priority_sort: bool,
}

/// Embedding model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Model name (e.g., "all-MiniLM-L6-v2", "bge-small-en-v1.5")
    #[serde(default = "default_model_name")]
    pub model_name: String,

    /// Number of chunks per provider call
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Maximum batches in flight simultaneously
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Timeout in seconds per embedding batch
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,
}

/// Vector store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorDbConfig {
    /// Qdrant server URL
    #[serde(default = "default_qdrant_url")]
    pub url: String,

    /// Collection name for chunk vectors
    #[serde(default = "default_collection_name")]
    pub collection_name: String,

    /// Vector dimensionality (must match the embedding model)
    #[serde(default = "default_dimension")]
    pub dimension: usize,

    /// Distance metric: "cosine", "dot", or "euclid"
    #[serde(default = "default_distance")]
    pub distance: String,

    /// Points per upsert request
    #[serde(default = "default_upsert_batch_size")]
    pub upsert_batch_size: usize,

    /// Default minimum similarity for search results
    #[serde(default = "default_score_threshold")]
    pub score_threshold: f32,
}

/// Tracking ledger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// SQLite database file path
    #[serde(default = "default_tracker_db_path")]
    pub db_path: PathBuf,
}

/// Lexical search configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LexicalConfig {
    /// Backend: "bm25" (tantivy) or "keyword" (postings-overlap fallback)
    #[serde(default = "default_lexical_backend")]
    pub backend: String,

    /// Maximum hits returned per query
    #[serde(default = "default_lexical_limit")]
    pub result_limit: usize,
}

// Default value functions

fn default_strategy() -> String {
    "method-level".to_string()
}

fn default_max_chunk_size() -> usize {
    1500
}

fn default_overlap_size() -> usize {
    200
}

fn default_true() -> bool {
    true
}

fn default_model_name() -> String {
    "all-MiniLM-L6-v2".to_string()
}

fn default_batch_size() -> usize {
    32
}

fn default_concurrency() -> usize {
    4
}

fn default_embedding_timeout() -> u64 {
    30
}

fn default_qdrant_url() -> String {
    "http://localhost:6334".to_string()
}

fn default_collection_name() -> String {
    "doc_chunks".to_string()
}

fn default_dimension() -> usize {
    384
}

fn default_distance() -> String {
    "cosine".to_string()
}

fn default_upsert_batch_size() -> usize {
    100
}

fn default_score_threshold() -> f32 {
    0.0
}

fn default_tracker_db_path() -> PathBuf {
    data_dir().join("tracking.db")
}

fn default_lexical_backend() -> String {
    "bm25".to_string()
}

fn default_lexical_limit() -> usize {
    10
}

/// Platform data directory for docs-rag state
pub fn data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("docs-rag")
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            strategy: default_strategy(),
            max_chunk_size: default_max_chunk_size(),
            overlap_size: default_overlap_size(),
        }
    }
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            deduplicate: true,
            split_oversized: true,
            merge_related: true,
            score_quality: true,
            priority_sort: true,
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model_name: default_model_name(),
            batch_size: default_batch_size(),
            concurrency: default_concurrency(),
            timeout_secs: default_embedding_timeout(),
        }
    }
}

impl Default for VectorDbConfig {
    fn default() -> Self {
        Self {
            url: default_qdrant_url(),
            collection_name: default_collection_name(),
            dimension: default_dimension(),
            distance: default_distance(),
            upsert_batch_size: default_upsert_batch_size(),
            score_threshold: default_score_threshold(),
        }
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            db_path: default_tracker_db_path(),
        }
    }
}

impl Default for LexicalConfig {
    fn default() -> Self {
        Self {
            backend: default_lexical_backend(),
            result_limit: default_lexical_limit(),
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::LoadFailed(format!("{}: {}", path.display(), e)))?;

        let mut config: Config = toml::from_str(&content)
            .map_err(|e| ConfigError::ParseFailed(format!("Invalid TOML: {}", e)))?;

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load from the given path, or from defaults when no file exists
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => Self::from_file(p),
            None => {
                tracing::debug!("No config file given, using defaults");
                let mut config = Self::default();
                config.apply_env_overrides();
                config.validate()?;
                Ok(config)
            }
        }
    }

    /// Apply environment variable overrides (highest priority)
    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("DOCS_RAG_QDRANT_URL") {
            self.vector_db.url = url;
        }
        if let Ok(name) = std::env::var("DOCS_RAG_COLLECTION") {
            self.vector_db.collection_name = name;
        }
        if let Ok(model) = std::env::var("DOCS_RAG_EMBEDDING_MODEL") {
            self.embedding.model_name = model;
        }
        if let Ok(backend) = std::env::var("DOCS_RAG_LEXICAL_BACKEND") {
            self.lexical.backend = backend;
        }
        if let Ok(path) = std::env::var("DOCS_RAG_TRACKER_DB") {
            self.tracker.db_path = PathBuf::from(path);
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunking.max_chunk_size == 0 {
            return Err(ConfigError::InvalidValue {
                key: "chunking.max_chunk_size".to_string(),
                reason: "must be greater than 0".to_string(),
            });
        }

        if self.chunking.overlap_size >= self.chunking.max_chunk_size {
            return Err(ConfigError::InvalidValue {
                key: "chunking.overlap_size".to_string(),
                reason: format!(
                    "must be smaller than max_chunk_size ({})",
                    self.chunking.max_chunk_size
                ),
            });
        }

        if self.embedding.batch_size == 0 {
            return Err(ConfigError::InvalidValue {
                key: "embedding.batch_size".to_string(),
                reason: "must be greater than 0".to_string(),
            });
        }

        if self.embedding.concurrency == 0 {
            return Err(ConfigError::InvalidValue {
                key: "embedding.concurrency".to_string(),
                reason: "must be greater than 0".to_string(),
            });
        }

        if !matches!(self.vector_db.distance.as_str(), "cosine" | "dot" | "euclid") {
            return Err(ConfigError::InvalidValue {
                key: "vector_db.distance".to_string(),
                reason: format!(
                    "must be 'cosine', 'dot', or 'euclid', got '{}'",
                    self.vector_db.distance
                ),
            });
        }

        if !matches!(self.lexical.backend.as_str(), "bm25" | "keyword") {
            return Err(ConfigError::InvalidValue {
                key: "lexical.backend".to_string(),
                reason: format!("must be 'bm25' or 'keyword', got '{}'", self.lexical.backend),
            });
        }

        if self.lexical.result_limit == 0 {
            return Err(ConfigError::InvalidValue {
                key: "lexical.result_limit".to_string(),
                reason: "must be greater than 0".to_string(),
            });
        }

        Ok(())
    }
}
