/// Centralized error types for docs-rag using thiserror
///
/// Provides domain-specific error types for better error handling and
/// user-facing messages.
use thiserror::Error;

/// Main error type for the indexing pipeline
#[derive(Error, Debug)]
pub enum DocsRagError {
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Chunking error: {0}")]
    Chunk(#[from] ChunkError),

    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Vector store error: {0}")]
    VectorDb(#[from] VectorDbError),

    #[error("Tracking store error: {0}")]
    Tracker(#[from] TrackerError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Sync(#[from] SyncConsistencyError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

/// Errors raised while parsing specification or prose inputs.
///
/// Parse errors are fatal for the offending document only: the corpus run
/// skips the document, logs the error, and continues.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("Malformed JSON in '{file}': {reason}")]
    MalformedJson { file: String, reason: String },

    #[error("Missing required field '{field}' in '{file}'")]
    MissingField { file: String, field: String },

    #[error("Unterminated front matter in '{0}'")]
    UnterminatedFrontMatter(String),

    #[error("Document is empty: {0}")]
    EmptyDocument(String),

    #[error("Unsupported input format: {0}")]
    UnsupportedFormat(String),
}

/// Errors related to chunk construction
#[derive(Error, Debug)]
pub enum ChunkError {
    #[error("Unknown chunking strategy: {0}")]
    UnknownStrategy(String),

    #[error("No chunks produced from {0} parsed items")]
    NoChunksProduced(usize),
}

/// Errors related to embedding generation
#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("Failed to initialize embedding model: {0}")]
    InitializationFailed(String),

    #[error("Failed to generate embeddings: {0}")]
    GenerationFailed(String),

    #[error("Embedding batch is empty")]
    EmptyBatch,

    #[error("Embedding generation timed out after {0} seconds")]
    Timeout(u64),

    #[error("Invalid embedding dimension: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Errors related to the vector store
#[derive(Error, Debug)]
pub enum VectorDbError {
    /// Backing store unreachable. Fatal for the run, never silently skipped.
    #[error("Vector store unreachable: {0}")]
    Unavailable(String),

    #[error("Failed to create collection '{collection}': {reason}")]
    CollectionCreationFailed { collection: String, reason: String },

    #[error("Failed to store points: {0}")]
    StoreFailed(String),

    #[error("Failed to search points: {0}")]
    SearchFailed(String),

    #[error("Failed to delete points: {0}")]
    DeleteFailed(String),

    #[error("Failed to get statistics: {0}")]
    StatisticsFailed(String),
}

/// Errors related to the persistent tracking ledger
#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("Failed to open tracking store at '{path}': {reason}")]
    OpenFailed { path: String, reason: String },

    #[error("Tracking store migration failed: {0}")]
    MigrationFailed(String),

    #[error("Tracking store query failed: {0}")]
    QueryFailed(String),

    #[error("Tracked record not found for chunk '{0}'")]
    RecordNotFound(String),

    #[error("Failed to export tracking snapshot to '{path}': {reason}")]
    ExportFailed { path: String, reason: String },
}

impl From<sqlx::Error> for TrackerError {
    fn from(err: sqlx::Error) -> Self {
        TrackerError::QueryFailed(err.to_string())
    }
}

/// Errors related to configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration file: {0}")]
    LoadFailed(String),

    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),

    #[error("Invalid configuration value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },
}

/// A chunk id classified into more than one sync partition.
///
/// This is unreachable by construction and indicates a programming error
/// (most plausibly duplicate chunk ids in the incoming set), not a
/// recoverable runtime condition.
#[derive(Error, Debug)]
#[error("Sync consistency violated: chunk id '{chunk_id}' classified more than once")]
pub struct SyncConsistencyError {
    pub chunk_id: String,
}

impl From<anyhow::Error> for DocsRagError {
    fn from(err: anyhow::Error) -> Self {
        DocsRagError::Other(format!("{:#}", err))
    }
}

impl DocsRagError {
    /// Create a new error from a string message
    pub fn other(msg: impl Into<String>) -> Self {
        DocsRagError::Other(msg.into())
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DocsRagError::VectorDb(VectorDbError::Unavailable(_))
                | DocsRagError::Embedding(EmbeddingError::Timeout(_))
                | DocsRagError::Embedding(EmbeddingError::GenerationFailed(_))
                | DocsRagError::Io(_)
        )
    }
}
