use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;

/// Kind of documentation unit a chunk is derived from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkType {
    Method,
    Class,
    Example,
    Tutorial,
    Troubleshooting,
}

impl ChunkType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkType::Method => "method",
            ChunkType::Class => "class",
            ChunkType::Example => "example",
            ChunkType::Tutorial => "tutorial",
            ChunkType::Troubleshooting => "troubleshooting",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "method" => Some(ChunkType::Method),
            "class" => Some(ChunkType::Class),
            "example" => Some(ChunkType::Example),
            "tutorial" => Some(ChunkType::Tutorial),
            "troubleshooting" => Some(ChunkType::Troubleshooting),
            _ => None,
        }
    }
}

/// Ordinal priority attached to a chunk. Total order: critical > high > medium > low.
///
/// Used for deduplication tie-breaking and final result ordering.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Importance {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl Importance {
    /// Numeric rank, higher = more important
    pub fn rank(&self) -> u8 {
        match self {
            Importance::Low => 0,
            Importance::Medium => 1,
            Importance::High => 2,
            Importance::Critical => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Importance::Low => "low",
            Importance::Medium => "medium",
            Importance::High => "high",
            Importance::Critical => "critical",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "low" => Some(Importance::Low),
            "medium" => Some(Importance::Medium),
            "high" => Some(Importance::High),
            "critical" => Some(Importance::Critical),
            _ => None,
        }
    }
}

/// One documented parameter of a method
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterDoc {
    pub name: String,
    /// Declared type, if the source documents one
    #[serde(default)]
    pub param_type: Option<String>,
    #[serde(default)]
    pub description: String,
}

/// Source-level metadata attached to a parsed documentation unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentMetadata {
    pub namespace: String,
    pub source_file: String,
    #[serde(default)]
    pub importance: Importance,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub class_name: Option<String>,
    #[serde(default)]
    pub line_number: Option<u32>,
}

/// One logical documentation unit (method, class, guide section) prior to chunking.
///
/// Produced by the parser, consumed once by the chunk builder. Immutable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedContent {
    pub content_type: ChunkType,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Free-form body text beyond the description
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub examples: Vec<String>,
    #[serde(default)]
    pub parameters: Vec<ParameterDoc>,
    #[serde(default)]
    pub returns: Option<String>,
    pub metadata: ContentMetadata,
}

/// Metadata carried by every retrievable chunk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub chunk_type: ChunkType,
    pub namespace: String,
    #[serde(default)]
    pub class_name: Option<String>,
    #[serde(default)]
    pub method_name: Option<String>,
    pub importance: Importance,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    pub source_file: String,
    #[serde(default)]
    pub line_number: Option<u32>,
    #[serde(default)]
    pub related_methods: Vec<String>,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub common_mistakes: Vec<String>,
    #[serde(default)]
    pub use_cases: Vec<String>,
}

/// The atomic retrievable unit: rendered text plus metadata, optionally embedded.
///
/// Chunks are value objects owned by whichever pipeline stage currently holds
/// them; they are never shared mutably. Invariants: `content` is non-empty and
/// `metadata.source_file` is always set (checked by the post-build validation
/// pass, not enforced by construction).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub id: String,
    pub content: String,
    pub metadata: ChunkMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl DocumentChunk {
    /// Content-derived digest used for change detection across indexing runs.
    ///
    /// Hashes exactly the fields whose change should invalidate an embedding:
    /// content, chunk type, namespace, class name, method name, source file,
    /// and line number. Unrelated metadata (tags, importance, cross-references)
    /// deliberately stays out so editing them never forces a re-embed.
    pub fn content_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.content.as_bytes());
        hasher.update([0x1f]);
        hasher.update(self.metadata.chunk_type.as_str().as_bytes());
        hasher.update([0x1f]);
        hasher.update(self.metadata.namespace.as_bytes());
        hasher.update([0x1f]);
        hasher.update(self.metadata.class_name.as_deref().unwrap_or("").as_bytes());
        hasher.update([0x1f]);
        hasher.update(
            self.metadata
                .method_name
                .as_deref()
                .unwrap_or("")
                .as_bytes(),
        );
        hasher.update([0x1f]);
        hasher.update(self.metadata.source_file.as_bytes());
        hasher.update([0x1f]);
        hasher.update(
            self.metadata
                .line_number
                .map(|n| n.to_string())
                .unwrap_or_default()
                .as_bytes(),
        );
        format!("{:x}", hasher.finalize())
    }
}

/// Lifecycle status of a tracked chunk embedding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingStatus {
    Pending,
    Completed,
    Failed,
    Outdated,
}

impl EmbeddingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmbeddingStatus::Pending => "pending",
            EmbeddingStatus::Completed => "completed",
            EmbeddingStatus::Failed => "failed",
            EmbeddingStatus::Outdated => "outdated",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(EmbeddingStatus::Pending),
            "completed" => Some(EmbeddingStatus::Completed),
            "failed" => Some(EmbeddingStatus::Failed),
            "outdated" => Some(EmbeddingStatus::Outdated),
            _ => None,
        }
    }
}

/// Persistent tracking row, keyed by unique chunk id
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingTrackingRecord {
    pub chunk_id: String,
    pub chunk_hash: String,
    pub embedding_id: Option<String>,
    pub model_name: Option<String>,
    pub tokens_used: Option<u32>,
    pub dimensions: Option<u32>,
    pub status: EmbeddingStatus,
    pub error_message: Option<String>,
    /// Denormalized for fast filtering without joins
    pub source_file: String,
    pub namespace: String,
    pub chunk_type: String,
    pub importance: String,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Result of reconciling a fresh chunk set against tracked state.
///
/// The partitions are disjoint: every incoming chunk id lands in exactly one
/// of new/updated/unchanged, and every removed id was previously tracked but
/// is absent from the new snapshot.
#[derive(Debug, Clone, Default)]
pub struct SyncResult {
    /// Never seen before, or tracked but still awaiting embedding work
    pub new_chunks: Vec<DocumentChunk>,
    /// Content hash changed since the last run
    pub updated_chunks: Vec<DocumentChunk>,
    pub unchanged_ids: Vec<String>,
    pub removed_ids: Vec<String>,
}

impl SyncResult {
    pub fn summary(&self) -> SyncSummary {
        SyncSummary {
            new: self.new_chunks.len(),
            updated: self.updated_chunks.len(),
            unchanged: self.unchanged_ids.len(),
            removed: self.removed_ids.len(),
        }
    }

    /// Chunks that still need embedding work (new + updated)
    pub fn pending_chunks(&self) -> impl Iterator<Item = &DocumentChunk> {
        self.new_chunks.iter().chain(self.updated_chunks.iter())
    }
}

/// Operator-facing counts reported after every sync
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSummary {
    pub new: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub removed: usize,
}

impl std::fmt::Display for SyncSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} new, {} updated, {} unchanged, {} removed",
            self.new, self.updated, self.unchanged, self.removed
        )
    }
}

/// A single semantic search hit, reconstructed from the stored payload
#[derive(Debug, Clone)]
pub struct VectorSearchResult {
    pub chunk: DocumentChunk,
    /// 0..1, higher = closer
    pub similarity: f32,
    /// Surface id of the stored point
    pub vector_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_chunk() -> DocumentChunk {
        DocumentChunk {
            id: "method:core:Endpoint.connect".to_string(),
            content: "# Endpoint.connect\n\nConnects to the backend.".to_string(),
            metadata: ChunkMetadata {
                chunk_type: ChunkType::Method,
                namespace: "core".to_string(),
                class_name: Some("Endpoint".to_string()),
                method_name: Some("connect".to_string()),
                importance: Importance::High,
                tags: BTreeSet::from(["connection".to_string()]),
                source_file: "core/endpoint.json".to_string(),
                line_number: Some(12),
                related_methods: vec![],
                dependencies: vec![],
                common_mistakes: vec![],
                use_cases: vec![],
            },
            embedding: None,
        }
    }

    #[test]
    fn test_importance_total_order() {
        assert!(Importance::Critical > Importance::High);
        assert!(Importance::High > Importance::Medium);
        assert!(Importance::Medium > Importance::Low);
        assert_eq!(Importance::Critical.rank(), 3);
        assert_eq!(Importance::Low.rank(), 0);
    }

    #[test]
    fn test_chunk_type_parse_roundtrip() {
        for t in [
            ChunkType::Method,
            ChunkType::Class,
            ChunkType::Example,
            ChunkType::Tutorial,
            ChunkType::Troubleshooting,
        ] {
            assert_eq!(ChunkType::parse(t.as_str()), Some(t));
        }
        assert_eq!(ChunkType::parse("widget"), None);
    }

    #[test]
    fn test_status_parse_roundtrip() {
        for s in [
            EmbeddingStatus::Pending,
            EmbeddingStatus::Completed,
            EmbeddingStatus::Failed,
            EmbeddingStatus::Outdated,
        ] {
            assert_eq!(EmbeddingStatus::parse(s.as_str()), Some(s));
        }
    }

    #[test]
    fn test_content_hash_changes_with_content() {
        let chunk = sample_chunk();
        let mut edited = chunk.clone();
        edited.content.push_str(" Now with retries.");
        assert_ne!(chunk.content_hash(), edited.content_hash());
    }

    #[test]
    fn test_content_hash_ignores_unhashed_metadata() {
        let chunk = sample_chunk();
        let mut retagged = chunk.clone();
        retagged.metadata.tags.insert("networking".to_string());
        retagged.metadata.importance = Importance::Critical;
        retagged.metadata.related_methods.push("setup".to_string());
        assert_eq!(chunk.content_hash(), retagged.content_hash());
    }

    #[test]
    fn test_content_hash_sensitive_to_identity_fields() {
        let chunk = sample_chunk();

        let mut moved = chunk.clone();
        moved.metadata.source_file = "core/other.json".to_string();
        assert_ne!(chunk.content_hash(), moved.content_hash());

        let mut renamed = chunk.clone();
        renamed.metadata.method_name = Some("disconnect".to_string());
        assert_ne!(chunk.content_hash(), renamed.content_hash());
    }

    #[test]
    fn test_sync_summary_display() {
        let result = SyncResult {
            new_chunks: vec![sample_chunk()],
            updated_chunks: vec![],
            unchanged_ids: vec!["a".to_string(), "b".to_string()],
            removed_ids: vec![],
        };
        let summary = result.summary();
        assert_eq!(summary.new, 1);
        assert_eq!(summary.unchanged, 2);
        assert_eq!(summary.to_string(), "1 new, 0 updated, 2 unchanged, 0 removed");
    }

    #[test]
    fn test_chunk_serialization_roundtrip() {
        let chunk = sample_chunk();
        let json = serde_json::to_string(&chunk).unwrap();
        let back: DocumentChunk = serde_json::from_str(&json).unwrap();
        assert_eq!(chunk, back);
    }
}
