use super::{SearchFilters, VectorDatabase, VectorStoreStats};
use crate::config::VectorDbConfig;
use crate::embedding::ChunkEmbedding;
use crate::error::VectorDbError;
use crate::types::{
    ChunkMetadata, ChunkType, DocumentChunk, Importance, VectorSearchResult,
};
use qdrant_client::qdrant::point_id::PointIdOptions;
use qdrant_client::qdrant::value::Kind;
use qdrant_client::qdrant::vectors_config::Config;
use qdrant_client::qdrant::{
    Condition, CreateCollectionBuilder, DeletePointsBuilder, Distance, Filter, PointStruct,
    SearchPointsBuilder, UpsertPointsBuilder, Value, VectorParams, VectorsConfig,
};
use qdrant_client::{Payload, Qdrant};
use serde_json::json;
use std::collections::HashMap;

pub struct QdrantVectorStore {
    client: Qdrant,
    collection: String,
    dimension: usize,
    distance: Distance,
    upsert_batch_size: usize,
}

impl QdrantVectorStore {
    pub fn new(config: &VectorDbConfig) -> Result<Self, VectorDbError> {
        tracing::info!("Connecting to Qdrant at {}", config.url);

        let client = Qdrant::from_url(&config.url)
            .build()
            .map_err(|e| VectorDbError::Unavailable(e.to_string()))?;

        Ok(Self {
            client,
            collection: config.collection_name.clone(),
            dimension: config.dimension,
            distance: parse_distance(&config.distance),
            upsert_batch_size: config.upsert_batch_size.max(1),
        })
    }

    async fn collection_exists(&self) -> Result<bool, VectorDbError> {
        let collections = self
            .client
            .list_collections()
            .await
            .map_err(|e| VectorDbError::Unavailable(e.to_string()))?;

        Ok(collections
            .collections
            .iter()
            .any(|c| c.name == self.collection))
    }

    async fn point_count(&self) -> Result<usize, VectorDbError> {
        let info = self
            .client
            .collection_info(&self.collection)
            .await
            .map_err(|e| VectorDbError::StatisticsFailed(e.to_string()))?;

        Ok(info
            .result
            .and_then(|r| r.points_count)
            .unwrap_or(0) as usize)
    }
}

#[async_trait::async_trait]
impl VectorDatabase for QdrantVectorStore {
    async fn initialize(&self) -> Result<usize, VectorDbError> {
        // fail fast when the store is down; a silent no-op here would
        // let a whole indexing run proceed into the void
        self.client
            .health_check()
            .await
            .map_err(|e| VectorDbError::Unavailable(e.to_string()))?;

        if self.collection_exists().await? {
            let existing = self.point_count().await?;
            tracing::info!(
                "Collection '{}' already exists with {} points",
                self.collection,
                existing
            );
            return Ok(existing);
        }

        tracing::info!(
            "Creating collection '{}' (dimension {}, {:?})",
            self.collection,
            self.dimension,
            self.distance
        );

        self.client
            .create_collection(
                CreateCollectionBuilder::new(&self.collection).vectors_config(VectorsConfig {
                    config: Some(Config::Params(VectorParams {
                        size: self.dimension as u64,
                        distance: self.distance.into(),
                        ..Default::default()
                    })),
                }),
            )
            .await
            .map_err(|e| VectorDbError::CollectionCreationFailed {
                collection: self.collection.clone(),
                reason: e.to_string(),
            })?;

        Ok(0)
    }

    async fn upsert_chunks(
        &self,
        chunks: &[DocumentChunk],
        embeddings: &[ChunkEmbedding],
    ) -> Result<usize, VectorDbError> {
        if embeddings.is_empty() {
            return Ok(0);
        }

        let by_id: HashMap<&str, &DocumentChunk> =
            chunks.iter().map(|c| (c.id.as_str(), c)).collect();

        let mut points = Vec::with_capacity(embeddings.len());
        for embedding in embeddings {
            let Some(chunk) = by_id.get(embedding.chunk_id.as_str()) else {
                tracing::warn!(
                    "No chunk found for embedding {}; skipping point",
                    embedding.chunk_id
                );
                continue;
            };

            let payload: Payload = payload_json(chunk)
                .try_into()
                .map_err(|e| VectorDbError::StoreFailed(format!("payload build: {}", e)))?;

            points.push(PointStruct::new(
                embedding.embedding_id.clone(),
                embedding.vector.clone(),
                payload,
            ));
        }

        let total = points.len();
        tracing::debug!(
            "Upserting {} points in batches of {}",
            total,
            self.upsert_batch_size
        );

        for batch in points.chunks(self.upsert_batch_size) {
            self.client
                .upsert_points(UpsertPointsBuilder::new(&self.collection, batch.to_vec()))
                .await
                .map_err(|e| VectorDbError::StoreFailed(e.to_string()))?;
        }

        Ok(total)
    }

    async fn search(
        &self,
        query_vector: Vec<f32>,
        filters: &SearchFilters,
        limit: usize,
        score_threshold: f32,
    ) -> Result<Vec<VectorSearchResult>, VectorDbError> {
        let mut search_builder =
            SearchPointsBuilder::new(&self.collection, query_vector, limit as u64)
                .score_threshold(score_threshold)
                .with_payload(true);

        let conditions = filter_conditions(filters);
        if !conditions.is_empty() {
            search_builder = search_builder.filter(Filter::must(conditions));
        }

        let response = self
            .client
            .search_points(search_builder)
            .await
            .map_err(|e| VectorDbError::SearchFailed(e.to_string()))?;

        let results = response
            .result
            .into_iter()
            .filter_map(|point| {
                let chunk = chunk_from_payload(&point.payload)?;
                let vector_id = point.id.and_then(point_id_string).unwrap_or_default();
                Some(VectorSearchResult {
                    chunk,
                    similarity: point.score.clamp(0.0, 1.0),
                    vector_id,
                })
            })
            .collect();

        Ok(results)
    }

    async fn delete_by_chunk_ids(&self, chunk_ids: &[String]) -> Result<(), VectorDbError> {
        if chunk_ids.is_empty() {
            return Ok(());
        }

        tracing::debug!("Deleting points for {} chunk ids", chunk_ids.len());

        let filter = Filter::must([Condition::matches("chunk_id", chunk_ids.to_vec())]);
        self.client
            .delete_points(DeletePointsBuilder::new(&self.collection).points(filter))
            .await
            .map_err(|e| VectorDbError::DeleteFailed(e.to_string()))?;

        Ok(())
    }

    async fn get_stats(&self) -> Result<VectorStoreStats, VectorDbError> {
        Ok(VectorStoreStats {
            points: self.point_count().await?,
            collection_name: self.collection.clone(),
            dimension: self.dimension,
        })
    }
}

fn parse_distance(name: &str) -> Distance {
    match name {
        "dot" => Distance::Dot,
        "euclid" => Distance::Euclid,
        _ => Distance::Cosine,
    }
}

fn filter_conditions(filters: &SearchFilters) -> Vec<Condition> {
    let mut conditions = Vec::new();

    for (field, value) in [
        ("namespace", &filters.namespace),
        ("chunk_type", &filters.chunk_type),
        ("importance", &filters.importance),
        ("class_name", &filters.class_name),
        ("method_name", &filters.method_name),
    ] {
        if let Some(value) = value {
            conditions.push(Condition::matches(field, value.clone()));
        }
    }

    if !filters.any_tags.is_empty() {
        // keyword list match: any of the given tags
        conditions.push(Condition::matches("tags", filters.any_tags.clone()));
    }

    conditions
}

/// Payload stored with every point: the stable chunk id, all metadata
/// fields, the rendered content, and a lowercase search_text for any
/// store-side text filtering.
fn payload_json(chunk: &DocumentChunk) -> serde_json::Value {
    let meta = &chunk.metadata;
    let search_text = format!(
        "{} {} {} {}",
        chunk.content,
        meta.namespace,
        meta.class_name.as_deref().unwrap_or(""),
        meta.method_name.as_deref().unwrap_or(""),
    )
    .to_lowercase();

    json!({
        "chunk_id": chunk.id,
        "content": chunk.content,
        "chunk_type": meta.chunk_type.as_str(),
        "namespace": meta.namespace,
        "class_name": meta.class_name,
        "method_name": meta.method_name,
        "importance": meta.importance.as_str(),
        "tags": meta.tags.iter().collect::<Vec<_>>(),
        "source_file": meta.source_file,
        "line_number": meta.line_number,
        "related_methods": meta.related_methods,
        "dependencies": meta.dependencies,
        "common_mistakes": meta.common_mistakes,
        "use_cases": meta.use_cases,
        "search_text": search_text,
    })
}

/// Rebuild a chunk from a stored payload; None when required fields are
/// missing or mistyped
fn chunk_from_payload(payload: &HashMap<String, Value>) -> Option<DocumentChunk> {
    let metadata = ChunkMetadata {
        chunk_type: ChunkType::parse(&get_str(payload, "chunk_type")?)?,
        namespace: get_str(payload, "namespace")?,
        class_name: get_opt_str(payload, "class_name"),
        method_name: get_opt_str(payload, "method_name"),
        importance: Importance::parse(&get_str(payload, "importance")?)?,
        tags: get_list(payload, "tags").into_iter().collect(),
        source_file: get_str(payload, "source_file")?,
        line_number: get_u64(payload, "line_number").map(|n| n as u32),
        related_methods: get_list(payload, "related_methods"),
        dependencies: get_list(payload, "dependencies"),
        common_mistakes: get_list(payload, "common_mistakes"),
        use_cases: get_list(payload, "use_cases"),
    };

    Some(DocumentChunk {
        id: get_str(payload, "chunk_id")?,
        content: get_str(payload, "content")?,
        metadata,
        embedding: None,
    })
}

fn get_str(payload: &HashMap<String, Value>, key: &str) -> Option<String> {
    match payload.get(key)?.kind.as_ref()? {
        Kind::StringValue(s) => Some(s.clone()),
        _ => None,
    }
}

fn get_opt_str(payload: &HashMap<String, Value>, key: &str) -> Option<String> {
    get_str(payload, key).filter(|s| !s.is_empty())
}

fn get_u64(payload: &HashMap<String, Value>, key: &str) -> Option<u64> {
    match payload.get(key)?.kind.as_ref()? {
        Kind::IntegerValue(n) if *n >= 0 => Some(*n as u64),
        _ => None,
    }
}

fn get_list(payload: &HashMap<String, Value>, key: &str) -> Vec<String> {
    match payload.get(key).and_then(|v| v.kind.as_ref()) {
        Some(Kind::ListValue(list)) => list
            .values
            .iter()
            .filter_map(|v| match v.kind.as_ref() {
                Some(Kind::StringValue(s)) => Some(s.clone()),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn point_id_string(id: qdrant_client::qdrant::PointId) -> Option<String> {
    match id.point_id_options? {
        PointIdOptions::Uuid(uuid) => Some(uuid),
        PointIdOptions::Num(n) => Some(n.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn sample_chunk() -> DocumentChunk {
        DocumentChunk {
            id: "method:core:endpoint.connect".to_string(),
            content: "# Endpoint.connect\n\nConnect to the Backend.".to_string(),
            metadata: ChunkMetadata {
                chunk_type: ChunkType::Method,
                namespace: "core".to_string(),
                class_name: Some("Endpoint".to_string()),
                method_name: Some("connect".to_string()),
                importance: Importance::High,
                tags: BTreeSet::from(["connection".to_string(), "lang:typescript".to_string()]),
                source_file: "core.json".to_string(),
                line_number: Some(42),
                related_methods: vec!["setup".to_string()],
                dependencies: vec![],
                common_mistakes: vec![],
                use_cases: vec![],
            },
            embedding: None,
        }
    }

    #[test]
    fn test_payload_carries_identity_and_search_text() {
        let payload = payload_json(&sample_chunk());
        assert_eq!(payload["chunk_id"], "method:core:endpoint.connect");
        assert_eq!(payload["namespace"], "core");
        assert_eq!(payload["importance"], "high");
        assert_eq!(payload["line_number"], 42);

        let search_text = payload["search_text"].as_str().unwrap();
        assert!(search_text.contains("connect to the backend"));
        assert_eq!(search_text, search_text.to_lowercase());
    }

    fn string_value(s: &str) -> Value {
        Value {
            kind: Some(Kind::StringValue(s.to_string())),
        }
    }

    fn int_value(n: i64) -> Value {
        Value {
            kind: Some(Kind::IntegerValue(n)),
        }
    }

    fn list_value(items: &[&str]) -> Value {
        Value {
            kind: Some(Kind::ListValue(qdrant_client::qdrant::ListValue {
                values: items.iter().map(|s| string_value(s)).collect(),
            })),
        }
    }

    /// A payload map shaped the way the server hands it back
    fn stored_payload() -> HashMap<String, Value> {
        HashMap::from([
            ("chunk_id".to_string(), string_value("method:core:endpoint.connect")),
            ("content".to_string(), string_value("# Endpoint.connect\n\nConnect to the Backend.")),
            ("chunk_type".to_string(), string_value("method")),
            ("namespace".to_string(), string_value("core")),
            ("class_name".to_string(), string_value("Endpoint")),
            ("method_name".to_string(), string_value("connect")),
            ("importance".to_string(), string_value("high")),
            ("tags".to_string(), list_value(&["connection", "lang:typescript"])),
            ("source_file".to_string(), string_value("core.json")),
            ("line_number".to_string(), int_value(42)),
            ("related_methods".to_string(), list_value(&["setup"])),
        ])
    }

    #[test]
    fn test_chunk_reconstruction_from_stored_payload() {
        let chunk = sample_chunk();
        let rebuilt = chunk_from_payload(&stored_payload()).unwrap();

        assert_eq!(rebuilt.id, chunk.id);
        assert_eq!(rebuilt.content, chunk.content);
        assert_eq!(rebuilt.metadata.chunk_type, chunk.metadata.chunk_type);
        assert_eq!(rebuilt.metadata.tags, chunk.metadata.tags);
        assert_eq!(rebuilt.metadata.line_number, Some(42));
        assert_eq!(rebuilt.metadata.related_methods, vec!["setup"]);
        // fields absent from the payload default to empty
        assert!(rebuilt.metadata.dependencies.is_empty());
    }

    #[test]
    fn test_missing_required_field_rejected() {
        let mut payload = stored_payload();
        payload.remove("chunk_id");
        assert!(chunk_from_payload(&payload).is_none());
    }

    #[test]
    fn test_filter_conditions_shape() {
        let empty = SearchFilters::default();
        assert!(empty.is_empty());
        assert!(filter_conditions(&empty).is_empty());

        let filters = SearchFilters {
            namespace: Some("core".to_string()),
            importance: Some("high".to_string()),
            any_tags: vec!["connection".to_string(), "setup".to_string()],
            ..Default::default()
        };
        assert!(!filters.is_empty());
        assert_eq!(filter_conditions(&filters).len(), 3);
    }

    #[test]
    fn test_parse_distance() {
        assert_eq!(parse_distance("cosine"), Distance::Cosine);
        assert_eq!(parse_distance("dot"), Distance::Dot);
        assert_eq!(parse_distance("euclid"), Distance::Euclid);
        assert_eq!(parse_distance("unknown"), Distance::Cosine);
    }
}
