//! Persistent embedding tracking ledger.
//!
//! A SQLite table keyed by unique `chunk_id` records which chunks have
//! been embedded, under which model, and with what outcome. `sync`
//! reconciles a fresh corpus snapshot against this state and is the
//! resumption point after a crash: rerunning it reproduces exactly the
//! chunks still awaiting work.
//!
//! The pool holds a single connection so every mutation is serialized;
//! concurrent embedding batches touch disjoint chunk ids but the store
//! itself is one file.

use crate::error::{DocsRagError, SyncConsistencyError, TrackerError};
use crate::types::{
    DocumentChunk, EmbeddingStatus, EmbeddingTrackingRecord, SyncResult,
};
use serde::Serialize;
use sqlx::Row;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::str::FromStr;

pub struct EmbeddingTracker {
    pool: SqlitePool,
}

/// Aggregate statistics, derived purely from queries over the table.
/// There are no separate counters to keep in sync.
#[derive(Debug, Clone, Serialize)]
pub struct TrackingStats {
    pub total: i64,
    pub by_status: Vec<(String, i64)>,
    pub by_model: Vec<(String, i64)>,
    pub by_namespace: Vec<(String, i64)>,
}

impl TrackingStats {
    pub fn count_with_status(&self, status: EmbeddingStatus) -> i64 {
        self.by_status
            .iter()
            .find(|(s, _)| s.as_str() == status.as_str())
            .map(|(_, n)| *n)
            .unwrap_or(0)
    }
}

/// Full tracking-state dump written by [`EmbeddingTracker::export_snapshot`]
#[derive(Debug, Serialize)]
struct TrackingSnapshot {
    exported_at: i64,
    stats: TrackingStats,
    records: Vec<EmbeddingTrackingRecord>,
}

impl EmbeddingTracker {
    /// Open (or create) the ledger at the given path
    pub async fn open(db_path: &Path) -> Result<Self, TrackerError> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| TrackerError::OpenFailed {
                path: db_path.display().to_string(),
                reason: e.to_string(),
            })?;
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))
            .map_err(|e| TrackerError::OpenFailed {
                path: db_path.display().to_string(),
                reason: e.to_string(),
            })?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| TrackerError::OpenFailed {
                path: db_path.display().to_string(),
                reason: e.to_string(),
            })?;

        let tracker = Self { pool };
        tracker.migrate().await?;
        tracing::info!("Opened tracking ledger at {}", db_path.display());
        Ok(tracker)
    }

    /// In-memory ledger, used by tests and dry runs
    pub async fn in_memory() -> Result<Self, TrackerError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| TrackerError::OpenFailed {
                path: ":memory:".to_string(),
                reason: e.to_string(),
            })?;

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| TrackerError::OpenFailed {
                path: ":memory:".to_string(),
                reason: e.to_string(),
            })?;

        let tracker = Self { pool };
        tracker.migrate().await?;
        Ok(tracker)
    }

    async fn migrate(&self) -> Result<(), TrackerError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS embedding_tracking (
                chunk_id TEXT PRIMARY KEY,
                chunk_hash TEXT NOT NULL,
                embedding_id TEXT,
                model_name TEXT,
                tokens_used INTEGER,
                dimensions INTEGER,
                status TEXT NOT NULL DEFAULT 'pending',
                error_message TEXT,
                source_file TEXT NOT NULL,
                namespace TEXT NOT NULL,
                chunk_type TEXT NOT NULL,
                importance TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| TrackerError::MigrationFailed(e.to_string()))?;

        // The statistics and retry-sweep queries lean on these
        for index in [
            "CREATE INDEX IF NOT EXISTS idx_tracking_status ON embedding_tracking(status)",
            "CREATE INDEX IF NOT EXISTS idx_tracking_namespace ON embedding_tracking(namespace)",
            "CREATE INDEX IF NOT EXISTS idx_tracking_chunk_type ON embedding_tracking(chunk_type)",
            "CREATE INDEX IF NOT EXISTS idx_tracking_updated_at ON embedding_tracking(updated_at)",
        ] {
            sqlx::query(index)
                .execute(&self.pool)
                .await
                .map_err(|e| TrackerError::MigrationFailed(e.to_string()))?;
        }

        Ok(())
    }

    /// Reconcile a fresh chunk snapshot against tracked state.
    ///
    /// Classification per incoming chunk:
    /// - no record: new, inserted pending
    /// - stored hash differs: updated, reset to pending with embedding
    ///   identity cleared
    /// - hash matches, status completed: unchanged, no write
    /// - hash matches, status pending/failed/outdated: still needs work,
    ///   reported as new and nudged back to pending
    ///
    /// Tracked ids absent from the snapshot go to `outdated` (soft delete);
    /// ids already outdated are not re-reported.
    pub async fn sync(&self, chunks: &[DocumentChunk]) -> Result<SyncResult, DocsRagError> {
        let mut seen: HashSet<&str> = HashSet::with_capacity(chunks.len());
        for chunk in chunks {
            if !seen.insert(chunk.id.as_str()) {
                return Err(SyncConsistencyError {
                    chunk_id: chunk.id.clone(),
                }
                .into());
            }
        }

        let existing = self.load_hash_index().await.map_err(TrackerError::from)?;
        let now = chrono::Utc::now().timestamp();
        let mut result = SyncResult::default();

        let mut tx = self.pool.begin().await.map_err(TrackerError::from)?;

        for chunk in chunks {
            let hash = chunk.content_hash();
            match existing.get(chunk.id.as_str()) {
                None => {
                    sqlx::query(
                        r#"
                        INSERT INTO embedding_tracking
                            (chunk_id, chunk_hash, status, source_file, namespace,
                             chunk_type, importance, created_at, updated_at)
                        VALUES (?, ?, 'pending', ?, ?, ?, ?, ?, ?)
                        "#,
                    )
                    .bind(&chunk.id)
                    .bind(&hash)
                    .bind(&chunk.metadata.source_file)
                    .bind(&chunk.metadata.namespace)
                    .bind(chunk.metadata.chunk_type.as_str())
                    .bind(chunk.metadata.importance.as_str())
                    .bind(now)
                    .bind(now)
                    .execute(&mut *tx)
                    .await
                    .map_err(TrackerError::from)?;

                    result.new_chunks.push(chunk.clone());
                }
                Some((stored_hash, _)) if stored_hash != &hash => {
                    sqlx::query(
                        r#"
                        UPDATE embedding_tracking
                        SET chunk_hash = ?, status = 'pending', embedding_id = NULL,
                            error_message = NULL, source_file = ?, namespace = ?,
                            chunk_type = ?, importance = ?, updated_at = ?
                        WHERE chunk_id = ?
                        "#,
                    )
                    .bind(&hash)
                    .bind(&chunk.metadata.source_file)
                    .bind(&chunk.metadata.namespace)
                    .bind(chunk.metadata.chunk_type.as_str())
                    .bind(chunk.metadata.importance.as_str())
                    .bind(now)
                    .bind(&chunk.id)
                    .execute(&mut *tx)
                    .await
                    .map_err(TrackerError::from)?;

                    result.updated_chunks.push(chunk.clone());
                }
                Some((_, EmbeddingStatus::Completed)) => {
                    result.unchanged_ids.push(chunk.id.clone());
                }
                Some((_, _)) => {
                    // tracked but never successfully embedded: still new work
                    sqlx::query(
                        "UPDATE embedding_tracking
                         SET status = 'pending', error_message = NULL, updated_at = ?
                         WHERE chunk_id = ?",
                    )
                    .bind(now)
                    .bind(&chunk.id)
                    .execute(&mut *tx)
                    .await
                    .map_err(TrackerError::from)?;

                    result.new_chunks.push(chunk.clone());
                }
            }
        }

        for (id, (_, status)) in &existing {
            if seen.contains(id.as_str()) || *status == EmbeddingStatus::Outdated {
                continue;
            }
            sqlx::query(
                "UPDATE embedding_tracking SET status = 'outdated', updated_at = ? WHERE chunk_id = ?",
            )
            .bind(now)
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(TrackerError::from)?;

            result.removed_ids.push(id.clone());
        }

        tx.commit().await.map_err(TrackerError::from)?;
        result.removed_ids.sort();

        tracing::info!("Sync complete: {}", result.summary());
        Ok(result)
    }

    async fn load_hash_index(
        &self,
    ) -> Result<HashMap<String, (String, EmbeddingStatus)>, sqlx::Error> {
        let rows = sqlx::query("SELECT chunk_id, chunk_hash, status FROM embedding_tracking")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .iter()
            .map(|row| {
                let status = EmbeddingStatus::parse(row.get::<String, _>("status").as_str())
                    .unwrap_or(EmbeddingStatus::Pending);
                (
                    row.get::<String, _>("chunk_id"),
                    (row.get::<String, _>("chunk_hash"), status),
                )
            })
            .collect())
    }

    /// Record a confirmed successful embedding. Only pending records may
    /// transition to completed.
    pub async fn mark_embedding_completed(
        &self,
        chunk_id: &str,
        embedding_id: &str,
        model_name: &str,
        tokens_used: u32,
        dimensions: u32,
    ) -> Result<(), TrackerError> {
        let now = chrono::Utc::now().timestamp();
        let updated = sqlx::query(
            r#"
            UPDATE embedding_tracking
            SET status = 'completed', embedding_id = ?, model_name = ?,
                tokens_used = ?, dimensions = ?, error_message = NULL, updated_at = ?
            WHERE chunk_id = ? AND status = 'pending'
            "#,
        )
        .bind(embedding_id)
        .bind(model_name)
        .bind(tokens_used as i64)
        .bind(dimensions as i64)
        .bind(now)
        .bind(chunk_id)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if updated == 0 {
            return Err(TrackerError::RecordNotFound(chunk_id.to_string()));
        }
        Ok(())
    }

    /// Record a failed embedding attempt. The record stays retryable.
    pub async fn mark_embedding_failed(
        &self,
        chunk_id: &str,
        error_message: &str,
    ) -> Result<(), TrackerError> {
        let now = chrono::Utc::now().timestamp();
        let updated = sqlx::query(
            r#"
            UPDATE embedding_tracking
            SET status = 'failed', error_message = ?, updated_at = ?
            WHERE chunk_id = ? AND status = 'pending'
            "#,
        )
        .bind(error_message)
        .bind(now)
        .bind(chunk_id)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if updated == 0 {
            return Err(TrackerError::RecordNotFound(chunk_id.to_string()));
        }
        Ok(())
    }

    /// Bulk failed -> pending transition for retry sweeps
    pub async fn reset_failed_embeddings(&self) -> Result<u64, TrackerError> {
        let now = chrono::Utc::now().timestamp();
        let reset = sqlx::query(
            "UPDATE embedding_tracking
             SET status = 'pending', error_message = NULL, updated_at = ?
             WHERE status = 'failed'",
        )
        .bind(now)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if reset > 0 {
            tracing::info!("Reset {} failed embeddings to pending", reset);
        }
        Ok(reset)
    }

    /// The explicit, destructive counterpart to the outdated soft delete
    pub async fn cleanup_outdated_records(&self) -> Result<u64, TrackerError> {
        let deleted = sqlx::query("DELETE FROM embedding_tracking WHERE status = 'outdated'")
            .execute(&self.pool)
            .await?
            .rows_affected();

        if deleted > 0 {
            tracing::info!("Cleaned up {} outdated tracking records", deleted);
        }
        Ok(deleted)
    }

    pub async fn get_record(
        &self,
        chunk_id: &str,
    ) -> Result<Option<EmbeddingTrackingRecord>, TrackerError> {
        let row = sqlx::query("SELECT * FROM embedding_tracking WHERE chunk_id = ?")
            .bind(chunk_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| row_to_record(&r)))
    }

    pub async fn all_records(&self) -> Result<Vec<EmbeddingTrackingRecord>, TrackerError> {
        let rows = sqlx::query("SELECT * FROM embedding_tracking ORDER BY chunk_id")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(row_to_record).collect())
    }

    pub async fn get_statistics(&self) -> Result<TrackingStats, TrackerError> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM embedding_tracking")
            .fetch_one(&self.pool)
            .await?;

        let by_status = self
            .group_counts("SELECT status, COUNT(*) FROM embedding_tracking GROUP BY status ORDER BY status")
            .await?;
        let by_model = self
            .group_counts(
                "SELECT model_name, COUNT(*) FROM embedding_tracking
                 WHERE model_name IS NOT NULL GROUP BY model_name ORDER BY model_name",
            )
            .await?;
        let by_namespace = self
            .group_counts(
                "SELECT namespace, COUNT(*) FROM embedding_tracking GROUP BY namespace ORDER BY namespace",
            )
            .await?;

        Ok(TrackingStats {
            total,
            by_status,
            by_model,
            by_namespace,
        })
    }

    async fn group_counts(&self, query: &str) -> Result<Vec<(String, i64)>, TrackerError> {
        let rows = sqlx::query(query).fetch_all(&self.pool).await?;
        Ok(rows
            .iter()
            .map(|row| (row.get::<String, _>(0), row.get::<i64, _>(1)))
            .collect())
    }

    /// Dump all records plus aggregate stats to a JSON snapshot file
    pub async fn export_snapshot(&self, path: &Path) -> Result<(), TrackerError> {
        let snapshot = TrackingSnapshot {
            exported_at: chrono::Utc::now().timestamp(),
            stats: self.get_statistics().await?,
            records: self.all_records().await?,
        };

        let json = serde_json::to_string_pretty(&snapshot).map_err(|e| {
            TrackerError::ExportFailed {
                path: path.display().to_string(),
                reason: e.to_string(),
            }
        })?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| TrackerError::ExportFailed {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
        }
        std::fs::write(path, json).map_err(|e| TrackerError::ExportFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        tracing::info!(
            "Exported {} tracking records to {}",
            snapshot.records.len(),
            path.display()
        );
        Ok(())
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}

fn row_to_record(row: &SqliteRow) -> EmbeddingTrackingRecord {
    EmbeddingTrackingRecord {
        chunk_id: row.get("chunk_id"),
        chunk_hash: row.get("chunk_hash"),
        embedding_id: row.get("embedding_id"),
        model_name: row.get("model_name"),
        tokens_used: row
            .get::<Option<i64>, _>("tokens_used")
            .map(|n| n as u32),
        dimensions: row.get::<Option<i64>, _>("dimensions").map(|n| n as u32),
        status: EmbeddingStatus::parse(row.get::<String, _>("status").as_str())
            .unwrap_or(EmbeddingStatus::Pending),
        error_message: row.get("error_message"),
        source_file: row.get("source_file"),
        namespace: row.get("namespace"),
        chunk_type: row.get("chunk_type"),
        importance: row.get("importance"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}
