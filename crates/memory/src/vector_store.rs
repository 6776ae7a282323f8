//! SQLite-backed semantic memory.
//!
//! Lives in its own database file (`vectors.db`) so the reset utility can
//! drop long-term memory independently of the transcript. Embeddings are
//! stored as little-endian f32 blobs and ranked by brute-force cosine
//! similarity, which is plenty for a single user's fact store.

use crate::sqlite::{connect, parse_timestamp};
use crate::vector;
use async_trait::async_trait;
use chrono::Utc;
use localmind_core::error::MemoryError;
use localmind_core::memory::{MemoryItem, SemanticMemory};
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{Row, SqlitePool};
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};
use uuid::Uuid;

pub struct SqliteVectorStore {
    pool: SqlitePool,
}

impl SqliteVectorStore {
    /// Open a vector store from a SQLite URL (`"sqlite::memory:"` for tests).
    pub async fn new(url: &str) -> Result<Self, MemoryError> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| MemoryError::Storage(format!("Invalid SQLite path: {e}")))?;
        let pool = connect(options, url.contains(":memory:"))
            .await
            .map_err(|e| MemoryError::Storage(format!("Failed to open SQLite: {e}")))?;
        let store = Self { pool };
        store.run_migrations().await?;
        info!("SQLite vector store initialized at {url}");
        Ok(store)
    }

    /// Open (or create) the vector database file at `path`.
    pub async fn open(path: &Path) -> Result<Self, MemoryError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                MemoryError::Storage(format!("Cannot create {}: {e}", parent.display()))
            })?;
        }
        let pool = connect(SqliteConnectOptions::new().filename(path), false)
            .await
            .map_err(|e| MemoryError::Storage(format!("Failed to open SQLite: {e}")))?;
        let store = Self { pool };
        store.run_migrations().await?;
        info!("SQLite vector store initialized at {}", path.display());
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), MemoryError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS memories (
                iid        INTEGER PRIMARY KEY AUTOINCREMENT,
                id         TEXT UNIQUE NOT NULL,
                content    TEXT NOT NULL,
                metadata   TEXT NOT NULL DEFAULT '{}',
                created_at TEXT NOT NULL,
                embedding  BLOB NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| MemoryError::Storage(format!("memories table: {e}")))?;

        debug!("Vector store migrations complete");
        Ok(())
    }

    fn row_to_item(row: &sqlx::sqlite::SqliteRow) -> Result<MemoryItem, MemoryError> {
        let id: String = row
            .try_get("id")
            .map_err(|e| MemoryError::QueryFailed(format!("id column: {e}")))?;
        let content: String = row
            .try_get("content")
            .map_err(|e| MemoryError::QueryFailed(format!("content column: {e}")))?;
        let metadata_json: String = row
            .try_get("metadata")
            .map_err(|e| MemoryError::QueryFailed(format!("metadata column: {e}")))?;
        let blob: Vec<u8> = row
            .try_get("embedding")
            .map_err(|e| MemoryError::QueryFailed(format!("embedding column: {e}")))?;
        let created_at: Option<String> = row.try_get("created_at").unwrap_or(None);

        let mut metadata: serde_json::Map<String, serde_json::Value> =
            serde_json::from_str(&metadata_json).unwrap_or_default();
        metadata
            .entry("created_at")
            .or_insert_with(|| parse_timestamp(created_at).to_rfc3339().into());

        Ok(MemoryItem {
            id,
            content,
            embedding: vector::blob_to_embedding(&blob),
            metadata,
            score: 0.0,
        })
    }

    /// Dimension of the stored embeddings, if any item exists.
    async fn dimension(&self) -> Result<Option<usize>, MemoryError> {
        let len: Option<i64> = sqlx::query_scalar("SELECT length(embedding) FROM memories LIMIT 1")
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| MemoryError::QueryFailed(format!("dimension probe: {e}")))?;
        Ok(len.map(|bytes| bytes as usize / 4))
    }
}

#[async_trait]
impl SemanticMemory for SqliteVectorStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn query(&self, query: &[f32], k: usize) -> Result<Vec<MemoryItem>, MemoryError> {
        vector::check_dimension(self.dimension().await?, query.len())?;

        let rows = sqlx::query("SELECT * FROM memories ORDER BY iid ASC")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| MemoryError::QueryFailed(format!("Vector scan: {e}")))?;
        let items = rows
            .iter()
            .map(Self::row_to_item)
            .collect::<Result<Vec<_>, _>>()?;

        let ranked = vector::rank_by_similarity(items, query, k);
        debug!(hits = ranked.len(), k, "Semantic memory query");
        Ok(ranked)
    }

    async fn add(
        &self,
        content: &str,
        embedding: Vec<f32>,
        metadata: serde_json::Map<String, serde_json::Value>,
    ) -> Result<String, MemoryError> {
        vector::check_dimension(self.dimension().await?, embedding.len())?;

        let id = Uuid::new_v4().to_string();
        let metadata_json = serde_json::Value::Object(metadata).to_string();
        sqlx::query(
            "INSERT INTO memories (id, content, metadata, created_at, embedding) VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&id)
        .bind(content)
        .bind(metadata_json)
        .bind(Utc::now().to_rfc3339())
        .bind(vector::embedding_to_blob(&embedding))
        .execute(&self.pool)
        .await
        .map_err(|e| MemoryError::Storage(format!("INSERT failed: {e}")))?;

        debug!("Stored memory {id}");
        Ok(id)
    }

    async fn update(
        &self,
        id: &str,
        content: &str,
        embedding: Option<Vec<f32>>,
    ) -> Result<(), MemoryError> {
        let result = match embedding {
            Some(embedding) => {
                vector::check_dimension(self.dimension().await?, embedding.len())?;
                sqlx::query("UPDATE memories SET content = ?1, embedding = ?2 WHERE id = ?3")
                    .bind(content)
                    .bind(vector::embedding_to_blob(&embedding))
                    .bind(id)
                    .execute(&self.pool)
                    .await
            }
            None => {
                sqlx::query("UPDATE memories SET content = ?1 WHERE id = ?2")
                    .bind(content)
                    .bind(id)
                    .execute(&self.pool)
                    .await
            }
        }
        .map_err(|e| MemoryError::Storage(format!("UPDATE failed: {e}")))?;

        if result.rows_affected() == 0 {
            return Err(MemoryError::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn delete(&self, ids: &[String]) -> Result<usize, MemoryError> {
        let mut removed = 0;
        for id in ids {
            let result = sqlx::query("DELETE FROM memories WHERE id = ?1")
                .bind(id)
                .execute(&self.pool)
                .await
                .map_err(|e| MemoryError::Storage(format!("DELETE failed: {e}")))?;
            removed += result.rows_affected() as usize;
        }
        Ok(removed)
    }

    async fn get(&self, id: &str) -> Result<Option<MemoryItem>, MemoryError> {
        let row = sqlx::query("SELECT * FROM memories WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| MemoryError::QueryFailed(format!("GET by ID: {e}")))?;

        row.as_ref().map(Self::row_to_item).transpose()
    }

    async fn list(&self, limit: Option<usize>) -> Result<Vec<MemoryItem>, MemoryError> {
        // SQLite treats a negative LIMIT as unbounded.
        let limit = limit.map(|l| l as i64).unwrap_or(-1);
        let rows = sqlx::query("SELECT * FROM memories ORDER BY iid ASC LIMIT ?1")
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| MemoryError::QueryFailed(format!("LIST: {e}")))?;
        rows.iter().map(Self::row_to_item).collect()
    }

    async fn count(&self) -> Result<usize, MemoryError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM memories")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| MemoryError::QueryFailed(format!("COUNT: {e}")))?;
        Ok(count as usize)
    }

    async fn clear(&self) -> Result<(), MemoryError> {
        sqlx::query("DELETE FROM memories")
            .execute(&self.pool)
            .await
            .map_err(|e| MemoryError::Storage(format!("CLEAR failed: {e}")))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_store() -> SqliteVectorStore {
        SqliteVectorStore::new("sqlite::memory:").await.unwrap()
    }

    fn meta(source: &str) -> serde_json::Map<String, serde_json::Value> {
        let mut m = serde_json::Map::new();
        m.insert("source".into(), source.into());
        m
    }

    #[tokio::test]
    async fn add_and_query_ranks_by_similarity() {
        let store = test_store().await;
        let rust = store
            .add("User writes Rust daily", vec![1.0, 0.0, 0.0], meta("sidecar"))
            .await
            .unwrap();
        store
            .add("User owns a cat", vec![0.0, 1.0, 0.0], meta("manual"))
            .await
            .unwrap();

        let hits = store.query(&[0.8, 0.2, 0.0], 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, rust);
        assert!(hits[0].score > hits[1].score);
        assert_eq!(hits[0].metadata["source"], "sidecar");
    }

    #[tokio::test]
    async fn query_on_empty_store() {
        let store = test_store().await;
        assert!(store.query(&[1.0, 0.0], 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn update_with_and_without_embedding() {
        let store = test_store().await;
        let id = store.add("old", vec![1.0, 0.0], meta("manual")).await.unwrap();

        store.update(&id, "new text", None).await.unwrap();
        let item = store.get(&id).await.unwrap().unwrap();
        assert_eq!(item.content, "new text");
        assert_eq!(item.embedding, vec![1.0, 0.0]);

        store.update(&id, "newer", Some(vec![0.0, 1.0])).await.unwrap();
        let item = store.get(&id).await.unwrap().unwrap();
        assert_eq!(item.embedding, vec![0.0, 1.0]);

        assert!(matches!(
            store.update("ghost", "x", None).await,
            Err(MemoryError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn dimension_mismatch_rejected() {
        let store = test_store().await;
        store.add("a", vec![1.0, 0.0, 0.0], meta("m")).await.unwrap();
        assert!(matches!(
            store.add("b", vec![1.0], meta("m")).await,
            Err(MemoryError::DimensionMismatch { expected: 3, actual: 1 })
        ));
    }

    #[tokio::test]
    async fn list_delete_count_clear() {
        let store = test_store().await;
        let mut ids = Vec::new();
        for i in 0..4 {
            ids.push(
                store
                    .add(&format!("fact {i}"), vec![1.0, i as f32], meta("m"))
                    .await
                    .unwrap(),
            );
        }

        let listed = store.list(Some(2)).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].content, "fact 0");
        assert_eq!(store.list(None).await.unwrap().len(), 4);

        assert_eq!(store.delete(&ids[..2]).await.unwrap(), 2);
        assert_eq!(store.count().await.unwrap(), 2);

        store.clear().await.unwrap();
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vectors.db");
        {
            let store = SqliteVectorStore::open(&path).await.unwrap();
            store.add("persisted", vec![0.5, 0.5], meta("m")).await.unwrap();
        }
        let store = SqliteVectorStore::open(&path).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 1);
    }
}
