//! SQLite-backed [`VectorIndex`].
//!
//! One `chunks` table holds body text, provenance metadata, and an optional
//! embedding blob per row. Equality filters on `source` and
//! `(source, file_hash)` are indexed; similarity search is brute-force
//! cosine over the stored vectors (fine at folder-of-PDFs scale), with a
//! term-overlap fallback when no query vector is available.

use std::path::Path;

use anyhow::Result;
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::str::FromStr;
use uuid::Uuid;

use crate::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use crate::models::{ChunkRecord, ContentKind, ScoredChunk};

use super::{keyword_score, query_terms, VectorIndex};

/// Durable index stored in a single SQLite file.
pub struct SqliteIndex {
    pool: SqlitePool,
}

impl SqliteIndex {
    /// Open (creating if missing) the index file and bootstrap the schema.
    /// Safe to call repeatedly.
    pub async fn connect(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let index = Self { pool };
        index.bootstrap_schema().await?;
        Ok(index)
    }

    async fn bootstrap_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS chunks (
                id TEXT PRIMARY KEY,
                source TEXT NOT NULL,
                file_hash TEXT NOT NULL,
                element_id TEXT NOT NULL,
                kind TEXT NOT NULL DEFAULT 'text',
                body TEXT NOT NULL,
                embedding BLOB,
                indexed_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_chunks_source ON chunks(source)")
            .execute(&self.pool)
            .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_chunks_source_hash ON chunks(source, file_hash)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl VectorIndex for SqliteIndex {
    async fn contains(&self, source: &str, file_hash: &str) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT COUNT(*) > 0 FROM chunks WHERE source = ? AND file_hash = ?",
        )
        .bind(source)
        .bind(file_hash)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn ids_for_source(&self, source: &str) -> Result<Vec<String>> {
        let ids: Vec<String> = sqlx::query_scalar("SELECT id FROM chunks WHERE source = ?")
            .bind(source)
            .fetch_all(&self.pool)
            .await?;
        Ok(ids)
    }

    async fn delete_by_ids(&self, ids: &[String]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }

        // One statement, so readers never see a partially-deleted file.
        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!("DELETE FROM chunks WHERE id IN ({})", placeholders);
        let mut query = sqlx::query(&sql);
        for id in ids {
            query = query.bind(id);
        }
        query.execute(&self.pool).await?;
        Ok(())
    }

    async fn insert(&self, records: &[ChunkRecord], vectors: Option<&[Vec<f32>]>) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let now = chrono::Utc::now().timestamp();
        let mut tx = self.pool.begin().await?;

        for (i, record) in records.iter().enumerate() {
            let blob: Option<Vec<u8>> = vectors.and_then(|vs| vs.get(i)).map(|v| vec_to_blob(v));
            sqlx::query(
                r#"
                INSERT INTO chunks (id, source, file_hash, element_id, kind, body, embedding, indexed_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(Uuid::new_v4().to_string())
            .bind(&record.source)
            .bind(&record.file_hash)
            .bind(&record.element_id)
            .bind(record.kind.as_str())
            .bind(&record.body)
            .bind(blob)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn list_sources(&self) -> Result<Vec<String>> {
        let sources: Vec<String> =
            sqlx::query_scalar("SELECT DISTINCT source FROM chunks ORDER BY source")
                .fetch_all(&self.pool)
                .await?;
        Ok(sources)
    }

    async fn similarity_search(
        &self,
        query: &str,
        query_vec: Option<&[f32]>,
        k: usize,
    ) -> Result<Vec<ScoredChunk>> {
        let rows = if query_vec.is_some() {
            sqlx::query(
                "SELECT source, element_id, kind, body, embedding FROM chunks \
                 WHERE embedding IS NOT NULL",
            )
            .fetch_all(&self.pool)
            .await?
        } else {
            sqlx::query("SELECT source, element_id, kind, body, embedding FROM chunks")
                .fetch_all(&self.pool)
                .await?
        };

        let terms = query_terms(query);
        let mut scored: Vec<ScoredChunk> = rows
            .iter()
            .filter_map(|row| {
                let body: String = row.get("body");
                let score = match query_vec {
                    Some(qv) => {
                        let blob: Vec<u8> = row.get("embedding");
                        cosine_similarity(qv, &blob_to_vec(&blob)) as f64
                    }
                    None => keyword_score(&terms, &body),
                };
                if score > 0.0 {
                    let kind: String = row.get("kind");
                    Some(ScoredChunk {
                        source: row.get("source"),
                        element_id: row.get("element_id"),
                        kind: ContentKind::from_tag(&kind),
                        body,
                        score,
                    })
                } else {
                    None
                }
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(k);
        Ok(scored)
    }
}
