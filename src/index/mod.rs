//! Storage abstraction for the vector index.
//!
//! [`VectorIndex`] is the durable source of truth for "is this file
//! indexed". It is a capability interface — exact-match filtering on
//! `source` and `file_hash`, deletion by opaque id, batch insert, and
//! similarity search — so any backend satisfying those operations is
//! substitutable. Implementations must be `Send + Sync`.
//!
//! Two implementations ship with the crate:
//! - [`sqlite::SqliteIndex`] — the durable default (sqlx, WAL journal).
//! - [`memory::MemoryIndex`] — `RwLock`-guarded vectors for the test suite.

pub mod memory;
pub mod sqlite;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{ChunkRecord, ScoredChunk};

/// Persistent store of chunks plus metadata, queryable by similarity and by
/// exact metadata filters.
///
/// Row ids handed out by [`ids_for_source`](VectorIndex::ids_for_source) are
/// opaque and globally unique; the index assigns them on insert
/// (`element_id` on a [`ChunkRecord`] is only unique within one extraction
/// batch).
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// True iff at least one chunk exists for exactly this `(source, hash)`
    /// pair — the "already processed, skip" check.
    async fn contains(&self, source: &str, file_hash: &str) -> Result<bool>;

    /// All chunk ids currently stored for a source, regardless of hash.
    async fn ids_for_source(&self, source: &str) -> Result<Vec<String>>;

    /// Remove the given chunks. No-op on empty input. A single statement
    /// per call, so a concurrent reader never observes a half-deleted file.
    async fn delete_by_ids(&self, ids: &[String]) -> Result<()>;

    /// Add new chunks with their metadata. When `vectors` is given it must
    /// be aligned one-to-one with `chunks`.
    async fn insert(&self, chunks: &[ChunkRecord], vectors: Option<&[Vec<f32>]>) -> Result<()>;

    /// Distinct source paths currently represented, sorted.
    async fn list_sources(&self) -> Result<Vec<String>>;

    /// Top-k most relevant chunks for a query.
    ///
    /// With a query vector this is cosine similarity over stored vectors;
    /// without one it degrades to term-overlap keyword scoring.
    async fn similarity_search(
        &self,
        query: &str,
        query_vec: Option<&[f32]>,
        k: usize,
    ) -> Result<Vec<ScoredChunk>>;
}

/// Term-overlap score shared by the keyword fallback paths: the number of
/// query terms appearing in the body (case-insensitive), 0 for no match.
pub(crate) fn keyword_score(terms: &[String], body: &str) -> f64 {
    let body_lower = body.to_lowercase();
    terms.iter().filter(|t| body_lower.contains(t.as_str())).count() as f64
}

/// Lowercased whitespace-split query terms.
pub(crate) fn query_terms(query: &str) -> Vec<String> {
    query
        .to_lowercase()
        .split_whitespace()
        .map(|s| s.to_string())
        .collect()
}
