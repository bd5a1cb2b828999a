//! In-memory [`VectorIndex`] implementation.
//!
//! `Vec` behind `std::sync::RwLock` for thread safety. Used by the test
//! suite; semantics match [`SqliteIndex`] (exact-match filters, opaque UUID
//! row ids, cosine or keyword scoring).
//!
//! [`SqliteIndex`]: super::sqlite::SqliteIndex

use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

use crate::embedding::cosine_similarity;
use crate::models::{ChunkRecord, ScoredChunk};

use super::{keyword_score, query_terms, VectorIndex};

struct StoredChunk {
    id: String,
    record: ChunkRecord,
    vector: Option<Vec<f32>>,
}

/// In-memory index for tests.
#[derive(Default)]
pub struct MemoryIndex {
    chunks: RwLock<Vec<StoredChunk>>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total stored chunk count (test helper).
    pub fn len(&self) -> usize {
        self.chunks.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Hashes currently stored for a source (test helper).
    pub fn hashes_for_source(&self, source: &str) -> Vec<String> {
        let mut hashes: Vec<String> = self
            .chunks
            .read()
            .unwrap()
            .iter()
            .filter(|sc| sc.record.source == source)
            .map(|sc| sc.record.file_hash.clone())
            .collect();
        hashes.sort();
        hashes.dedup();
        hashes
    }
}

#[async_trait]
impl VectorIndex for MemoryIndex {
    async fn contains(&self, source: &str, file_hash: &str) -> Result<bool> {
        let chunks = self.chunks.read().unwrap();
        Ok(chunks
            .iter()
            .any(|sc| sc.record.source == source && sc.record.file_hash == file_hash))
    }

    async fn ids_for_source(&self, source: &str) -> Result<Vec<String>> {
        let chunks = self.chunks.read().unwrap();
        Ok(chunks
            .iter()
            .filter(|sc| sc.record.source == source)
            .map(|sc| sc.id.clone())
            .collect())
    }

    async fn delete_by_ids(&self, ids: &[String]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let mut chunks = self.chunks.write().unwrap();
        chunks.retain(|sc| !ids.contains(&sc.id));
        Ok(())
    }

    async fn insert(&self, records: &[ChunkRecord], vectors: Option<&[Vec<f32>]>) -> Result<()> {
        let mut chunks = self.chunks.write().unwrap();
        for (i, record) in records.iter().enumerate() {
            chunks.push(StoredChunk {
                id: Uuid::new_v4().to_string(),
                record: record.clone(),
                vector: vectors.and_then(|vs| vs.get(i).cloned()),
            });
        }
        Ok(())
    }

    async fn list_sources(&self) -> Result<Vec<String>> {
        let chunks = self.chunks.read().unwrap();
        let mut sources: Vec<String> = chunks.iter().map(|sc| sc.record.source.clone()).collect();
        sources.sort();
        sources.dedup();
        Ok(sources)
    }

    async fn similarity_search(
        &self,
        query: &str,
        query_vec: Option<&[f32]>,
        k: usize,
    ) -> Result<Vec<ScoredChunk>> {
        let chunks = self.chunks.read().unwrap();
        let terms = query_terms(query);

        let mut scored: Vec<ScoredChunk> = chunks
            .iter()
            .filter_map(|sc| {
                let score = match (query_vec, &sc.vector) {
                    (Some(qv), Some(v)) => cosine_similarity(qv, v) as f64,
                    _ => keyword_score(&terms, &sc.record.body),
                };
                if score > 0.0 {
                    Some(ScoredChunk {
                        source: sc.record.source.clone(),
                        element_id: sc.record.element_id.clone(),
                        kind: sc.record.kind,
                        body: sc.record.body.clone(),
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ContentKind;

    fn record(source: &str, hash: &str, element: &str, body: &str) -> ChunkRecord {
        ChunkRecord {
            element_id: element.to_string(),
            kind: ContentKind::Text,
            body: body.to_string(),
            source: source.to_string(),
            file_hash: hash.to_string(),
        }
    }

    #[tokio::test]
    async fn contains_matches_exact_source_and_hash() {
        let index = MemoryIndex::new();
        index
            .insert(&[record("/a.pdf", "h1", "element_0", "body")], None)
            .await
            .unwrap();

        assert!(index.contains("/a.pdf", "h1").await.unwrap());
        assert!(!index.contains("/a.pdf", "h2").await.unwrap());
        assert!(!index.contains("/b.pdf", "h1").await.unwrap());
    }

    #[tokio::test]
    async fn delete_by_ids_removes_only_named_rows() {
        let index = MemoryIndex::new();
        index
            .insert(
                &[
                    record("/a.pdf", "h1", "element_0", "one"),
                    record("/b.pdf", "h2", "element_0", "two"),
                ],
                None,
            )
            .await
            .unwrap();

        let ids = index.ids_for_source("/a.pdf").await.unwrap();
        assert_eq!(ids.len(), 1);
        index.delete_by_ids(&ids).await.unwrap();

        assert_eq!(index.list_sources().await.unwrap(), vec!["/b.pdf"]);
        // Empty input is a no-op.
        index.delete_by_ids(&[]).await.unwrap();
        assert_eq!(index.len(), 1);
    }

    #[tokio::test]
    async fn list_sources_is_distinct_and_sorted() {
        let index = MemoryIndex::new();
        index
            .insert(
                &[
                    record("/b.pdf", "h2", "element_0", "x"),
                    record("/a.pdf", "h1", "element_0", "y"),
                    record("/a.pdf", "h1", "element_1", "z"),
                ],
                None,
            )
            .await
            .unwrap();

        assert_eq!(
            index.list_sources().await.unwrap(),
            vec!["/a.pdf".to_string(), "/b.pdf".to_string()]
        );
    }

    #[tokio::test]
    async fn keyword_search_ranks_by_term_overlap() {
        let index = MemoryIndex::new();
        index
            .insert(
                &[
                    record("/a.pdf", "h1", "element_0", "rust ownership and borrowing"),
                    record("/a.pdf", "h1", "element_1", "python garbage collection"),
                ],
                None,
            )
            .await
            .unwrap();

        let hits = index
            .similarity_search("rust borrowing", None, 4)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].element_id, "element_0");
    }

    #[tokio::test]
    async fn vector_search_prefers_closest_embedding() {
        let index = MemoryIndex::new();
        index
            .insert(
                &[
                    record("/a.pdf", "h1", "element_0", "first"),
                    record("/a.pdf", "h1", "element_1", "second"),
                ],
                Some(&[vec![1.0, 0.0], vec![0.0, 1.0]]),
            )
            .await
            .unwrap();

        let hits = index
            .similarity_search("ignored", Some(&[0.9, 0.1]), 1)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].element_id, "element_0");
    }
}
