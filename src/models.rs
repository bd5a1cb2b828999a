//! Core data types that flow through the ingestion and retrieval pipeline.

use serde::{Deserialize, Serialize};

/// Content category tag carried by every extracted chunk.
///
/// Only `Text` receives full treatment today; `Table` and `Image` are
/// recognized tags whose bodies hold a textual serialization or description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Text,
    Table,
    Image,
}

impl ContentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::Text => "text",
            ContentKind::Table => "table",
            ContentKind::Image => "image",
        }
    }

    /// Parse a stored tag, falling back to `Text` for anything unknown.
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "table" => ContentKind::Table,
            "image" => ContentKind::Image,
            _ => ContentKind::Text,
        }
    }
}

impl std::fmt::Display for ContentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw chunk produced by a [`ChunkExtractor`](crate::extract::ChunkExtractor),
/// before provenance is attached.
///
/// `element_id` is unique only within one extraction batch; globally-unique
/// row ids are assigned by the [`VectorIndex`](crate::index::VectorIndex) on
/// insert.
#[derive(Debug, Clone)]
pub struct DocChunk {
    pub element_id: String,
    pub kind: ContentKind,
    pub body: String,
}

/// A chunk record ready for insertion: a [`DocChunk`] plus the provenance
/// metadata the dedup logic relies on.
///
/// Invariant: `source` is always the canonical path of the originating file
/// and `file_hash` is the content digest of the generation being inserted.
#[derive(Debug, Clone)]
pub struct ChunkRecord {
    pub element_id: String,
    pub kind: ContentKind,
    pub body: String,
    pub source: String,
    pub file_hash: String,
}

impl ChunkRecord {
    pub fn from_chunk(chunk: DocChunk, source: &str, file_hash: &str) -> Self {
        Self {
            element_id: chunk.element_id,
            kind: chunk.kind,
            body: chunk.body,
            source: source.to_string(),
            file_hash: file_hash.to_string(),
        }
    }
}

/// A chunk returned from similarity search, with its relevance score.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub source: String,
    pub element_id: String,
    pub kind: ContentKind,
    pub body: String,
    pub score: f64,
}
