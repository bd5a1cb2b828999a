//! Per-file ingestion decision procedure.
//!
//! For every candidate file the engine decides skip / add / replace and
//! drives the extractor and the vector index accordingly. The decision is
//! re-evaluated from the index every time; the session-local `seen` set is
//! only a fast path that suppresses redundant re-processing within one
//! process run. Correctness must hold with a fresh engine against a
//! pre-populated index.
//!
//! Invariant maintained here: at most one generation (one `file_hash`) per
//! canonical source path. Stale chunks are deleted before new ones are
//! inserted, so a reader never sees two generations of the same file.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use crate::config::{ChunkingConfig, EmbeddingConfig};
use crate::embedding;
use crate::error::IngestError;
use crate::extract::ChunkExtractor;
use crate::hash::hash_file;
use crate::index::VectorIndex;
use crate::models::ChunkRecord;
use crate::paths::normalize;

/// What happened to one file.
#[derive(Debug)]
pub enum FileStatus {
    /// Chunks were (re)inserted for this file.
    Added {
        chunks: usize,
        /// Chunks stored with embedding vectors.
        embedded: usize,
        /// Chunks stored without vectors because embedding failed or is disabled.
        pending: usize,
    },
    /// Content already indexed under the same hash, or already processed
    /// this session. No index mutation.
    Unchanged,
    /// Per-file failure; the file was left as it was (or absent, after a
    /// failed re-extraction of changed content).
    Failed(IngestError),
}

/// Outcome of one [`IngestionEngine::ingest_file`] call.
#[derive(Debug)]
pub struct FileOutcome {
    /// Canonical path when normalization succeeded, display path otherwise.
    pub path: String,
    pub status: FileStatus,
}

/// Orchestrates hashing, canonicalization, extraction, and index updates
/// per file.
pub struct IngestionEngine {
    extractor: Arc<dyn ChunkExtractor>,
    index: Arc<dyn VectorIndex>,
    chunking: ChunkingConfig,
    embedding: EmbeddingConfig,
    /// Canonical paths already processed this session. Fast path only;
    /// never authoritative.
    seen: HashSet<String>,
}

impl IngestionEngine {
    pub fn new(
        extractor: Arc<dyn ChunkExtractor>,
        index: Arc<dyn VectorIndex>,
        chunking: ChunkingConfig,
        embedding: EmbeddingConfig,
    ) -> Self {
        Self {
            extractor,
            index,
            chunking,
            embedding,
            seen: HashSet::new(),
        }
    }

    /// Forget the session's processed set. The next pass re-verifies every
    /// file against the index.
    pub fn reset_session(&mut self) {
        self.seen.clear();
    }

    /// Reconcile one file with the index.
    ///
    /// Never returns an error: every per-file failure is captured in the
    /// outcome so the caller can report partial success.
    pub async fn ingest_file(&mut self, path: &Path) -> FileOutcome {
        let canonical = match normalize(path) {
            Ok(c) => c,
            Err(e) => {
                return FileOutcome {
                    path: path.display().to_string(),
                    status: FileStatus::Failed(IngestError::Io(e.to_string())),
                }
            }
        };

        let status = self.reconcile(path, &canonical).await;
        FileOutcome {
            path: canonical,
            status,
        }
    }

    async fn reconcile(&mut self, path: &Path, canonical: &str) -> FileStatus {
        // Session fast path: duplicate candidates (overlapping globs, a
        // repeated manual trigger) are no-ops without touching the index.
        if self.seen.contains(canonical) {
            return FileStatus::Unchanged;
        }

        let file_hash = match hash_file(path) {
            Ok(h) => h,
            Err(e) => return FileStatus::Failed(IngestError::Io(e.to_string())),
        };

        match self.index.contains(canonical, &file_hash).await {
            Ok(true) => {
                self.seen.insert(canonical.to_string());
                return FileStatus::Unchanged;
            }
            Ok(false) => {}
            Err(e) => return FileStatus::Failed(IngestError::Index(e.to_string())),
        }

        // A prior generation may exist under a stale hash. It must be gone
        // before the new chunks land, or both generations would briefly
        // coexist.
        let stale_ids = match self.index.ids_for_source(canonical).await {
            Ok(ids) => ids,
            Err(e) => return FileStatus::Failed(IngestError::Index(e.to_string())),
        };
        if !stale_ids.is_empty() {
            if let Err(e) = self.index.delete_by_ids(&stale_ids).await {
                return FileStatus::Failed(IngestError::Index(e.to_string()));
            }
        }

        // Extraction failure leaves the file absent from the index and
        // unmarked, so the next pass retries it.
        let chunks = match self.extractor.extract(path, &self.chunking) {
            Ok(chunks) => chunks,
            Err(e) => return FileStatus::Failed(IngestError::Extract(e.to_string())),
        };

        let records: Vec<ChunkRecord> = chunks
            .into_iter()
            .map(|chunk| ChunkRecord::from_chunk(chunk, canonical, &file_hash))
            .collect();

        let vectors = self.embed_records(canonical, &records).await;
        let (embedded, pending) = match &vectors {
            Some(vs) => (vs.len(), 0),
            None if self.embedding.is_enabled() => (0, records.len()),
            None => (0, 0),
        };

        if let Err(e) = self.index.insert(&records, vectors.as_deref()).await {
            return FileStatus::Failed(IngestError::Index(e.to_string()));
        }

        self.seen.insert(canonical.to_string());
        FileStatus::Added {
            chunks: records.len(),
            embedded,
            pending,
        }
    }

    /// Inline embedding. Non-fatal: on failure the chunks are inserted
    /// without vectors and counted as pending.
    async fn embed_records(
        &self,
        canonical: &str,
        records: &[ChunkRecord],
    ) -> Option<Vec<Vec<f32>>> {
        if !self.embedding.is_enabled() || records.is_empty() {
            return None;
        }

        let mut vectors = Vec::with_capacity(records.len());
        for batch in records.chunks(self.embedding.batch_size) {
            let texts: Vec<String> = batch.iter().map(|r| r.body.clone()).collect();
            match embedding::embed_texts(&self.embedding, &texts).await {
                Ok(batch_vectors) => vectors.extend(batch_vectors),
                Err(e) => {
                    eprintln!("Warning: embedding failed for {}: {}", canonical, e);
                    return None;
                }
            }
        }
        Some(vectors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::ExtractError;
    use crate::index::memory::MemoryIndex;
    use crate::models::{ContentKind, DocChunk, ScoredChunk};
    use anyhow::{bail, Result};
    use async_trait::async_trait;
    use std::fs;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Extractor that yields fixed chunks, or fails when told to.
    struct StubExtractor {
        fail: AtomicBool,
        calls: AtomicUsize,
    }

    impl StubExtractor {
        fn new() -> Self {
            Self {
                fail: AtomicBool::new(false),
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl ChunkExtractor for StubExtractor {
        fn extract(
            &self,
            path: &Path,
            _config: &ChunkingConfig,
        ) -> Result<Vec<DocChunk>, ExtractError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                return Err(ExtractError::Pdf("stub failure".to_string()));
            }
            let body = fs::read_to_string(path).map_err(|e| ExtractError::Io(e.to_string()))?;
            Ok(vec![
                DocChunk {
                    element_id: "element_0".to_string(),
                    kind: ContentKind::Text,
                    body: body.clone(),
                },
                DocChunk {
                    element_id: "element_1".to_string(),
                    kind: ContentKind::Text,
                    body,
                },
            ])
        }
    }

    /// Index whose `contains` lookups can be made to fail; everything else
    /// delegates to a healthy in-memory index.
    struct FlakyContainsIndex {
        inner: MemoryIndex,
        fail_contains: AtomicBool,
    }

    impl FlakyContainsIndex {
        fn new() -> Self {
            Self {
                inner: MemoryIndex::new(),
                fail_contains: AtomicBool::new(false),
            }
        }
    }

    #[async_trait]
    impl VectorIndex for FlakyContainsIndex {
        async fn contains(&self, source: &str, file_hash: &str) -> Result<bool> {
            if self.fail_contains.load(Ordering::SeqCst) {
                bail!("database is locked");
            }
            self.inner.contains(source, file_hash).await
        }

        async fn ids_for_source(&self, source: &str) -> Result<Vec<String>> {
            self.inner.ids_for_source(source).await
        }

        async fn delete_by_ids(&self, ids: &[String]) -> Result<()> {
            self.inner.delete_by_ids(ids).await
        }

        async fn insert(
            &self,
            records: &[ChunkRecord],
            vectors: Option<&[Vec<f32>]>,
        ) -> Result<()> {
            self.inner.insert(records, vectors).await
        }

        async fn list_sources(&self) -> Result<Vec<String>> {
            self.inner.list_sources().await
        }

        async fn similarity_search(
            &self,
            query: &str,
            query_vec: Option<&[f32]>,
            k: usize,
        ) -> Result<Vec<ScoredChunk>> {
            self.inner.similarity_search(query, query_vec, k).await
        }
    }

    struct Fixture {
        _tmp: TempDir,
        dir: std::path::PathBuf,
        extractor: Arc<StubExtractor>,
        index: Arc<MemoryIndex>,
    }

    impl Fixture {
        fn new() -> Self {
            let tmp = TempDir::new().unwrap();
            let dir = tmp.path().to_path_buf();
            Self {
                _tmp: tmp,
                dir,
                extractor: Arc::new(StubExtractor::new()),
                index: Arc::new(MemoryIndex::new()),
            }
        }

        fn engine(&self) -> IngestionEngine {
            IngestionEngine::new(
                self.extractor.clone(),
                self.index.clone(),
                ChunkingConfig::default(),
                EmbeddingConfig::default(),
            )
        }

        fn write(&self, name: &str, content: &str) -> std::path::PathBuf {
            let path = self.dir.join(name);
            fs::write(&path, content).unwrap();
            path
        }
    }

    #[tokio::test]
    async fn new_file_is_added_with_provenance() {
        let fx = Fixture::new();
        let mut engine = fx.engine();
        let path = fx.write("a.pdf", "contents");

        let outcome = engine.ingest_file(&path).await;
        assert!(matches!(
            outcome.status,
            FileStatus::Added {
                chunks: 2,
                embedded: 0,
                pending: 0
            }
        ));
        assert_eq!(fx.index.len(), 2);

        let expected_hash = hash_file(&path).unwrap();
        assert_eq!(
            fx.index.hashes_for_source(&outcome.path),
            vec![expected_hash]
        );
    }

    #[tokio::test]
    async fn second_call_in_session_is_a_no_op() {
        let fx = Fixture::new();
        let mut engine = fx.engine();
        let path = fx.write("a.pdf", "contents");

        engine.ingest_file(&path).await;
        let second = engine.ingest_file(&path).await;

        assert!(matches!(second.status, FileStatus::Unchanged));
        assert_eq!(fx.extractor.calls.load(Ordering::SeqCst), 1);
        assert_eq!(fx.index.len(), 2);
    }

    #[tokio::test]
    async fn fresh_engine_skips_unchanged_file_via_index() {
        let fx = Fixture::new();
        let path = fx.write("a.pdf", "contents");

        fx.engine().ingest_file(&path).await;

        // New engine, empty seen set: the index alone must prevent rework.
        let mut fresh = fx.engine();
        let outcome = fresh.ingest_file(&path).await;
        assert!(matches!(outcome.status, FileStatus::Unchanged));
        assert_eq!(fx.index.len(), 2);
    }

    #[tokio::test]
    async fn changed_content_replaces_old_generation() {
        let fx = Fixture::new();
        let path = fx.write("a.pdf", "generation one");

        fx.engine().ingest_file(&path).await;
        let h1 = hash_file(&path).unwrap();

        fs::write(&path, "generation two").unwrap();
        let mut engine = fx.engine();
        let outcome = engine.ingest_file(&path).await;

        assert!(matches!(outcome.status, FileStatus::Added { .. }));
        let h2 = hash_file(&path).unwrap();
        assert_ne!(h1, h2);
        // Exactly one generation remains, and it is the new one.
        assert_eq!(fx.index.hashes_for_source(&outcome.path), vec![h2]);
        assert_eq!(fx.index.len(), 2);
    }

    #[tokio::test]
    async fn extraction_failure_leaves_file_unindexed_and_retryable() {
        let fx = Fixture::new();
        let mut engine = fx.engine();
        let path = fx.write("a.pdf", "contents");

        fx.extractor.fail.store(true, Ordering::SeqCst);
        let outcome = engine.ingest_file(&path).await;
        assert!(matches!(
            outcome.status,
            FileStatus::Failed(IngestError::Extract(_))
        ));
        assert!(fx.index.is_empty());

        // Not marked seen: the same engine retries once the parser recovers.
        fx.extractor.fail.store(false, Ordering::SeqCst);
        let retry = engine.ingest_file(&path).await;
        assert!(matches!(retry.status, FileStatus::Added { .. }));
        assert_eq!(fx.index.len(), 2);
    }

    #[tokio::test]
    async fn unreadable_file_reports_io_failure() {
        let fx = Fixture::new();
        let mut engine = fx.engine();

        let outcome = engine.ingest_file(&fx.dir.join("missing.pdf")).await;
        assert!(matches!(
            outcome.status,
            FileStatus::Failed(IngestError::Io(_))
        ));
        assert!(fx.index.is_empty());
    }

    #[tokio::test]
    async fn index_failure_is_reported_and_retryable() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("a.pdf");
        fs::write(&path, "contents").unwrap();

        let index = Arc::new(FlakyContainsIndex::new());
        let mut engine = IngestionEngine::new(
            Arc::new(StubExtractor::new()),
            index.clone(),
            ChunkingConfig::default(),
            EmbeddingConfig::default(),
        );

        index.fail_contains.store(true, Ordering::SeqCst);
        let outcome = engine.ingest_file(&path).await;
        assert!(matches!(
            outcome.status,
            FileStatus::Failed(IngestError::Index(_))
        ));
        assert!(index.inner.is_empty());

        // Not marked seen: the same engine retries once the index recovers.
        index.fail_contains.store(false, Ordering::SeqCst);
        let retry = engine.ingest_file(&path).await;
        assert!(matches!(retry.status, FileStatus::Added { .. }));
        assert_eq!(index.inner.len(), 2);
    }

    #[tokio::test]
    async fn relative_and_absolute_spellings_dedup() {
        let fx = Fixture::new();
        let mut engine = fx.engine();
        let path = fx.write("a.pdf", "contents");

        engine.ingest_file(&path).await;
        // Same file reached through a dotted spelling.
        let dotted = fx.dir.join(".").join("a.pdf");
        let outcome = engine.ingest_file(&dotted).await;

        assert!(matches!(outcome.status, FileStatus::Unchanged));
        assert_eq!(fx.index.len(), 2);
        assert_eq!(fx.index.list_sources().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn reset_session_forces_index_verification() {
        let fx = Fixture::new();
        let mut engine = fx.engine();
        let path = fx.write("a.pdf", "contents");

        engine.ingest_file(&path).await;
        engine.reset_session();
        let outcome = engine.ingest_file(&path).await;

        // Still unchanged, but via the index this time.
        assert!(matches!(outcome.status, FileStatus::Unchanged));
        assert_eq!(fx.extractor.calls.load(Ordering::SeqCst), 1);
    }
}
