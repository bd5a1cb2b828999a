//! Folder synchronization.
//!
//! Walks the watched directory, routes every current PDF through the
//! ingestion engine (so changed files are caught, not just new ones), and
//! deletes index entries whose source files are gone. One sync pass at a
//! time: the engine sits behind a `tokio::sync::Mutex`, and
//! [`FolderSynchronizer::try_sync`] defers instead of stacking when a pass
//! is already running.
//!
//! A pass never aborts on a single file's failure. It fails fast only when
//! the vector index itself is unreachable.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use tokio::sync::Mutex;
use walkdir::WalkDir;

use crate::config::{Config, WatchConfig};
use crate::engine::{FileStatus, IngestionEngine};
use crate::extract::PdfExtractor;
use crate::index::sqlite::SqliteIndex;
use crate::index::VectorIndex;

/// Aggregate result of one sync pass.
#[derive(Debug, Default)]
pub struct SyncReport {
    pub scanned: usize,
    pub added: usize,
    pub unchanged: usize,
    pub removed: usize,
    pub chunks_written: usize,
    pub embeddings_written: usize,
    pub embeddings_pending: usize,
    /// Per-file failures as `(canonical path, reason)`. Never silently dropped.
    pub failures: Vec<(String, String)>,
}

/// Reconciles a watched directory against the vector index.
pub struct FolderSynchronizer {
    root: PathBuf,
    include: GlobSet,
    exclude: GlobSet,
    follow_symlinks: bool,
    index: Arc<dyn VectorIndex>,
    engine: Mutex<IngestionEngine>,
}

impl FolderSynchronizer {
    pub fn new(
        watch: &WatchConfig,
        engine: IngestionEngine,
        index: Arc<dyn VectorIndex>,
    ) -> Result<Self> {
        Ok(Self {
            root: watch.root.clone(),
            include: build_globset(&watch.include_globs)?,
            exclude: build_globset(&watch.exclude_globs)?,
            follow_symlinks: watch.follow_symlinks,
            index,
            engine: Mutex::new(engine),
        })
    }

    /// Enumerate matching files under the watched root, sorted for
    /// deterministic processing order.
    pub fn scan(&self) -> Result<Vec<PathBuf>> {
        if !self.root.exists() {
            bail!("Watched directory does not exist: {}", self.root.display());
        }

        let mut files = Vec::new();
        let walker = WalkDir::new(&self.root).follow_links(self.follow_symlinks);
        for entry in walker {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let relative = path.strip_prefix(&self.root).unwrap_or(path);
            let rel_str = relative.to_string_lossy();

            if self.exclude.is_match(rel_str.as_ref()) {
                continue;
            }
            if !self.include.is_match(rel_str.as_ref()) {
                continue;
            }

            files.push(path.to_path_buf());
        }

        files.sort();
        Ok(files)
    }

    /// Run one sync pass, waiting for any in-flight pass to finish first.
    pub async fn sync(&self) -> Result<SyncReport> {
        let mut engine = self.engine.lock().await;
        self.run_pass(&mut engine).await
    }

    /// Run one sync pass unless another is already in flight, in which case
    /// the trigger is deferred (`None`), not queued.
    pub async fn try_sync(&self) -> Result<Option<SyncReport>> {
        match self.engine.try_lock() {
            Ok(mut engine) => self.run_pass(&mut engine).await.map(Some),
            Err(_) => Ok(None),
        }
    }

    async fn run_pass(&self, engine: &mut IngestionEngine) -> Result<SyncReport> {
        let files = self.scan()?;

        // Snapshot the indexed set up front; doubles as the fail-fast probe
        // for an unreachable index.
        let indexed = self
            .index
            .list_sources()
            .await
            .context("vector index unreachable")?;

        // The seen set only dedups within one pass; a file edited between
        // passes must be re-verified against the index.
        engine.reset_session();

        let mut report = SyncReport {
            scanned: files.len(),
            ..SyncReport::default()
        };
        let mut current: BTreeSet<String> = BTreeSet::new();

        for file in files {
            let outcome = engine.ingest_file(&file).await;
            current.insert(outcome.path.clone());

            match outcome.status {
                FileStatus::Added {
                    chunks,
                    embedded,
                    pending,
                } => {
                    report.added += 1;
                    report.chunks_written += chunks;
                    report.embeddings_written += embedded;
                    report.embeddings_pending += pending;
                }
                FileStatus::Unchanged => report.unchanged += 1,
                FileStatus::Failed(err) => {
                    if err.is_index() && self.index.list_sources().await.is_err() {
                        bail!("vector index unreachable, aborting sync: {}", err);
                    }
                    report.failures.push((outcome.path, err.to_string()));
                }
            }
        }

        // Indexed sources with no file on disk anymore. A file that merely
        // failed to read this pass is still in `current` and is left alone.
        for source in indexed {
            if current.contains(&source) {
                continue;
            }
            match self.remove_source(&source).await {
                Ok(()) => report.removed += 1,
                Err(e) => {
                    if self.index.list_sources().await.is_err() {
                        bail!("vector index unreachable, aborting sync: {}", e);
                    }
                    // Index still live: the stale source stays listed and is
                    // retried next pass.
                    report.failures.push((source, e.to_string()));
                }
            }
        }

        Ok(report)
    }

    async fn remove_source(&self, source: &str) -> Result<()> {
        let ids = self.index.ids_for_source(source).await?;
        self.index.delete_by_ids(&ids).await
    }
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

async fn build_synchronizer(config: &Config) -> Result<(Arc<SqliteIndex>, FolderSynchronizer)> {
    let index = Arc::new(SqliteIndex::connect(&config.index.path).await?);
    let engine = IngestionEngine::new(
        Arc::new(PdfExtractor),
        index.clone() as Arc<dyn VectorIndex>,
        config.chunking.clone(),
        config.embedding.clone(),
    );
    let synchronizer =
        FolderSynchronizer::new(&config.watch, engine, index.clone() as Arc<dyn VectorIndex>)?;
    Ok((index, synchronizer))
}

fn check_embedding_key(config: &Config) -> Result<()> {
    if config.embedding.is_enabled() {
        crate::embedding::require_api_key(&config.embedding.provider)?;
    }
    Ok(())
}

fn print_report(root: &Path, report: &SyncReport, embedding_enabled: bool) {
    println!("sync {}", root.display());
    println!("  files scanned: {}", report.scanned);
    println!("  added: {}", report.added);
    println!("  unchanged: {}", report.unchanged);
    println!("  removed: {}", report.removed);
    println!("  chunks written: {}", report.chunks_written);
    if embedding_enabled {
        println!("  embeddings written: {}", report.embeddings_written);
        println!("  embeddings pending: {}", report.embeddings_pending);
    }
    if !report.failures.is_empty() {
        println!("  failures:");
        for (path, reason) in &report.failures {
            println!("    {}: {}", path, reason);
        }
    }
    println!("ok");
}

/// `atlas sync` — one reconciliation pass over the watched directory.
pub async fn run_sync(config: &Config) -> Result<()> {
    check_embedding_key(config)?;
    let (index, synchronizer) = build_synchronizer(config).await?;
    let report = synchronizer.sync().await?;
    print_report(&config.watch.root, &report, config.embedding.is_enabled());
    index.close().await;
    Ok(())
}

/// `atlas watch` — periodic sync passes until interrupted. Ticks that land
/// while a pass is still running are deferred, never stacked.
pub async fn run_watch(config: &Config, interval_override: Option<u64>) -> Result<()> {
    check_embedding_key(config)?;
    let (_index, synchronizer) = build_synchronizer(config).await?;
    let interval_secs = interval_override.unwrap_or(config.watch.interval_secs);

    println!(
        "watching {} (every {}s)",
        config.watch.root.display(),
        interval_secs
    );

    let mut ticker = tokio::time::interval(std::time::Duration::from_secs(interval_secs));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        match synchronizer.try_sync().await {
            Ok(Some(report)) => {
                print_report(&config.watch.root, &report, config.embedding.is_enabled());
            }
            Ok(None) => println!("previous sync still running, deferring"),
            Err(e) => eprintln!("sync failed: {}", e),
        }
    }
}

/// `atlas ingest <file>` — reconcile a single file with the index.
pub async fn run_ingest(config: &Config, file: &Path) -> Result<()> {
    check_embedding_key(config)?;
    let (index, synchronizer) = build_synchronizer(config).await?;

    let mut engine = synchronizer.engine.lock().await;
    let outcome = engine.ingest_file(file).await;
    drop(engine);

    println!("ingest {}", outcome.path);
    let result = match outcome.status {
        FileStatus::Added {
            chunks,
            embedded,
            pending,
        } => {
            println!("  status: added ({} chunks)", chunks);
            if config.embedding.is_enabled() {
                println!("  embeddings written: {}", embedded);
                println!("  embeddings pending: {}", pending);
            }
            println!("ok");
            Ok(())
        }
        FileStatus::Unchanged => {
            println!("  status: unchanged");
            println!("ok");
            Ok(())
        }
        FileStatus::Failed(err) => Err(anyhow::anyhow!("{}: {}", outcome.path, err)),
    };

    index.close().await;
    result
}

/// `atlas status` — indexed sources and their chunk counts.
pub async fn run_status(config: &Config) -> Result<()> {
    let index = SqliteIndex::connect(&config.index.path).await?;
    let sources = index.list_sources().await?;

    println!("status");
    println!("  sources indexed: {}", sources.len());
    for source in &sources {
        let chunks = index.ids_for_source(source).await?.len();
        println!("  {} ({} chunks)", source, chunks);
    }
    println!("ok");

    index.close().await;
    Ok(())
}
