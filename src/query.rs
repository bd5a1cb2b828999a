//! Similarity search over the index.

use anyhow::Result;

use crate::config::Config;
use crate::embedding;
use crate::index::sqlite::SqliteIndex;
use crate::index::VectorIndex;
use crate::models::ScoredChunk;

const DEFAULT_LIMIT: usize = 8;
const SNIPPET_CHARS: usize = 240;

/// Fetch the top-k chunks for a query, embedding it first when a provider
/// is configured.
pub async fn retrieve(
    config: &Config,
    index: &dyn VectorIndex,
    query: &str,
    k: usize,
) -> Result<Vec<ScoredChunk>> {
    let query_vec = if config.embedding.is_enabled() {
        Some(embedding::embed_query(&config.embedding, query).await?)
    } else {
        None
    };
    index
        .similarity_search(query, query_vec.as_deref(), k)
        .await
}

/// `atlas query <text>` — print the top matching chunks.
pub async fn run_query(config: &Config, query: &str, limit: Option<usize>) -> Result<()> {
    if query.trim().is_empty() {
        println!("No results.");
        return Ok(());
    }

    if config.embedding.is_enabled() {
        embedding::require_api_key(&config.embedding.provider)?;
    }

    let index = SqliteIndex::connect(&config.index.path).await?;
    let k = limit.unwrap_or(DEFAULT_LIMIT);
    let hits = retrieve(config, &index, query, k).await?;

    if hits.is_empty() {
        println!("No results.");
        index.close().await;
        return Ok(());
    }

    println!("results for \"{}\"", query);
    for (i, hit) in hits.iter().enumerate() {
        let snippet: String = hit.body.chars().take(SNIPPET_CHARS).collect();
        println!(
            "  {}. {} ({}, {}) score={:.3}",
            i + 1,
            hit.source,
            hit.element_id,
            hit.kind,
            hit.score
        );
        println!("     {}", snippet.replace('\n', " "));
    }

    index.close().await;
    Ok(())
}
