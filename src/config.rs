//! TOML configuration parsing and validation.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub index: IndexConfig,
    pub watch: WatchConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub chat: ChatConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    /// Path to the SQLite index file. Parent directories are created on init.
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WatchConfig {
    /// Root of the watched directory, scanned recursively.
    pub root: PathBuf,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default)]
    pub follow_symlinks: bool,
    /// Seconds between automatic sync passes in watch mode.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

fn default_include_globs() -> Vec<String> {
    vec!["**/*.pdf".to_string()]
}

fn default_interval_secs() -> u64 {
    300
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    /// Target maximum characters per chunk.
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
    /// Characters of trailing context carried into the next chunk.
    #[serde(default = "default_overlap_chars")]
    pub overlap_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chars: default_max_chars(),
            overlap_chars: default_overlap_chars(),
        }
    }
}

fn default_max_chars() -> usize {
    1600
}

fn default_overlap_chars() -> usize {
    200
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    /// One of `disabled`, `openai`, `gemini`.
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: None,
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}

fn default_batch_size() -> usize {
    64
}

fn default_max_retries() -> u32 {
    5
}

fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChatConfig {
    /// One of `gemini`, `openai`.
    #[serde(default = "default_chat_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    /// How many retrieved chunks to ground the answer on.
    #[serde(default = "default_context_chunks")]
    pub context_chunks: usize,
    #[serde(default = "default_chat_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            provider: default_chat_provider(),
            model: None,
            context_chunks: default_context_chunks(),
            timeout_secs: default_chat_timeout_secs(),
        }
    }
}

fn default_chat_provider() -> String {
    "gemini".to_string()
}

fn default_context_chunks() -> usize {
    4
}

fn default_chat_timeout_secs() -> u64 {
    60
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    // Validate chunking
    if config.chunking.max_chars == 0 {
        anyhow::bail!("chunking.max_chars must be > 0");
    }
    if config.chunking.overlap_chars >= config.chunking.max_chars {
        anyhow::bail!("chunking.overlap_chars must be smaller than chunking.max_chars");
    }

    // Validate watch
    if config.watch.interval_secs == 0 {
        anyhow::bail!("watch.interval_secs must be > 0");
    }

    // Validate embedding
    if config.embedding.is_enabled() {
        if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
            anyhow::bail!(
                "embedding.dims must be > 0 when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.model.is_none() {
            anyhow::bail!(
                "embedding.model must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
    }

    match config.embedding.provider.as_str() {
        "disabled" | "openai" | "gemini" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled, openai, or gemini.",
            other
        ),
    }

    match config.chat.provider.as_str() {
        "gemini" | "openai" => {}
        other => anyhow::bail!(
            "Unknown chat provider: '{}'. Must be gemini or openai.",
            other
        ),
    }

    Ok(config)
}
