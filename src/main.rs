//! # PDF Atlas CLI (`atlas`)
//!
//! The `atlas` binary keeps a folder of PDFs mirrored into a searchable
//! vector index and answers questions from it.
//!
//! ## Usage
//!
//! ```bash
//! atlas --config ./config/atlas.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `atlas init` | Create the SQLite index and schema |
//! | `atlas sync` | Reconcile the watched folder with the index once |
//! | `atlas watch` | Reconcile periodically until interrupted |
//! | `atlas ingest <file>` | Reconcile a single PDF |
//! | `atlas status` | List indexed sources and chunk counts |
//! | `atlas query "<text>"` | Top-k matching chunks |
//! | `atlas ask "<question>"` | Answer a question grounded in the index |

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use pdf_atlas::index::sqlite::SqliteIndex;
use pdf_atlas::{chat, config, query, sync};

/// PDF Atlas — mirror a folder of PDFs into a searchable vector index and
/// ask questions against it.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/atlas.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "atlas",
    about = "PDF Atlas — keep a folder of PDFs mirrored into a searchable vector index",
    version,
    long_about = "PDF Atlas scans a watched directory of PDF documents, decides per file \
    whether it is new, unchanged, changed, or deleted, and reconciles a vector index \
    accordingly. Retrieval and question answering run against the same index."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/atlas.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the index database.
    ///
    /// Creates the SQLite file and the chunks schema. Idempotent — running
    /// it multiple times is safe.
    Init,

    /// Run one synchronization pass over the watched directory.
    ///
    /// New and changed files are (re)indexed; files that disappeared from
    /// disk have their chunks deleted. Per-file failures are reported and
    /// never abort the pass.
    Sync,

    /// Synchronize periodically until interrupted.
    ///
    /// A trigger that fires while a pass is still running is deferred, not
    /// stacked.
    Watch {
        /// Override the sync interval from config, in seconds.
        #[arg(long)]
        interval_secs: Option<u64>,
    },

    /// Reconcile a single PDF with the index.
    Ingest {
        /// Path to the PDF file.
        file: PathBuf,
    },

    /// List indexed sources and their chunk counts.
    Status,

    /// Print the top matching chunks for a query.
    ///
    /// Uses cosine similarity over stored embeddings when an embedding
    /// provider is configured, keyword scoring otherwise.
    Query {
        /// The search query string.
        text: String,

        /// Maximum number of chunks to return.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Answer a question grounded in the indexed documents.
    ///
    /// Retrieves the most relevant chunks and asks the configured chat
    /// model. Requires the provider's API key environment variable.
    Ask {
        /// The question to answer.
        question: String,

        /// How many chunks to ground the answer on.
        #[arg(long)]
        limit: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let index = SqliteIndex::connect(&cfg.index.path).await?;
            index.close().await;
            println!("Index initialized successfully.");
        }
        Commands::Sync => {
            sync::run_sync(&cfg).await?;
        }
        Commands::Watch { interval_secs } => {
            sync::run_watch(&cfg, interval_secs).await?;
        }
        Commands::Ingest { file } => {
            sync::run_ingest(&cfg, &file).await?;
        }
        Commands::Status => {
            sync::run_status(&cfg).await?;
        }
        Commands::Query { text, limit } => {
            query::run_query(&cfg, &text, limit).await?;
        }
        Commands::Ask { question, limit } => {
            chat::run_ask(&cfg, &question, limit).await?;
        }
    }

    Ok(())
}
