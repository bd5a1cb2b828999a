//! # PDF Atlas
//!
//! Mirror a folder of PDF documents into a searchable vector index and ask
//! natural-language questions answered from that index.
//!
//! The heart of the crate is the ingestion and synchronization pipeline:
//! for every PDF under the watched directory it decides whether the file is
//! new, unchanged, changed, or deleted, and reconciles the vector index
//! accordingly — without ever duplicating or losing content.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌─────────────────┐   ┌─────────────┐
//! │ Watched dir  │──▶│ FolderSync      │──▶│ SQLite      │
//! │ (*.pdf scan) │   │ + IngestEngine  │   │ chunk index │
//! └──────────────┘   │ hash/extract/   │   └──────┬──────┘
//!                    │ embed           │          │
//!                    └─────────────────┘          ▼
//!                                           ┌──────────┐
//!                                           │   CLI    │
//!                                           │ (atlas)  │
//!                                           └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! atlas init                  # create the index database
//! atlas sync                  # reconcile the watched folder
//! atlas watch                 # keep reconciling periodically
//! atlas query "deadline"      # top-k matching chunks
//! atlas ask "what changed?"   # grounded answer from a chat model
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`hash`] | Content fingerprinting (streaming SHA-256) |
//! | [`paths`] | Canonical path handling |
//! | [`extract`] | PDF chunk extraction |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`index`] | Vector index trait + SQLite and in-memory backends |
//! | [`engine`] | Per-file ingestion decision procedure |
//! | [`sync`] | Folder synchronization and watch loop |
//! | [`query`] | Similarity search command |
//! | [`chat`] | Retrieval-augmented answering |

pub mod chat;
pub mod config;
pub mod embedding;
pub mod engine;
pub mod error;
pub mod extract;
pub mod hash;
pub mod index;
pub mod models;
pub mod paths;
pub mod query;
pub mod sync;
