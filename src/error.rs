//! Per-file ingestion error taxonomy.
//!
//! These errors are collected into the sync report, never raised past the
//! synchronizer boundary. Startup configuration problems use `anyhow`
//! directly and abort before any file work begins.

/// Why a single file could not be (re)indexed.
#[derive(Debug)]
pub enum IngestError {
    /// The file could not be read or its path made canonical (permissions,
    /// vanished mid-read).
    Io(String),
    /// The PDF parser could not produce chunks; the file is left unindexed.
    Extract(String),
    /// A vector index operation failed. The synchronizer probes the index
    /// after seeing one of these and fails the whole sync only if the index
    /// is unreachable for subsequent calls.
    Index(String),
}

impl std::fmt::Display for IngestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IngestError::Io(e) => write!(f, "could not read file: {}", e),
            IngestError::Extract(e) => write!(f, "extraction failed: {}", e),
            IngestError::Index(e) => write!(f, "index operation failed: {}", e),
        }
    }
}

impl std::error::Error for IngestError {}

impl IngestError {
    pub fn is_index(&self) -> bool {
        matches!(self, IngestError::Index(_))
    }
}
