//! PDF chunk extraction.
//!
//! [`ChunkExtractor`] is the boundary to the PDF parser: it turns a file
//! into an ordered batch of [`DocChunk`]s. The production implementation
//! ([`PdfExtractor`]) extracts plain text with `pdf-extract` and splits it
//! on paragraph boundaries, respecting the configured maximum chunk size
//! with a trailing-context overlap between adjacent chunks.
//!
//! Extraction is single-pass: re-extraction means calling [`extract`](ChunkExtractor::extract)
//! again. Failures are per-file; the engine reports them and moves on.

use std::path::Path;

use crate::config::ChunkingConfig;
use crate::models::{ContentKind, DocChunk};

/// Extraction error. Never panics; the pipeline skips the file.
#[derive(Debug)]
pub enum ExtractError {
    /// The file could not be read (permissions, vanished mid-read).
    Io(String),
    /// The parser could not make sense of the PDF.
    Pdf(String),
}

impl std::fmt::Display for ExtractError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtractError::Io(e) => write!(f, "could not read file: {}", e),
            ExtractError::Pdf(e) => write!(f, "PDF extraction failed: {}", e),
        }
    }
}

impl std::error::Error for ExtractError {}

/// Turns a file into an ordered batch of content chunks.
///
/// `element_id`s are unique within one batch only; global uniqueness is the
/// vector index's job.
pub trait ChunkExtractor: Send + Sync {
    fn extract(&self, path: &Path, config: &ChunkingConfig) -> Result<Vec<DocChunk>, ExtractError>;
}

/// Text extractor backed by `pdf-extract`.
///
/// Table and image content is not recognized separately; everything the
/// parser yields is tagged [`ContentKind::Text`].
pub struct PdfExtractor;

impl ChunkExtractor for PdfExtractor {
    fn extract(&self, path: &Path, config: &ChunkingConfig) -> Result<Vec<DocChunk>, ExtractError> {
        let bytes = std::fs::read(path).map_err(|e| ExtractError::Io(e.to_string()))?;
        let text = pdf_extract::extract_text_from_mem(&bytes)
            .map_err(|e| ExtractError::Pdf(e.to_string()))?;

        let chunks = split_text(&text, config.max_chars, config.overlap_chars)
            .into_iter()
            .enumerate()
            .map(|(i, body)| DocChunk {
                element_id: format!("element_{}", i),
                kind: ContentKind::Text,
                body,
            })
            .collect();

        Ok(chunks)
    }
}

/// Split text into chunks of at most roughly `max_chars` characters.
///
/// Splitting happens on `\n\n` paragraph boundaries when possible; a single
/// paragraph longer than `max_chars` is hard-split at the nearest newline or
/// space. Each chunk after the first is seeded with the last
/// `overlap_chars` of its predecessor so no boundary loses context.
///
/// Guarantees:
/// - At least one chunk is returned, even for empty text.
/// - The split never lands inside a UTF-8 code point.
pub fn split_text(text: &str, max_chars: usize, overlap_chars: usize) -> Vec<String> {
    if text.trim().is_empty() {
        return vec![String::new()];
    }

    let mut chunks: Vec<String> = Vec::new();
    let mut buf = String::new();
    // Whether buf holds anything beyond the overlap seed.
    let mut buf_has_new = false;

    for para in text.split("\n\n") {
        let trimmed = para.trim();
        if trimmed.is_empty() {
            continue;
        }

        let would_be = if buf.is_empty() {
            trimmed.len()
        } else {
            buf.len() + 2 + trimmed.len()
        };

        if would_be > max_chars && buf_has_new {
            chunks.push(std::mem::take(&mut buf));
            buf = tail_overlap(chunks.last().unwrap(), overlap_chars);
            buf_has_new = false;
        }

        if trimmed.len() > max_chars {
            if buf_has_new {
                chunks.push(std::mem::take(&mut buf));
            }
            buf.clear();
            buf_has_new = false;
            hard_split(trimmed, max_chars, overlap_chars, &mut chunks);
        } else {
            if !buf.is_empty() {
                buf.push_str("\n\n");
            }
            buf.push_str(trimmed);
            buf_has_new = true;
        }
    }

    if buf_has_new {
        chunks.push(buf);
    }

    if chunks.is_empty() {
        chunks.push(text.trim().to_string());
    }

    chunks
}

/// Break an oversized paragraph into pieces, carrying overlap between them.
fn hard_split(paragraph: &str, max_chars: usize, overlap_chars: usize, chunks: &mut Vec<String>) {
    let mut carry = String::new();
    let mut remaining = paragraph;

    while !remaining.is_empty() {
        let budget = max_chars.saturating_sub(carry.len()).max(1);
        let mut split_at = snap_to_char_boundary(remaining, remaining.len().min(budget));
        if split_at < remaining.len() {
            // Prefer a newline or space boundary inside the budget.
            if let Some(pos) = remaining[..split_at]
                .rfind('\n')
                .or_else(|| remaining[..split_at].rfind(' '))
            {
                if pos > 0 {
                    split_at = pos + 1;
                }
            }
        }
        if split_at == 0 {
            split_at = remaining
                .char_indices()
                .nth(1)
                .map(|(i, _)| i)
                .unwrap_or(remaining.len());
        }

        let piece = &remaining[..split_at];
        remaining = &remaining[split_at..];

        if piece.trim().is_empty() {
            continue;
        }

        let mut chunk = carry;
        chunk.push_str(piece.trim_end());
        carry = tail_overlap(&chunk, overlap_chars);
        chunks.push(chunk);
    }
}

/// The last `n` characters of `s`, snapped to a char boundary.
fn tail_overlap(s: &str, n: usize) -> String {
    if n == 0 || s.is_empty() {
        return String::new();
    }
    let start = s.len().saturating_sub(n);
    let start = ceil_char_boundary(s, start);
    s[start..].to_string()
}

fn snap_to_char_boundary(s: &str, index: usize) -> usize {
    if index >= s.len() {
        return s.len();
    }
    let mut i = index;
    while i > 0 && !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

fn ceil_char_boundary(s: &str, index: usize) -> usize {
    let mut i = index;
    while i < s.len() && !s.is_char_boundary(i) {
        i += 1;
    }
    i
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_text_single_chunk() {
        let chunks = split_text("Hello, world!", 1600, 200);
        assert_eq!(chunks, vec!["Hello, world!".to_string()]);
    }

    #[test]
    fn empty_text_yields_one_empty_chunk() {
        let chunks = split_text("", 1600, 200);
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].is_empty());
    }

    #[test]
    fn paragraphs_group_under_limit() {
        let text = "First paragraph.\n\nSecond paragraph.\n\nThird paragraph.";
        let chunks = split_text(text, 1600, 0);
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].contains("First paragraph."));
        assert!(chunks[0].contains("Third paragraph."));
    }

    #[test]
    fn paragraphs_split_over_limit() {
        let text = "This is paragraph one.\n\nThis is paragraph two.\n\nThis is paragraph three.";
        let chunks = split_text(text, 30, 0);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(!chunk.is_empty());
        }
    }

    #[test]
    fn overlap_carries_trailing_context() {
        let text = "alpha bravo charlie.\n\ndelta echo foxtrot.";
        let chunks = split_text(text, 24, 8);
        assert!(chunks.len() >= 2);
        let tail: String = {
            let first = &chunks[0];
            let start = first.len().saturating_sub(8);
            first[start..].to_string()
        };
        assert!(chunks[1].starts_with(&tail));
    }

    #[test]
    fn oversized_paragraph_hard_splits() {
        let word = "verylongword ".repeat(40);
        let chunks = split_text(&word, 50, 0);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.len() <= 50 + 13, "chunk too long: {}", chunk.len());
        }
    }

    #[test]
    fn multibyte_text_never_splits_inside_codepoint() {
        let text = "┌──────────┐ ".repeat(20);
        let chunks = split_text(&text, 16, 4);
        assert!(!chunks.is_empty());
        // Reaching here without a panic means every slice landed on a boundary.
        for chunk in &chunks {
            assert!(chunk.chars().count() > 0);
        }
    }

    #[test]
    fn deterministic() {
        let text = "Alpha\n\nBeta\n\nGamma\n\nDelta";
        assert_eq!(split_text(text, 12, 4), split_text(text, 12, 4));
    }

    #[test]
    fn invalid_pdf_reports_extract_error() {
        use std::fs;
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("corrupt.pdf");
        fs::write(&path, b"not a pdf at all").unwrap();

        let err = PdfExtractor
            .extract(&path, &crate::config::ChunkingConfig::default())
            .unwrap_err();
        assert!(matches!(err, ExtractError::Pdf(_)));
    }

    #[test]
    fn missing_file_reports_io_error() {
        let tmp = tempfile::TempDir::new().unwrap();
        let err = PdfExtractor
            .extract(
                &tmp.path().join("gone.pdf"),
                &crate::config::ChunkingConfig::default(),
            )
            .unwrap_err();
        assert!(matches!(err, ExtractError::Io(_)));
    }
}
