//! Content fingerprinting for change detection.
//!
//! A file's identity for dedup purposes is the SHA-256 of its bytes. The
//! digest changes iff the content changes, so a matching `(source, hash)`
//! pair in the index means the file can be skipped without re-extraction.

use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Read size per iteration. Bounds memory use regardless of file size.
const HASH_BUF_SIZE: usize = 4096;

/// Compute the lowercase hex SHA-256 digest of a file's content.
///
/// Streams the file in fixed-size reads. An IO failure (permissions, file
/// vanished mid-read) is returned to the caller, which treats it as
/// "cannot process this file now" rather than a fatal condition.
pub fn hash_file(path: &Path) -> std::io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; HASH_BUF_SIZE];

    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(hex::encode(hasher.finalize()))
}
