//! Canonical path handling.
//!
//! Every file is identified throughout the pipeline by a single canonical
//! string: absolute, with `.` segments dropped and `..` segments collapsed.
//! All index `source` metadata and all comparisons use this form, so the
//! same physical file never appears under two spellings.
//!
//! Symlinks are deliberately not resolved: canonicalization is lexical, the
//! same policy as plain absolute-path normalization. Case is preserved as
//! given; case-insensitive filesystems may therefore index the same file
//! twice if it is referenced with differing case.

use std::path::{Component, Path, PathBuf};

/// Canonicalize a path into the pipeline's identity string.
///
/// Relative paths are joined against the current working directory. The
/// result is lexically normalized; the file does not need to exist.
pub fn normalize(path: &Path) -> std::io::Result<String> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };

    Ok(lexical_normalize(&absolute).display().to_string())
}

/// Collapse `.` and `..` components without touching the filesystem.
///
/// A `..` at the root stays at the root (`/..` is `/`).
fn lexical_normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                // Never pop past the root or drive prefix.
                if !matches!(
                    out.components().next_back(),
                    None | Some(Component::RootDir) | Some(Component::Prefix(_))
                ) {
                    out.pop();
                }
            }
            other => out.push(other),
        }
    }
    out
}
