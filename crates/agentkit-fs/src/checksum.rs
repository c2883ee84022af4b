//! SHA-256 fingerprints for local plugin sources
//!
//! All checksums use the canonical format `sha256:<hex>`. A directory
//! fingerprint covers only tracked source files, ordered by their
//! forward-slash relative path, so it is independent of traversal order and
//! of files that are not plugin source (docs, editor state, build output).

use sha2::{Digest, Sha256};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::NormalizedPath;

/// Prefix for all checksums produced by this module
const PREFIX: &str = "sha256:";

/// File extensions that contribute to a directory fingerprint.
pub const TRACKED_EXTENSIONS: &[&str] = &[
    "toml", "json", "yaml", "yml", "py", "rs", "js", "ts", "wasm",
];

/// Directory names never descended into.
const SKIPPED_DIRS: &[&str] = &["target", "node_modules", "__pycache__"];

/// Compute the SHA-256 checksum of raw content.
///
/// Returns a string in the canonical format `"sha256:<hex>"`.
pub fn compute_content_checksum(content: impl AsRef<[u8]>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_ref());
    format!("{}{:x}", PREFIX, hasher.finalize())
}

/// Compute the SHA-256 checksum of a file's contents.
///
/// # Errors
///
/// Returns an error if the file cannot be read.
pub fn compute_file_checksum(path: &Path) -> io::Result<String> {
    let content = fs::read(path)?;
    Ok(compute_content_checksum(content))
}

/// Whether a file takes part in directory fingerprints.
pub fn is_tracked(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            TRACKED_EXTENSIONS
                .iter()
                .any(|tracked| tracked.eq_ignore_ascii_case(ext))
        })
}

/// Collect every tracked file below `root`, sorted by relative path.
pub fn tracked_files(root: &Path) -> io::Result<Vec<(NormalizedPath, PathBuf)>> {
    let mut files = Vec::new();
    collect(root, root, &mut files)?;
    files.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(files)
}

fn collect(
    root: &Path,
    dir: &Path,
    files: &mut Vec<(NormalizedPath, PathBuf)>,
) -> io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with('.') {
            continue;
        }

        let path = entry.path();
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            if SKIPPED_DIRS.contains(&name.as_ref()) {
                continue;
            }
            collect(root, &path, files)?;
        } else if (file_type.is_file() || (file_type.is_symlink() && path.is_file()))
            && is_tracked(&path)
            && let Some(rel) = NormalizedPath::relative(root, &path)
        {
            files.push((rel, path));
        }
        // Symlinked directories are not followed.
    }
    Ok(())
}

/// Compute the composite checksum of all tracked files below `root`.
///
/// Each file contributes its relative path and its content, both
/// length-prefixed, in relative-path order.
///
/// # Errors
///
/// Returns an error if the tree cannot be walked or a file cannot be read.
pub fn compute_tree_checksum(root: &Path) -> io::Result<String> {
    let mut hasher = Sha256::new();
    for (rel, path) in tracked_files(root)? {
        let content = fs::read(&path)?;
        hasher.update((rel.as_str().len() as u64).to_le_bytes());
        hasher.update(rel.as_str().as_bytes());
        hasher.update((content.len() as u64).to_le_bytes());
        hasher.update(&content);
    }
    Ok(format!("{}{:x}", PREFIX, hasher.finalize()))
}

/// Fingerprint a local plugin source, file or directory.
///
/// Never fails: any I/O problem is logged and yields an empty string, which
/// callers treat as "unknown, assume a change".
pub fn fingerprint_path(path: &Path) -> String {
    let result = if path.is_file() {
        compute_file_checksum(path)
    } else if path.is_dir() {
        compute_tree_checksum(path)
    } else {
        tracing::warn!(path = %path.display(), "Cannot fingerprint missing path");
        return String::new();
    };

    match result {
        Ok(checksum) => {
            tracing::debug!(path = %path.display(), %checksum, "Computed fingerprint");
            checksum
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Failed to fingerprint path");
            String::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_checksum_has_prefix() {
        let checksum = compute_content_checksum("hello world");
        assert!(checksum.starts_with("sha256:"));
    }

    #[test]
    fn content_checksum_known_value() {
        let checksum = compute_content_checksum("hello world");
        assert_eq!(
            checksum,
            "sha256:b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn file_checksum_matches_content_checksum() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plugin.toml");
        std::fs::write(&path, "hello world").unwrap();

        let file_cs = compute_file_checksum(&path).unwrap();
        assert_eq!(file_cs, compute_content_checksum("hello world"));
    }

    #[test]
    fn tracked_extensions_are_case_insensitive() {
        assert!(is_tracked(Path::new("a/Plugin.TOML")));
        assert!(is_tracked(Path::new("main.py")));
        assert!(!is_tracked(Path::new("README.md")));
        assert!(!is_tracked(Path::new("Makefile")));
    }

    #[test]
    fn missing_path_fingerprint_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(fingerprint_path(&dir.path().join("absent")), "");
    }

    #[test]
    fn empty_directory_has_stable_fingerprint() {
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();
        let fa = fingerprint_path(a.path());
        assert!(!fa.is_empty());
        assert_eq!(fa, fingerprint_path(b.path()));
    }
}
