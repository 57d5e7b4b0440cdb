//! Cache path utilities - uses ~/.cache/healthscan/<repo-hash>/ so scans never write into the tree

use std::path::{Path, PathBuf};

/// File holding the fingerprint store inside a cache directory
pub const FINGERPRINT_STORE: &str = "fingerprints.json";

/// Get the cache directory for a repository root.
/// Uses ~/.cache/healthscan/<repo-hash>/ on Unix and
/// %LOCALAPPDATA%/healthscan/<repo-hash>/ on Windows.
pub fn get_cache_dir(repo_path: &Path) -> PathBuf {
    let repo_hash = hash_path(repo_path);

    let base = if cfg!(windows) {
        std::env::var("LOCALAPPDATA")
            .map(PathBuf::from)
            .unwrap_or_else(|_| dirs::cache_dir().unwrap_or_else(|| PathBuf::from(".")))
    } else {
        dirs::cache_dir().unwrap_or_else(|| {
            // Fallback to ~/.cache
            dirs::home_dir()
                .map(|h| h.join(".cache"))
                .unwrap_or_else(|| PathBuf::from("."))
        })
    };

    base.join("healthscan").join(&repo_hash)
}

/// Get the fingerprint store path inside a cache directory.
pub fn get_store_path(cache_dir: &Path) -> PathBuf {
    cache_dir.join(FINGERPRINT_STORE)
}

/// Hash a path to create a unique but deterministic directory name.
/// xxh3 is stable across toolchains, unlike `DefaultHasher`.
fn hash_path(path: &Path) -> String {
    let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    let path_str = canonical.to_string_lossy();

    let hash = xxhash_rust::xxh3::xxh3_64(path_str.as_bytes());

    // Use canonical path's file_name for consistent naming (important when path is ".")
    let repo_name = canonical
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("repo")
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '-' || *c == '_')
        .take(20)
        .collect::<String>();

    format!("{}-{:012x}", repo_name, hash & 0xffff_ffff_ffff)
}
