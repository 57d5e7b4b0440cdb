//! Cache command - inspect or remove the fingerprint cache of a repository

use super::CacheAction;
use crate::cache::{get_cache_dir, get_store_path, FingerprintCache};
use crate::config::load_project_config;
use crate::gate::{EXIT_ERROR, EXIT_PASS};
use crate::pipeline::validate_root;

use anyhow::Result;
use console::style;
use std::path::{Path, PathBuf};

fn cache_dir_for(root: &Path) -> Result<PathBuf> {
    let config = load_project_config(root)?;
    Ok(config.cache.dir.unwrap_or_else(|| get_cache_dir(root)))
}

pub(super) fn run(path: &Path, action: CacheAction) -> Result<u8> {
    let root = match validate_root(path) {
        Ok(root) => root,
        Err(e) => {
            eprintln!("Error: {}", e);
            return Ok(EXIT_ERROR);
        }
    };
    let dir = cache_dir_for(&root)?;
    let cache = FingerprintCache::open(&dir);

    match action {
        CacheAction::Clear => {
            let entries = cache.len();
            cache.clear()?;
            println!(
                "{} Cleared {} cached file(s) for {}",
                style("✓").green(),
                entries,
                root.display()
            );
        }
        CacheAction::Stats => {
            let store = get_store_path(&dir);
            let size = std::fs::metadata(&store).map(|m| m.len()).unwrap_or(0);
            println!("Cache store: {}", style(store.display()).cyan());
            println!("Entries:     {}", cache.len());
            println!("Size:        {} bytes", size);
            let discarded = cache.stats().discarded_entries;
            if discarded > 0 {
                println!(
                    "{} {} unreadable entries will be rebuilt on the next scan",
                    style("!").yellow(),
                    discarded
                );
            }
        }
    }

    Ok(EXIT_PASS)
}
