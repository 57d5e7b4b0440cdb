//! Fingerprint cache for per-file metrics
//!
//! Maps a file's `(path, size, mtime)` fingerprint to the metrics computed the
//! last time that exact fingerprint was seen. A lookup only hits when the
//! stored fingerprint is identical to the current one, so a file whose size or
//! modification time changed is always re-extracted.
//!
//! The store is persisted per repository root as versioned JSON. A store with
//! a different format version is discarded wholesale; an individual entry that
//! fails to deserialize is dropped and behaves as a miss. Neither is fatal;
//! both are kept as [`ScanError::CacheCorruption`] for the scan's warnings.
//!
//! Hit/miss counters live on the instance, and one instance is opened per
//! scan, so concurrent scans in tests never share counters.

pub mod paths;

pub use paths::{get_cache_dir, get_store_path};

use crate::error::ScanError;
use crate::models::FileMetrics;

use anyhow::{Context, Result};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Cache format version - bump when the entry schema changes
pub const CACHE_VERSION: u32 = 1;

/// Assumed extraction cost per file before any miss has been timed (0.1ms)
const FALLBACK_EXTRACTION_NS: u64 = 100_000;

/// Identity of a file's cacheable state
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint {
    /// Path relative to the repository root
    pub path: String,
    pub size: u64,
    pub mtime_ns: i64,
}

/// A stored fingerprint with the metrics computed for it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub fingerprint: Fingerprint,
    pub metrics: FileMetrics,
}

/// On-disk layout. Entries stay as raw JSON until validated one by one.
#[derive(Debug, Serialize, Deserialize)]
struct StoreFile {
    version: u32,
    entries: BTreeMap<String, serde_json::Value>,
}

/// Cache performance for one scan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    pub enabled: bool,
    pub hits: u64,
    pub misses: u64,
    /// Percentage of lookups served from the cache
    pub hit_rate: f64,
    /// hits × average extraction cost of this scan's misses
    pub time_saved_secs: f64,
    /// Entries currently held
    pub entries: usize,
    /// Stored entries discarded as unreadable when the store was opened
    pub discarded_entries: u64,
}

/// Fingerprint → metrics store with per-scan counters
pub struct FingerprintCache {
    enabled: bool,
    store_path: Option<PathBuf>,
    entries: DashMap<String, CacheEntry>,
    hits: AtomicU64,
    misses: AtomicU64,
    discarded: AtomicU64,
    miss_cost_ns: AtomicU64,
    timed_misses: AtomicU64,
    dirty: AtomicBool,
    /// Serializes persistence
    write_lock: Mutex<()>,
    /// Stored data discarded while opening
    corruption: Vec<ScanError>,
}

impl FingerprintCache {
    /// Open (or start) the store kept in `cache_dir`.
    pub fn open(cache_dir: &Path) -> Self {
        let store_path = get_store_path(cache_dir);
        let mut cache = Self::empty(true, Some(store_path.clone()));

        match cache.load() {
            Ok(issues) => cache.corruption = issues,
            Err(e) => {
                // Unreadable store: start over and overwrite it on save
                let issue = ScanError::cache_corruption(
                    store_path.display().to_string(),
                    format!("{:#}", e),
                );
                warn!("{}, rebuilding", issue);
                cache.entries.clear();
                cache.dirty.store(true, Ordering::SeqCst);
                cache.corruption.push(issue);
            }
        }

        cache
    }

    /// A cache that never hits and never persists.
    pub fn disabled() -> Self {
        Self::empty(false, None)
    }

    fn empty(enabled: bool, store_path: Option<PathBuf>) -> Self {
        Self {
            enabled,
            store_path,
            entries: DashMap::new(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            discarded: AtomicU64::new(0),
            miss_cost_ns: AtomicU64::new(0),
            timed_misses: AtomicU64::new(0),
            dirty: AtomicBool::new(false),
            write_lock: Mutex::new(()),
            corruption: Vec::new(),
        }
    }

    /// Load the store from disk, returning what had to be discarded
    fn load(&self) -> Result<Vec<ScanError>> {
        let mut issues = Vec::new();
        let Some(store_path) = &self.store_path else {
            return Ok(issues);
        };
        if !store_path.exists() {
            debug!("No cache file found at {:?}", store_path);
            return Ok(issues);
        }

        let file = File::open(store_path).context("Failed to open cache file")?;
        let data: StoreFile =
            serde_json::from_reader(BufReader::new(file)).context("Failed to parse cache")?;

        // Version check - rebuild if schema changed
        if data.version != CACHE_VERSION {
            let issue = ScanError::cache_corruption(
                store_path.display().to_string(),
                format!(
                    "format version {}, expected {}",
                    data.version, CACHE_VERSION
                ),
            );
            info!("{}, rebuilding", issue);
            self.dirty.store(true, Ordering::SeqCst);
            issues.push(issue);
            return Ok(issues);
        }

        for (key, raw) in data.entries {
            match serde_json::from_value::<CacheEntry>(raw) {
                Ok(entry) if entry.fingerprint.path == key => {
                    self.entries.insert(key, entry);
                }
                Ok(_) => {
                    debug!("Discarding cache entry {} with mismatched key", key);
                    self.discard_entry();
                    issues.push(ScanError::cache_corruption(key, "stored under the wrong path"));
                }
                Err(e) => {
                    debug!("Discarding unreadable cache entry {}: {}", key, e);
                    self.discard_entry();
                    issues.push(ScanError::cache_corruption(key, e));
                }
            }
        }

        debug!("Loaded cache with {} files", self.entries.len());
        Ok(issues)
    }

    fn discard_entry(&self) {
        self.discarded.fetch_add(1, Ordering::Relaxed);
        self.dirty.store(true, Ordering::SeqCst);
    }

    /// Metrics stored for exactly this fingerprint, or `None` on a miss.
    pub fn get(&self, fingerprint: &Fingerprint) -> Option<FileMetrics> {
        if !self.enabled {
            self.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        }

        let hit = self
            .entries
            .get(&fingerprint.path)
            .filter(|entry| entry.fingerprint == *fingerprint)
            .map(|entry| entry.metrics.clone());

        match hit {
            Some(metrics) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(metrics)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Store metrics for a fingerprint, replacing any previous entry for the path.
    pub fn put(&self, fingerprint: Fingerprint, metrics: FileMetrics) {
        if !self.enabled {
            return;
        }
        let key = fingerprint.path.clone();
        self.entries.insert(
            key,
            CacheEntry {
                fingerprint,
                metrics,
            },
        );
        self.dirty.store(true, Ordering::SeqCst);
    }

    /// Record how long one miss took to extract.
    pub fn record_extraction(&self, elapsed: Duration) {
        let nanos = elapsed.as_nanos().min(u64::MAX as u128) as u64;
        self.miss_cost_ns.fetch_add(nanos, Ordering::Relaxed);
        self.timed_misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Drop entries for paths that are no longer part of the tree.
    pub fn retain_paths<'a>(&self, live: impl IntoIterator<Item = &'a str>) {
        let live: std::collections::HashSet<&str> = live.into_iter().collect();
        let before = self.entries.len();
        self.entries.retain(|path, _| live.contains(path.as_str()));
        if self.entries.len() != before {
            self.dirty.store(true, Ordering::SeqCst);
        }
    }

    /// Remove every entry and delete the persisted store.
    pub fn clear(&self) -> Result<()> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| anyhow::anyhow!("cache write lock poisoned"))?;
        self.entries.clear();
        self.dirty.store(false, Ordering::SeqCst);

        if let Some(store_path) = &self.store_path {
            if store_path.exists() {
                fs::remove_file(store_path)
                    .with_context(|| format!("Failed to delete {}", store_path.display()))?;
                info!("Cache cleared");
            }
        }
        Ok(())
    }

    /// Persist the store if anything changed.
    pub fn save(&self) -> Result<()> {
        if !self.enabled || !self.dirty.load(Ordering::SeqCst) {
            return Ok(());
        }
        let Some(store_path) = &self.store_path else {
            return Ok(());
        };

        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| anyhow::anyhow!("cache write lock poisoned"))?;

        if let Some(dir) = store_path.parent() {
            fs::create_dir_all(dir).context("Failed to create cache directory")?;
        }

        let mut entries = BTreeMap::new();
        for item in self.entries.iter() {
            entries.insert(item.key().clone(), serde_json::to_value(item.value())?);
        }
        let data = StoreFile {
            version: CACHE_VERSION,
            entries,
        };

        // Write to temp file first, then rename (atomic on POSIX)
        let tmp_file = store_path.with_extension("tmp");
        let file = File::create(&tmp_file).context("Failed to create temp cache file")?;
        serde_json::to_writer(BufWriter::new(file), &data).context("Failed to write cache")?;
        fs::rename(&tmp_file, store_path).context("Failed to rename temp cache")?;

        self.dirty.store(false, Ordering::SeqCst);
        debug!("Saved cache with {} files", data.entries.len());
        Ok(())
    }

    /// Stored data this instance discarded when it was opened
    pub fn corruption(&self) -> &[ScanError] {
        &self.corruption
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Counters and derived figures for this scan
    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let lookups = hits + misses;
        let hit_rate = if lookups == 0 {
            0.0
        } else {
            hits as f64 / lookups as f64 * 100.0
        };

        let timed = self.timed_misses.load(Ordering::Relaxed);
        let avg_cost_ns = if timed == 0 {
            FALLBACK_EXTRACTION_NS as f64
        } else {
            self.miss_cost_ns.load(Ordering::Relaxed) as f64 / timed as f64
        };

        CacheStats {
            enabled: self.enabled,
            hits,
            misses,
            hit_rate,
            time_saved_secs: hits as f64 * avg_cost_ns / 1e9,
            entries: self.entries.len(),
            discarded_entries: self.discarded.load(Ordering::Relaxed),
        }
    }
}
