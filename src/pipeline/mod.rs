//! Scan pipeline
//!
//! Runs one scan of a tree, start to finish:
//! 1. Validate the root and walk it under the ignore rules
//! 2. Classify every file, serving unchanged files from the fingerprint cache
//! 3. Run the registered extractors
//! 4. Rank hotspots and aggregate everything into an [`AnalysisResult`]
//! 5. Score the result
//!
//! Stages run one after another; only per-file classification and the
//! extractors fan out over the rayon pool. Every counter lives on the
//! [`ScanSession`], so two sessions never share state.

use crate::aggregate::Aggregator;
use crate::cache::{get_cache_dir, CacheStats, FingerprintCache};
use crate::error::{ScanError, ScanResult};
use crate::extractors::{
    default_extractors, git::DEFAULT_MAX_COMMITS, repo_name, ExtractionContext, ExtractorOptions,
    ExtractorRegistry, TestIndex,
};
use crate::hotspots::{HotspotScorer, DEFAULT_TOP_K};
use crate::models::{AnalysisResult, FileRecord, GitSummary, HealthScore};
use crate::scoring::ScoringEngine;
use crate::walker::{self, DiscoveredFile, IgnoreRules};

use chrono::{DateTime, Utc};
use indicatif::ProgressBar;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Knobs for one scan
#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub use_cache: bool,
    /// Drop the stored cache before scanning
    pub clear_cache: bool,
    /// Overrides the per-root cache directory
    pub cache_dir: Option<PathBuf>,
    pub git_enabled: bool,
    pub max_commits: usize,
    /// Worker threads; `None` uses available parallelism
    pub workers: Option<usize>,
    pub top_k: usize,
    /// Extra gitignore-style exclusions
    pub exclude: Vec<String>,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            use_cache: true,
            clear_cache: false,
            cache_dir: None,
            git_enabled: true,
            max_commits: DEFAULT_MAX_COMMITS,
            workers: None,
            top_k: DEFAULT_TOP_K,
            exclude: Vec::new(),
        }
    }
}

/// Everything one scan produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanReport {
    pub repo_name: String,
    pub analysis: AnalysisResult,
    pub health: HealthScore,
    pub cache: CacheStats,
    /// Sorted
    pub warnings: Vec<String>,
    pub scan_duration_secs: f64,
}

enum FileOutcome {
    Classified(FileRecord),
    Skipped(String),
    Cancelled,
}

/// One scan of one root
pub struct ScanSession {
    root: PathBuf,
    options: ScanOptions,
    cache: FingerprintCache,
    cancel: Arc<AtomicBool>,
    deadline: Option<Instant>,
    progress: Option<ProgressBar>,
    reference_time: DateTime<Utc>,
}

impl ScanSession {
    /// Validate `root` and open its cache.
    ///
    /// A missing or non-directory root is a [`ScanError::Path`]; nothing is
    /// read or written in that case.
    pub fn new(root: &Path, options: ScanOptions) -> ScanResult<Self> {
        let root = validate_root(root)?;
        let dir = options
            .cache_dir
            .clone()
            .unwrap_or_else(|| get_cache_dir(&root));

        // Cleared even when this scan runs without the cache
        if options.clear_cache {
            if let Err(e) = FingerprintCache::open(&dir).clear() {
                warn!("Failed to clear cache: {:#}", e);
            }
        }

        let cache = if options.use_cache {
            FingerprintCache::open(&dir)
        } else {
            FingerprintCache::disabled()
        };

        Ok(Self {
            root,
            options,
            cache,
            cancel: Arc::new(AtomicBool::new(false)),
            deadline: None,
            progress: None,
            reference_time: Utc::now(),
        })
    }

    /// Report per-file progress on `bar`.
    pub fn with_progress(mut self, bar: ProgressBar) -> Self {
        self.progress = Some(bar);
        self
    }

    /// Pin the time "days since last commit" is measured against.
    pub fn with_reference_time(mut self, reference_time: DateTime<Utc>) -> Self {
        self.reference_time = reference_time;
        self
    }

    /// Cancel the scan once `timeout` has elapsed from now.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Instant::now().checked_add(timeout);
        self
    }

    /// Flag that stops the scan at the next file boundary once set
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
            || self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }

    /// Keep what was already cached and report the cancellation
    fn cancelled(&self, completed: usize, total: usize) -> ScanError {
        // Entries already written are complete
        if let Err(e) = self.cache.save() {
            warn!("Failed to save cache: {:#}", e);
        }
        ScanError::Cancelled { completed, total }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn cache(&self) -> &FingerprintCache {
        &self.cache
    }

    /// Run the whole pipeline.
    pub fn run(&self) -> ScanResult<ScanReport> {
        let start = Instant::now();
        let mut warnings = Vec::new();

        let pool = build_pool(self.options.workers)?;

        let rules = IgnoreRules::default().with_patterns(self.options.exclude.iter().cloned());
        let walk = walker::discover(&self.root, &rules)?;
        warnings.extend(walk.warnings);
        warnings.extend(self.cache.corruption().iter().map(|e| format!("cache: {}", e)));
        info!("Scanning {} files in {}", walk.files.len(), self.root.display());

        let records = pool.install(|| self.classify_all(walk.files, &mut warnings))?;

        let ctx = ExtractionContext {
            root: &self.root,
            files: &records,
            reference_time: self.reference_time,
        };
        let mut registry = ExtractorRegistry::new();
        registry.register_all(default_extractors(&ExtractorOptions {
            git_enabled: self.options.git_enabled,
            max_commits: self.options.max_commits,
        }));

        let results = pool.install(|| registry.run(&ctx));
        if self.is_cancelled() {
            return Err(self.cancelled(records.len(), records.len()));
        }

        let mut aggregator = Aggregator::new();
        for result in results {
            if let Some(error) = result.error {
                warnings.push(format!("{}: {}", result.extractor_name, error));
            }
            if let Some(metrics) = result.metrics {
                aggregator.absorb(metrics);
            }
        }

        let tests = TestIndex::build(&records);
        let ranking = HotspotScorer::new(self.options.top_k).rank(&records, &tests);
        let analysis = aggregator.finish(&records, ranking);

        if self.options.git_enabled {
            if let GitSummary::Unknown { reason } = &analysis.git {
                warnings.push(format!("git: {}", reason));
            }
        }

        let health = ScoringEngine::new().score(&analysis);
        debug!("Overall {} ({})", health.overall, health.grade);

        self.cache.retain_paths(records.iter().map(|r| r.rel_path.as_str()));
        if let Err(e) = self.cache.save() {
            warn!("Failed to save cache: {:#}", e);
            warnings.push(format!("cache not saved: {:#}", e));
        }

        warnings.sort();

        Ok(ScanReport {
            repo_name: repo_name(&self.root, self.options.git_enabled),
            analysis,
            health,
            cache: self.cache.stats(),
            warnings,
            scan_duration_secs: start.elapsed().as_secs_f64(),
        })
    }

    /// Classify every file on the current pool.
    ///
    /// Output stays in walk order. Unreadable files become warnings.
    fn classify_all(
        &self,
        files: Vec<DiscoveredFile>,
        warnings: &mut Vec<String>,
    ) -> ScanResult<Vec<FileRecord>> {
        let total = files.len();
        let completed = AtomicUsize::new(0);
        if let Some(bar) = &self.progress {
            bar.set_length(total as u64);
        }

        let outcomes: Vec<FileOutcome> = files
            .into_par_iter()
            .map(|file| {
                if self.is_cancelled() {
                    return FileOutcome::Cancelled;
                }
                let outcome = self.classify_one(file);
                completed.fetch_add(1, Ordering::Relaxed);
                if let Some(bar) = &self.progress {
                    bar.inc(1);
                }
                outcome
            })
            .collect();

        if let Some(bar) = &self.progress {
            bar.finish_and_clear();
        }

        let mut records = Vec::with_capacity(outcomes.len());
        let mut cancelled = false;
        for outcome in outcomes {
            match outcome {
                FileOutcome::Classified(record) => records.push(record),
                FileOutcome::Skipped(reason) => warnings.push(reason),
                FileOutcome::Cancelled => cancelled = true,
            }
        }

        if cancelled {
            return Err(self.cancelled(completed.load(Ordering::Relaxed), total));
        }

        Ok(records)
    }

    fn classify_one(&self, file: DiscoveredFile) -> FileOutcome {
        let fingerprint = file.fingerprint();
        if let Some(metrics) = self.cache.get(&fingerprint) {
            return FileOutcome::Classified(file.into_record(metrics));
        }

        let start = Instant::now();
        match walker::classify(&file) {
            Ok(metrics) => {
                self.cache.record_extraction(start.elapsed());
                // Only a fully classified file reaches the cache
                self.cache.put(fingerprint, metrics.clone());
                FileOutcome::Classified(file.into_record(metrics))
            }
            Err(e) => {
                warn!("{}", e);
                FileOutcome::Skipped(format!("skipped {}: {}", file.rel_path, e))
            }
        }
    }
}

/// Canonical form of a usable scan root
pub fn validate_root(root: &Path) -> ScanResult<PathBuf> {
    let metadata = std::fs::metadata(root)
        .map_err(|e| ScanError::path(root, format!("cannot access: {}", e)))?;
    if !metadata.is_dir() {
        return Err(ScanError::path(root, "not a directory"));
    }
    root.canonicalize()
        .map_err(|e| ScanError::path(root, format!("cannot resolve: {}", e)))
}

fn build_pool(workers: Option<usize>) -> ScanResult<rayon::ThreadPool> {
    let threads = workers.filter(|&n| n > 0).unwrap_or_else(|| {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    });
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .map_err(|e| ScanError::Io(std::io::Error::other(e.to_string())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::get_store_path;
    use std::fs;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn sample_tree() -> TempDir {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "src/app.py", &"x = 1\n".repeat(250));
        write(tmp.path(), "src/util.py", "def f():\n    return 1\n");
        write(tmp.path(), "tests/test_util.py", "def test_f():\n    pass\n");
        write(tmp.path(), "requirements.txt", "requests>=2\nflask\n");
        tmp
    }

    fn options(cache_dir: &Path) -> ScanOptions {
        ScanOptions {
            cache_dir: Some(cache_dir.to_path_buf()),
            git_enabled: false,
            workers: Some(2),
            ..ScanOptions::default()
        }
    }

    #[test]
    fn test_missing_root_is_path_error() {
        let tmp = TempDir::new().unwrap();
        let err = ScanSession::new(&tmp.path().join("nope"), ScanOptions::default())
            .err()
            .unwrap();
        assert!(matches!(err, ScanError::Path { .. }));
    }

    #[test]
    fn test_file_root_is_path_error() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "a.txt", "hi\n");
        let err = validate_root(&tmp.path().join("a.txt")).unwrap_err();
        assert!(err.to_string().contains("not a directory"));
    }

    #[test]
    fn test_scan_collects_every_dimension() {
        let tree = sample_tree();
        let cache = TempDir::new().unwrap();
        let report = ScanSession::new(tree.path(), options(cache.path()))
            .unwrap()
            .run()
            .unwrap();

        assert_eq!(report.analysis.total_files, 4);
        assert_eq!(report.analysis.total_lines, 256);
        assert!(report.analysis.complexity.is_some());
        assert_eq!(report.analysis.dependencies.len(), 1);
        assert!(report.analysis.tests.as_ref().unwrap().has_tests);
        assert!(!report.analysis.git.is_known());
        assert!(report.health.breakdown.git_activity.is_none());
        assert_eq!(report.analysis.hotspots[0].file_path, "src/app.py");
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn test_second_scan_hits_cache_with_same_result() {
        let tree = sample_tree();
        let cache = TempDir::new().unwrap();

        let first = ScanSession::new(tree.path(), options(cache.path()))
            .unwrap()
            .run()
            .unwrap();
        assert_eq!(first.cache.hits, 0);
        assert_eq!(first.cache.misses, 4);

        let second = ScanSession::new(tree.path(), options(cache.path()))
            .unwrap()
            .run()
            .unwrap();
        assert_eq!(second.cache.hits, 4);
        assert_eq!(second.cache.misses, 0);
        assert_eq!(first.analysis, second.analysis);
        assert_eq!(first.health, second.health);
    }

    #[test]
    fn test_changed_file_misses() {
        let tree = sample_tree();
        let cache = TempDir::new().unwrap();
        ScanSession::new(tree.path(), options(cache.path()))
            .unwrap()
            .run()
            .unwrap();

        // Size change alone must invalidate
        write(tree.path(), "src/util.py", "def f():\n    return 1\n\n\n");
        let report = ScanSession::new(tree.path(), options(cache.path()))
            .unwrap()
            .run()
            .unwrap();
        assert_eq!(report.cache.hits, 3);
        assert_eq!(report.cache.misses, 1);
        assert_eq!(report.analysis.total_lines, 258);
    }

    #[test]
    fn test_disabled_cache_never_hits() {
        let tree = sample_tree();
        let opts = ScanOptions {
            use_cache: false,
            git_enabled: false,
            ..ScanOptions::default()
        };
        for _ in 0..2 {
            let report = ScanSession::new(tree.path(), opts.clone())
                .unwrap()
                .run()
                .unwrap();
            assert_eq!(report.cache.hits, 0);
            assert_eq!(report.cache.misses, 4);
            assert!(!report.cache.enabled);
        }
    }

    #[test]
    fn test_worker_count_does_not_change_result() {
        let tree = sample_tree();
        let cache = TempDir::new().unwrap();
        let mut single = options(cache.path());
        single.use_cache = false;
        single.workers = Some(1);
        let mut many = single.clone();
        many.workers = Some(8);

        let a = ScanSession::new(tree.path(), single).unwrap().run().unwrap();
        let b = ScanSession::new(tree.path(), many).unwrap().run().unwrap();
        assert_eq!(a.analysis, b.analysis);
        assert_eq!(a.health, b.health);
    }

    #[test]
    fn test_warm_parallel_scan_matches_cold_sequential_scan() {
        let tree = sample_tree();
        let cache = TempDir::new().unwrap();
        let mut sequential = options(cache.path());
        sequential.workers = Some(1);
        let mut parallel = options(cache.path());
        parallel.workers = Some(8);

        let cold = ScanSession::new(tree.path(), sequential)
            .unwrap()
            .run()
            .unwrap();
        let warm = ScanSession::new(tree.path(), parallel)
            .unwrap()
            .run()
            .unwrap();

        assert_eq!(cold.cache.hits, 0);
        assert_eq!(warm.cache.hits, 4);
        assert_eq!(cold.analysis, warm.analysis);
        assert_eq!(cold.health, warm.health);
        assert_eq!(cold.warnings, warm.warnings);
    }

    #[test]
    fn test_file_removed_after_walk_is_skipped_with_warning() {
        let tree = sample_tree();
        let cache = TempDir::new().unwrap();
        let session = ScanSession::new(tree.path(), options(cache.path())).unwrap();
        let walk = walker::discover(session.root(), &IgnoreRules::default()).unwrap();
        assert_eq!(walk.files.len(), 4);

        fs::remove_file(tree.path().join("src/util.py")).unwrap();
        let mut warnings = Vec::new();
        let records = session.classify_all(walk.files, &mut warnings).unwrap();

        assert_eq!(records.len(), 3);
        assert!(records.iter().all(|r| r.rel_path != "src/util.py"));
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].starts_with("skipped src/util.py"));
        // Only fully classified files are cached
        assert_eq!(session.cache().len(), 3);
    }

    #[test]
    fn test_corrupt_store_is_reported_and_rebuilt() {
        let tree = sample_tree();
        let cache = TempDir::new().unwrap();
        fs::write(get_store_path(cache.path()), "{not json").unwrap();

        let first = ScanSession::new(tree.path(), options(cache.path()))
            .unwrap()
            .run()
            .unwrap();
        assert_eq!(first.cache.misses, 4);
        assert_eq!(first.warnings.len(), 1);
        assert!(first.warnings[0].starts_with("cache: Discarded cache data"));

        let second = ScanSession::new(tree.path(), options(cache.path()))
            .unwrap()
            .run()
            .unwrap();
        assert_eq!(second.cache.hits, 4);
        assert!(second.warnings.is_empty());
    }

    #[test]
    fn test_clear_cache_applies_without_cache() {
        let tree = sample_tree();
        let cache = TempDir::new().unwrap();
        ScanSession::new(tree.path(), options(cache.path()))
            .unwrap()
            .run()
            .unwrap();
        assert!(get_store_path(cache.path()).exists());

        let mut clearing = options(cache.path());
        clearing.use_cache = false;
        clearing.clear_cache = true;
        ScanSession::new(tree.path(), clearing)
            .unwrap()
            .run()
            .unwrap();
        assert!(!get_store_path(cache.path()).exists());

        let report = ScanSession::new(tree.path(), options(cache.path()))
            .unwrap()
            .run()
            .unwrap();
        assert_eq!(report.cache.hits, 0);
    }

    #[test]
    fn test_elapsed_timeout_cancels_without_score() {
        let tree = sample_tree();
        let cache = TempDir::new().unwrap();
        let session = ScanSession::new(tree.path(), options(cache.path()))
            .unwrap()
            .with_timeout(Duration::ZERO);

        assert!(matches!(
            session.run(),
            Err(ScanError::Cancelled { total: 4, .. })
        ));
    }

    #[test]
    fn test_cancelled_scan_reports_progress() {
        let tree = sample_tree();
        let cache = TempDir::new().unwrap();
        let session = ScanSession::new(tree.path(), options(cache.path())).unwrap();
        session.cancel_handle().store(true, Ordering::SeqCst);

        match session.run() {
            Err(ScanError::Cancelled { completed, total }) => {
                assert_eq!(completed, 0);
                assert_eq!(total, 4);
            }
            other => panic!("expected cancellation, got {:?}", other.map(|r| r.health)),
        }
    }

    #[test]
    fn test_exclude_patterns_apply() {
        let tree = sample_tree();
        let cache = TempDir::new().unwrap();
        let mut opts = options(cache.path());
        opts.exclude = vec!["tests/".to_string()];
        let report = ScanSession::new(tree.path(), opts).unwrap().run().unwrap();
        assert_eq!(report.analysis.total_files, 3);
        assert!(!report.analysis.tests.unwrap().has_tests);
    }
}
