//! Metric extractors
//!
//! Every signal that goes into a report comes from an [`Extractor`]: the
//! complexity summary, one extractor per dependency ecosystem, git activity
//! and the test-coverage heuristic. Extractors are registered in a list and
//! run independently over the same set of file records; adding a new metric
//! means adding a new implementation, not touching the aggregator.

pub mod complexity;
pub mod dependencies;
pub mod git;
pub mod test_coverage;

pub use complexity::ComplexityExtractor;
pub use dependencies::ManifestExtractor;
pub use git::{repo_name, GitExtractor};
pub use test_coverage::{TestCoverageExtractor, TestIndex};

use crate::models::{ComplexitySummary, DependencySummary, FileRecord, GitSummary, TestSummary};

use anyhow::Result;
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};

/// Inputs shared by every extractor in one scan
#[derive(Debug, Clone, Copy)]
pub struct ExtractionContext<'a> {
    pub root: &'a Path,
    /// Sorted by relative path
    pub files: &'a [FileRecord],
    /// Captured once per scan; all "days since" figures are relative to it
    pub reference_time: DateTime<Utc>,
}

impl<'a> ExtractionContext<'a> {
    /// A file directly under the scan root
    pub fn root_file(&self, name: &str) -> Option<&'a FileRecord> {
        self.files.iter().find(|f| f.rel_path == name)
    }
}

/// What one extractor contributes to the analysis
#[derive(Debug, Clone, PartialEq)]
pub enum PartialMetrics {
    Complexity(ComplexitySummary),
    Dependencies(DependencySummary),
    Git(GitSummary),
    Tests(TestSummary),
}

/// A source of partial metrics.
///
/// `Ok(None)` means the extractor had nothing to say about this tree (for
/// example, no manifest for its ecosystem). An `Err` is recorded as a warning
/// and never aborts the scan.
pub trait Extractor: Send + Sync {
    /// Stable identifier, used in logs and warnings
    fn name(&self) -> &'static str;

    fn extract(&self, ctx: &ExtractionContext<'_>) -> Result<Option<PartialMetrics>>;
}

/// Outcome of running a single extractor
#[derive(Debug, Clone)]
pub struct ExtractorResult {
    pub extractor_name: &'static str,
    pub metrics: Option<PartialMetrics>,
    pub error: Option<String>,
}

impl ExtractorResult {
    pub fn success(extractor_name: &'static str, metrics: Option<PartialMetrics>) -> Self {
        Self {
            extractor_name,
            metrics,
            error: None,
        }
    }

    pub fn failure(extractor_name: &'static str, error: String) -> Self {
        Self {
            extractor_name,
            metrics: None,
            error: Some(error),
        }
    }
}

/// Ordered list of extractors run against a scan
#[derive(Default)]
pub struct ExtractorRegistry {
    extractors: Vec<Arc<dyn Extractor>>,
}

impl ExtractorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, extractor: Arc<dyn Extractor>) {
        debug!("Registering extractor: {}", extractor.name());
        self.extractors.push(extractor);
    }

    pub fn register_all(&mut self, extractors: impl IntoIterator<Item = Arc<dyn Extractor>>) {
        for extractor in extractors {
            self.register(extractor);
        }
    }

    /// Run every extractor on the current rayon pool.
    ///
    /// Results come back in registration order whatever order the
    /// extractors finish in.
    pub fn run(&self, ctx: &ExtractionContext<'_>) -> Vec<ExtractorResult> {
        let start = Instant::now();
        let results: Vec<ExtractorResult> = self
            .extractors
            .par_iter()
            .map(|extractor| run_single_extractor(extractor, ctx))
            .collect();

        info!(
            "Ran {} extractors in {:?} ({} failed)",
            results.len(),
            start.elapsed(),
            results.iter().filter(|r| r.error.is_some()).count()
        );
        results
    }
}

/// Run one extractor, turning errors and panics into a failed result
///
/// Panics are only caught when the binary is built with `panic = "unwind"`.
fn run_single_extractor(
    extractor: &Arc<dyn Extractor>,
    ctx: &ExtractionContext<'_>,
) -> ExtractorResult {
    let name = extractor.name();
    let start = Instant::now();

    let outcome =
        std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| extractor.extract(ctx)));
    let duration = start.elapsed().as_millis();

    match outcome {
        Ok(Ok(metrics)) => {
            debug!("Extractor {} finished in {}ms", name, duration);
            ExtractorResult::success(name, metrics)
        }
        Ok(Err(e)) => {
            debug!("Extractor {} failed after {}ms: {:#}", name, duration, e);
            ExtractorResult::failure(name, format!("{:#}", e))
        }
        Err(panic_info) => {
            let panic_msg = if let Some(s) = panic_info.downcast_ref::<&str>() {
                s.to_string()
            } else if let Some(s) = panic_info.downcast_ref::<String>() {
                s.clone()
            } else {
                "Unknown panic".to_string()
            };
            error!("Extractor {} panicked: {}", name, panic_msg);
            ExtractorResult::failure(name, format!("Panic: {}", panic_msg))
        }
    }
}

/// Settings that change which extractors run and how
#[derive(Debug, Clone)]
pub struct ExtractorOptions {
    pub git_enabled: bool,
    pub max_commits: usize,
}

impl Default for ExtractorOptions {
    fn default() -> Self {
        Self {
            git_enabled: true,
            max_commits: git::DEFAULT_MAX_COMMITS,
        }
    }
}

/// The standard extractor set
pub fn default_extractors(options: &ExtractorOptions) -> Vec<Arc<dyn Extractor>> {
    let mut extractors: Vec<Arc<dyn Extractor>> = vec![
        Arc::new(ComplexityExtractor),
        Arc::new(TestCoverageExtractor),
        Arc::new(GitExtractor::new(options.git_enabled, options.max_commits)),
    ];
    extractors.extend(
        ManifestExtractor::all()
            .into_iter()
            .map(|m| Arc::new(m) as Arc<dyn Extractor>),
    );
    extractors
}
