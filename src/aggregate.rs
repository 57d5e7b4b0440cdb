//! Merging partial metrics into one [`AnalysisResult`]
//!
//! Every reduction here is order-independent: totals are integer sums,
//! rankings sort on a total key, and maps are ordered. Extractor results can
//! therefore arrive in any order without changing the outcome.

use crate::extractors::PartialMetrics;
use crate::hotspots::HotspotRanking;
use crate::models::{
    AnalysisResult, ComplexitySummary, DependencySummary, DirectoryCount, FileRecord, GitSummary,
    TestSummary,
};

use std::collections::{BTreeMap, HashMap};
use tracing::warn;

/// Length of the largest-directories list
const LARGEST_DIRS: usize = 10;

/// Collects extractor output for one scan
#[derive(Debug, Default)]
pub struct Aggregator {
    complexity: Option<ComplexitySummary>,
    dependencies: Vec<DependencySummary>,
    git: Option<GitSummary>,
    tests: Option<TestSummary>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn absorb(&mut self, partial: PartialMetrics) {
        match partial {
            PartialMetrics::Complexity(c) => {
                if self.complexity.replace(c).is_some() {
                    warn!("Complexity summary reported twice, keeping the latest");
                }
            }
            PartialMetrics::Dependencies(d) => self.dependencies.push(d),
            PartialMetrics::Git(g) => {
                if self.git.replace(g).is_some() {
                    warn!("Git summary reported twice, keeping the latest");
                }
            }
            PartialMetrics::Tests(t) => {
                if self.tests.replace(t).is_some() {
                    warn!("Test summary reported twice, keeping the latest");
                }
            }
        }
    }

    /// Build the result. Dimensions nobody reported stay absent.
    pub fn finish(mut self, files: &[FileRecord], ranking: HotspotRanking) -> AnalysisResult {
        self.dependencies.sort_by(|a, b| {
            a.ecosystem
                .cmp(&b.ecosystem)
                .then_with(|| a.manifest_file.cmp(&b.manifest_file))
        });

        AnalysisResult {
            total_files: files.len(),
            total_lines: files.iter().map(|f| f.line_count).sum(),
            languages: language_shares(files),
            largest_dirs: largest_dirs(files),
            complexity: self.complexity,
            dependencies: self.dependencies,
            git: self
                .git
                .unwrap_or_else(|| GitSummary::unknown("git data not collected")),
            tests: self.tests,
            hotspots: ranking.hotspots,
            flagged_files: ranking.flagged,
        }
    }
}

/// Language label for a file: the known language, else `*.ext`
fn language_label(file: &FileRecord) -> Option<String> {
    match &file.language {
        Some(lang) => Some(lang.clone()),
        None => file.extension().map(|ext| format!("*.{}", ext)),
    }
}

/// Percentage of all files per language, two decimals
fn language_shares(files: &[FileRecord]) -> BTreeMap<String, f64> {
    if files.is_empty() {
        return BTreeMap::new();
    }

    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for label in files.iter().filter_map(language_label) {
        *counts.entry(label).or_default() += 1;
    }

    let total = files.len() as f64;
    counts
        .into_iter()
        .map(|(lang, count)| {
            let pct = count as f64 * 100.0 / total;
            (lang, (pct * 100.0).round() / 100.0)
        })
        .collect()
}

/// Directories holding the most files, ties by name
fn largest_dirs(files: &[FileRecord]) -> Vec<DirectoryCount> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for file in files {
        *counts.entry(file.parent_dir()).or_default() += 1;
    }

    let mut dirs: Vec<DirectoryCount> = counts
        .into_iter()
        .map(|(directory, file_count)| DirectoryCount {
            directory,
            file_count,
        })
        .collect();
    dirs.sort_by(|a, b| {
        b.file_count
            .cmp(&a.file_count)
            .then_with(|| a.directory.cmp(&b.directory))
    });
    dirs.truncate(LARGEST_DIRS);
    dirs
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn record(rel: &str, lines: u64, language: Option<&str>) -> FileRecord {
        FileRecord {
            path: PathBuf::from(rel),
            rel_path: rel.to_string(),
            size: lines * 20,
            mtime_ns: 0,
            is_binary: false,
            line_count: lines,
            language: language.map(String::from),
        }
    }

    fn dep(ecosystem: &str, manifest: &str) -> DependencySummary {
        DependencySummary {
            ecosystem: ecosystem.to_string(),
            manifest_file: manifest.to_string(),
            dependency_count: 1,
            dependencies: vec!["x".to_string()],
        }
    }

    #[test]
    fn test_totals_and_languages() {
        let files = vec![
            record("src/a.rs", 10, Some("Rust")),
            record("src/b.rs", 20, Some("Rust")),
            record("data.xyz", 3, None),
            record("Makefile", 5, None),
        ];
        let result = Aggregator::new().finish(&files, HotspotRanking::default());

        assert_eq!(result.total_files, 4);
        assert_eq!(result.total_lines, 38);
        assert_eq!(result.languages.get("Rust"), Some(&50.0));
        assert_eq!(result.languages.get("*.xyz"), Some(&25.0));
        assert_eq!(result.languages.len(), 2);
    }

    #[test]
    fn test_largest_dirs_ranked_with_name_ties() {
        let files = vec![
            record("b/1.py", 1, None),
            record("a/1.py", 1, None),
            record("c/1.py", 1, None),
            record("c/2.py", 1, None),
            record("top.py", 1, None),
        ];
        let result = Aggregator::new().finish(&files, HotspotRanking::default());
        let dirs: Vec<(&str, usize)> = result
            .largest_dirs
            .iter()
            .map(|d| (d.directory.as_str(), d.file_count))
            .collect();
        assert_eq!(dirs, vec![("c", 2), ("(root)", 1), ("a", 1), ("b", 1)]);
    }

    #[test]
    fn test_absorb_order_does_not_matter() {
        let partials = vec![
            PartialMetrics::Dependencies(dep("Rust", "Cargo.toml")),
            PartialMetrics::Git(GitSummary::unknown("no repository")),
            PartialMetrics::Dependencies(dep("JavaScript/Node.js", "package.json")),
            PartialMetrics::Tests(TestSummary {
                has_tests: false,
                test_file_count: 0,
                source_file_count: 1,
                test_ratio: 0.0,
            }),
        ];

        let mut forward = Aggregator::new();
        for p in partials.iter().cloned() {
            forward.absorb(p);
        }
        let mut backward = Aggregator::new();
        for p in partials.into_iter().rev() {
            backward.absorb(p);
        }

        let files = vec![record("a.rs", 1, Some("Rust"))];
        let a = forward.finish(&files, HotspotRanking::default());
        let b = backward.finish(&files, HotspotRanking::default());
        assert_eq!(a, b);
        assert_eq!(a.dependencies[0].ecosystem, "JavaScript/Node.js");
    }

    #[test]
    fn test_missing_dimensions_stay_absent() {
        let result = Aggregator::new().finish(&[], HotspotRanking::default());
        assert!(result.complexity.is_none());
        assert!(result.tests.is_none());
        assert!(!result.git.is_known());
        assert!(result.languages.is_empty());
    }
}
