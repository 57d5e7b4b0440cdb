//! Core data models for healthscan
//!
//! These models flow through the whole pipeline: the walker produces
//! [`FileRecord`]s, extractors produce partial metrics, the aggregator
//! assembles an [`AnalysisResult`] and the scoring engine derives a
//! [`HealthScore`] from it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::ConfigError;

/// One file discovered by the walker, after classification.
///
/// Created per scan and discarded once extraction is done.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    /// Absolute path on disk
    pub path: PathBuf,
    /// Path relative to the scan root, `/`-separated
    pub rel_path: String,
    pub size: u64,
    /// Modification time in nanoseconds since the Unix epoch
    pub mtime_ns: i64,
    pub is_binary: bool,
    /// Zero for binary files
    pub line_count: u64,
    pub language: Option<String>,
}

impl FileRecord {
    /// Directory depth of the file itself: `a.rs` is 0, `src/a.rs` is 1.
    pub fn depth(&self) -> usize {
        self.rel_path.matches('/').count()
    }

    /// Lowercased extension without the dot.
    pub fn extension(&self) -> Option<String> {
        let name = self.rel_path.rsplit('/').next()?;
        let (stem, ext) = name.rsplit_once('.')?;
        if stem.is_empty() || ext.is_empty() {
            return None;
        }
        Some(ext.to_lowercase())
    }

    /// Parent directory relative to the root, `(root)` for top-level files.
    pub fn parent_dir(&self) -> String {
        match self.rel_path.rsplit_once('/') {
            Some((dir, _)) => dir.to_string(),
            None => "(root)".to_string(),
        }
    }
}

/// Per-file metrics that are expensive enough to cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMetrics {
    pub is_binary: bool,
    pub line_count: u64,
    pub language: Option<String>,
}

/// Letter grade. Ordered from best to worst: `A < B < ... < F`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Grade {
    A,
    B,
    C,
    D,
    F,
}

impl Grade {
    /// Map an overall score to its band. Lower edges are inclusive.
    pub fn from_score(score: f64) -> Self {
        match score {
            s if s >= 90.0 => Grade::A,
            s if s >= 80.0 => Grade::B,
            s if s >= 70.0 => Grade::C,
            s if s >= 60.0 => Grade::D,
            _ => Grade::F,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Grade::A => "A",
            Grade::B => "B",
            Grade::C => "C",
            Grade::D => "D",
            Grade::F => "F",
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Grade {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "A" => Ok(Grade::A),
            "B" => Ok(Grade::B),
            "C" => Ok(Grade::C),
            "D" => Ok(Grade::D),
            "F" => Ok(Grade::F),
            _ => Err(ConfigError::invalid("min_grade", s, "A, B, C, D, F")),
        }
    }
}

/// Overall risk. `Low < Medium < High`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "Low",
            RiskLevel::Medium => "Medium",
            RiskLevel::High => "High",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RiskLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(RiskLevel::Low),
            "medium" => Ok(RiskLevel::Medium),
            "high" => Ok(RiskLevel::High),
            _ => Err(ConfigError::invalid("max_risk", s, "Low, Medium, High")),
        }
    }
}

/// How hard the codebase is to pick up. `Easy < Moderate < Hard`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum OnboardingDifficulty {
    Easy,
    Moderate,
    Hard,
}

impl OnboardingDifficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            OnboardingDifficulty::Easy => "Easy",
            OnboardingDifficulty::Moderate => "Moderate",
            OnboardingDifficulty::Hard => "Hard",
        }
    }
}

impl fmt::Display for OnboardingDifficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OnboardingDifficulty {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "easy" => Ok(OnboardingDifficulty::Easy),
            "moderate" => Ok(OnboardingDifficulty::Moderate),
            "hard" => Ok(OnboardingDifficulty::Hard),
            _ => Err(ConfigError::invalid(
                "max_onboarding",
                s,
                "Easy, Moderate, Hard",
            )),
        }
    }
}

/// A file with its on-disk size, used for the largest-files list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizedFile {
    pub file_path: String,
    pub size_bytes: u64,
}

/// Filesystem-level complexity signals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplexitySummary {
    /// Mean size in bytes of non-empty text files
    pub avg_file_size: f64,
    pub max_directory_depth: usize,
    pub largest_files: Vec<SizedFile>,
    pub deep_nesting_warning: bool,
}

/// Dependencies declared by one manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencySummary {
    pub ecosystem: String,
    pub manifest_file: String,
    pub dependency_count: usize,
    /// Sorted, truncated to the first 20 names
    pub dependencies: Vec<String>,
}

/// Repository activity, or an explicit unknown marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum GitSummary {
    Known {
        commit_count: usize,
        contributor_count: usize,
        /// `None` for a repository without commits
        days_since_last_commit: Option<i64>,
        /// History walk hit the configured bound
        truncated: bool,
    },
    Unknown { reason: String },
}

impl GitSummary {
    pub fn unknown(reason: impl Into<String>) -> Self {
        GitSummary::Unknown {
            reason: reason.into(),
        }
    }

    pub fn is_known(&self) -> bool {
        matches!(self, GitSummary::Known { .. })
    }
}

/// Heuristic test coverage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestSummary {
    pub has_tests: bool,
    pub test_file_count: usize,
    pub source_file_count: usize,
    /// test files / source files, 0 when there are no source files
    pub test_ratio: f64,
}

/// A file flagged by the hotspot scorer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HotspotEntry {
    pub file_path: String,
    pub lines_of_code: u64,
    pub depth: usize,
    pub has_nearby_tests: bool,
    /// In [0, 100]
    pub risk_score: f64,
    pub reason: String,
}

/// Per-directory file count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryCount {
    pub directory: String,
    pub file_count: usize,
}

/// Everything the scoring engine needs, plus the report-only totals.
///
/// A `None` dimension means its data could not be obtained; it is excluded
/// from scoring rather than counted as zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub total_files: usize,
    pub total_lines: u64,
    pub languages: BTreeMap<String, f64>,
    pub largest_dirs: Vec<DirectoryCount>,
    pub complexity: Option<ComplexitySummary>,
    pub dependencies: Vec<DependencySummary>,
    pub git: GitSummary,
    pub tests: Option<TestSummary>,
    /// Ranked top-K, descending risk, ties by ascending path
    pub hotspots: Vec<HotspotEntry>,
    /// Number of files above the hotspot threshold before top-K truncation
    pub flagged_files: usize,
}

/// Sub-scores per dimension. `None` marks an excluded dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub complexity: Option<f64>,
    pub structure: Option<f64>,
    pub tests: Option<f64>,
    pub git_activity: Option<f64>,
    pub hotspots: Option<f64>,
}

/// Graded outcome of the scoring engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthScore {
    pub overall: f64,
    pub grade: Grade,
    pub risk_level: RiskLevel,
    pub onboarding_difficulty: OnboardingDifficulty,
    pub breakdown: ScoreBreakdown,
    /// Scoring contract version the numbers were produced under
    pub scoring_version: u32,
}
