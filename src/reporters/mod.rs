//! Output reporters for healthscan results
//!
//! Supports two output formats:
//! - `text` - Terminal summary with colors
//! - `json` - Machine-readable composite report, keys sorted

mod json;
mod text;

pub use json::{render_error, SCHEMA_VERSION};

use crate::gate::CiSection;
use crate::pipeline::ScanReport;
use anyhow::Result;

/// Supported output formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Render a scan report, with the CI section when a gate was evaluated
pub fn render(
    report: &ScanReport,
    ci: Option<&CiSection>,
    format: OutputFormat,
) -> Result<String> {
    match format {
        OutputFormat::Text => Ok(text::render(report, ci)),
        OutputFormat::Json => json::render(report, ci),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::cache::CacheStats;
    use crate::models::{
        AnalysisResult, ComplexitySummary, DirectoryCount, GitSummary, Grade, HealthScore,
        HotspotEntry, OnboardingDifficulty, RiskLevel, ScoreBreakdown, TestSummary,
    };
    use std::collections::BTreeMap;

    /// A small but complete report for rendering tests
    pub(crate) fn test_report() -> ScanReport {
        let mut languages = BTreeMap::new();
        languages.insert("Python".to_string(), 75.0);
        languages.insert("*.cfg".to_string(), 25.0);

        ScanReport {
            repo_name: "demo".to_string(),
            analysis: AnalysisResult {
                total_files: 4,
                total_lines: 420,
                languages,
                largest_dirs: vec![DirectoryCount {
                    directory: "src".to_string(),
                    file_count: 3,
                }],
                complexity: Some(ComplexitySummary {
                    avg_file_size: 2048.0,
                    max_directory_depth: 1,
                    largest_files: vec![],
                    deep_nesting_warning: false,
                }),
                dependencies: vec![],
                git: GitSummary::unknown("no git repository found"),
                tests: Some(TestSummary {
                    has_tests: true,
                    test_file_count: 1,
                    source_file_count: 3,
                    test_ratio: 0.333,
                }),
                hotspots: vec![HotspotEntry {
                    file_path: "src/app.py".to_string(),
                    lines_of_code: 400,
                    depth: 1,
                    has_nearby_tests: false,
                    risk_score: 68.2,
                    reason: "No nearby tests, Large file (400 LOC)".to_string(),
                }],
                flagged_files: 1,
            },
            health: HealthScore {
                overall: 84.5,
                grade: Grade::B,
                risk_level: RiskLevel::Low,
                onboarding_difficulty: OnboardingDifficulty::Easy,
                breakdown: ScoreBreakdown {
                    complexity: Some(100.0),
                    structure: Some(100.0),
                    tests: Some(76.7),
                    git_activity: None,
                    hotspots: Some(65.9),
                },
                scoring_version: 1,
            },
            cache: CacheStats {
                enabled: true,
                hits: 3,
                misses: 1,
                hit_rate: 75.0,
                time_saved_secs: 0.0003,
                entries: 4,
                discarded_entries: 0,
            },
            warnings: vec!["git: no git repository found".to_string()],
            scan_duration_secs: 0.012,
        }
    }
}
