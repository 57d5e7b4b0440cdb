//! Deterministic scoring of an [`AnalysisResult`]

use crate::models::{
    AnalysisResult, ComplexitySummary, GitSummary, Grade, HealthScore, HotspotEntry,
    OnboardingDifficulty, RiskLevel, ScoreBreakdown, TestSummary,
};

/// Version of the scoring contract: weights, bands, rules and the
/// renormalization policy. Any change to them bumps this number.
pub const SCORING_VERSION: u32 = 1;

pub const WEIGHT_COMPLEXITY: f64 = 0.25;
pub const WEIGHT_TESTS: f64 = 0.30;
pub const WEIGHT_GIT_ACTIVITY: f64 = 0.15;
pub const WEIGHT_HOTSPOTS: f64 = 0.20;
pub const WEIGHT_STRUCTURE: f64 = 0.10;

/// Hotspots above this count as high risk for the risk level
const HIGH_RISK_HOTSPOT: f64 = 70.0;

/// Maps analysis results to health scores.
///
/// Stateless; every method is a pure function of its arguments.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScoringEngine;

impl ScoringEngine {
    pub fn new() -> Self {
        Self
    }

    /// Score an analysis.
    ///
    /// Dimensions without data (no git repository, no test summary, no
    /// complexity summary) are left out and the remaining weights are
    /// rescaled to sum to 1.
    pub fn score(&self, analysis: &AnalysisResult) -> HealthScore {
        let complexity = analysis.complexity.as_ref().map(score_complexity);
        let tests = analysis.tests.as_ref().map(score_tests);
        let git_activity = score_git_activity(&analysis.git);
        let hotspots = score_hotspots(
            &analysis.hotspots,
            analysis.flagged_files,
            analysis.total_files,
        );
        let structure = score_structure(analysis.total_files, analysis.total_lines);

        let weighted = [
            (complexity, WEIGHT_COMPLEXITY),
            (tests, WEIGHT_TESTS),
            (git_activity, WEIGHT_GIT_ACTIVITY),
            (Some(hotspots), WEIGHT_HOTSPOTS),
            (Some(structure), WEIGHT_STRUCTURE),
        ];
        let (overall, grade) = overall_and_grade(&weighted);

        HealthScore {
            overall,
            grade,
            risk_level: risk_level(&analysis.hotspots, analysis.tests.as_ref()),
            onboarding_difficulty: onboarding_difficulty(analysis),
            breakdown: ScoreBreakdown {
                complexity: complexity.map(|s| round_to(s, 1)),
                structure: Some(round_to(structure, 1)),
                tests: tests.map(|s| round_to(s, 1)),
                git_activity: git_activity.map(|s| round_to(s, 1)),
                hotspots: Some(round_to(hotspots, 1)),
            },
            scoring_version: SCORING_VERSION,
        }
    }
}

/// Weighted mean over the present dimensions
fn weighted_average(dimensions: &[(Option<f64>, f64)]) -> f64 {
    let (sum, weight) = dimensions
        .iter()
        .filter_map(|(score, weight)| score.map(|s| (s * weight, *weight)))
        .fold((0.0, 0.0), |(sum, total), (s, w)| (sum + s, total + w));

    if weight == 0.0 {
        0.0
    } else {
        (sum / weight).clamp(0.0, 100.0)
    }
}

/// The overall score is rounded before grading, so the printed score and
/// the grade always agree.
fn overall_and_grade(dimensions: &[(Option<f64>, f64)]) -> (f64, Grade) {
    let overall = round_to(weighted_average(dimensions), 2);
    (overall, Grade::from_score(overall))
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

pub fn score_complexity(complexity: &ComplexitySummary) -> f64 {
    let mut score: f64 = 100.0;

    // Roughly 1000 and 500 lines at 50 bytes per line
    if complexity.avg_file_size > 50_000.0 {
        score -= 20.0;
    } else if complexity.avg_file_size > 25_000.0 {
        score -= 10.0;
    }

    if complexity.deep_nesting_warning {
        score -= 15.0;
    }

    let depth = complexity.max_directory_depth;
    if depth > 8 {
        score -= 15.0;
    } else if depth > 6 {
        score -= 10.0;
    }
    if (2..=4).contains(&depth) {
        score += 5.0;
    }

    score.clamp(0.0, 100.0)
}

pub fn score_tests(tests: &TestSummary) -> f64 {
    if !tests.has_tests {
        return 0.0;
    }

    let bonus = match tests.test_ratio {
        r if r >= 0.5 => 60.0,
        r if r >= 0.3 => 45.0,
        r if r >= 0.2 => 30.0,
        r if r >= 0.1 => 15.0,
        _ => 5.0,
    };
    (40.0_f64 + bonus).min(100.0)
}

/// `None` when git data is unknown
pub fn score_git_activity(git: &GitSummary) -> Option<f64> {
    let GitSummary::Known {
        commit_count,
        contributor_count,
        days_since_last_commit,
        ..
    } = git
    else {
        return None;
    };

    let mut score: f64 = 100.0;

    if *commit_count < 10 {
        score -= 30.0;
    } else if *commit_count < 50 {
        score -= 15.0;
    }

    // Bus factor
    match *contributor_count {
        1 => score -= 20.0,
        2 => score -= 10.0,
        _ => {}
    }

    if let Some(days) = days_since_last_commit {
        if *days > 365 {
            score -= 30.0;
        } else if *days > 180 {
            score -= 20.0;
        } else if *days > 90 {
            score -= 10.0;
        }
    }

    Some(score.clamp(0.0, 100.0))
}

/// Density uses every flagged file; severity uses the reported list.
pub fn score_hotspots(
    hotspots: &[HotspotEntry],
    flagged_files: usize,
    total_files: usize,
) -> f64 {
    if total_files == 0 {
        return 100.0;
    }

    let mut score: f64 = 100.0;

    let density = flagged_files as f64 / total_files as f64;
    if density > 0.2 {
        score -= 40.0;
    } else if density > 0.1 {
        score -= 25.0;
    } else if density > 0.05 {
        score -= 15.0;
    }

    if !hotspots.is_empty() {
        let avg_risk = hotspots.iter().map(|h| h.risk_score).sum::<f64>() / hotspots.len() as f64;
        if avg_risk > 70.0 {
            score -= 20.0;
        } else if avg_risk > 50.0 {
            score -= 10.0;
        }
    }

    score.clamp(0.0, 100.0)
}

pub fn score_structure(total_files: usize, total_lines: u64) -> f64 {
    let mut score: f64 = 100.0;

    if total_files > 0 {
        let avg_lines = total_lines as f64 / total_files as f64;
        if avg_lines > 1000.0 {
            score -= 20.0;
        } else if avg_lines > 500.0 {
            score -= 10.0;
        } else if avg_lines < 50.0 {
            // Too fragmented
            score -= 10.0;
        }
    }

    if (10..=1000).contains(&total_files) {
        score += 5.0;
    }

    score.clamp(0.0, 100.0)
}

/// Risk points: hotspot severity plus missing tests.
/// 50 or more is High, 25 or more is Medium.
pub fn risk_level(hotspots: &[HotspotEntry], tests: Option<&TestSummary>) -> RiskLevel {
    let mut points = 0;

    if !hotspots.is_empty() {
        let high_risk = hotspots
            .iter()
            .filter(|h| h.risk_score > HIGH_RISK_HOTSPOT)
            .count();
        if high_risk >= 3 {
            points += 30;
        } else if high_risk >= 1 {
            points += 20;
        } else if hotspots.len() >= 5 {
            points += 10;
        }
    }

    if let Some(tests) = tests {
        if !tests.has_tests {
            points += 40;
        } else if tests.test_ratio < 0.1 {
            points += 20;
        }
    }

    match points {
        p if p >= 50 => RiskLevel::High,
        p if p >= 25 => RiskLevel::Medium,
        _ => RiskLevel::Low,
    }
}

/// Onboarding points: tree size, nesting, missing tests, stale history.
/// 50 or more is Hard, 25 or more is Moderate.
pub fn onboarding_difficulty(analysis: &AnalysisResult) -> OnboardingDifficulty {
    let mut points = 0;

    if analysis.total_files > 500 {
        points += 30;
    } else if analysis.total_files > 200 {
        points += 15;
    }

    if analysis
        .complexity
        .as_ref()
        .is_some_and(|c| c.deep_nesting_warning)
    {
        points += 20;
    }

    if let Some(tests) = &analysis.tests {
        if !tests.has_tests {
            points += 25;
        } else if tests.test_ratio < 0.1 {
            points += 10;
        }
    }

    if let GitSummary::Known {
        days_since_last_commit: Some(days),
        ..
    } = &analysis.git
    {
        if *days > 365 {
            points += 15;
        }
    }

    match points {
        p if p >= 50 => OnboardingDifficulty::Hard,
        p if p >= 25 => OnboardingDifficulty::Moderate,
        _ => OnboardingDifficulty::Easy,
    }
}
