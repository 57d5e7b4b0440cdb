//! CI gate: compare a health score against configured thresholds
//!
//! Each axis has a total order (grades `A` best to `F` worst, risk `Low` to
//! `High`, onboarding `Easy` to `Hard`). The outcome is exactly one of Pass,
//! Fail or Error and maps one-to-one onto the process exit code:
//!
//! | Outcome | Exit code |
//! |---------|-----------|
//! | Pass    | 0         |
//! | Error   | 1         |
//! | Fail    | 2         |

use crate::error::{ConfigError, ScanError};
use crate::models::{Grade, HealthScore, OnboardingDifficulty, RiskLevel};

use serde::{Deserialize, Serialize};
use std::fmt;

pub const EXIT_PASS: u8 = 0;
pub const EXIT_ERROR: u8 = 1;
pub const EXIT_VIOLATION: u8 = 2;

/// Thresholds to enforce. An unset axis is not checked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThresholdConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_grade: Option<Grade>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_risk: Option<RiskLevel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_onboarding: Option<OnboardingDifficulty>,
}

impl ThresholdConfig {
    /// Validate raw threshold strings against their enumerations.
    pub fn parse(
        min_grade: Option<&str>,
        max_risk: Option<&str>,
        max_onboarding: Option<&str>,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            min_grade: min_grade.map(str::parse).transpose()?,
            max_risk: max_risk.map(str::parse).transpose()?,
            max_onboarding: max_onboarding.map(str::parse).transpose()?,
        })
    }

    /// Values from `overrides` win where set.
    pub fn merged_with(self, overrides: ThresholdConfig) -> Self {
        Self {
            min_grade: overrides.min_grade.or(self.min_grade),
            max_risk: overrides.max_risk.or(self.max_risk),
            max_onboarding: overrides.max_onboarding.or(self.max_onboarding),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.min_grade.is_none() && self.max_risk.is_none() && self.max_onboarding.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateAxis {
    Grade,
    Risk,
    Onboarding,
}

/// One threshold that was not met
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub axis: GateAxis,
    pub actual: String,
    pub threshold: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.axis {
            GateAxis::Grade => write!(
                f,
                "Grade {} is below minimum {}",
                self.actual, self.threshold
            ),
            GateAxis::Risk => write!(
                f,
                "Risk level {} exceeds maximum {}",
                self.actual, self.threshold
            ),
            GateAxis::Onboarding => write!(
                f,
                "Onboarding difficulty {} exceeds maximum {}",
                self.actual, self.threshold
            ),
        }
    }
}

/// Result of a gate evaluation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateOutcome {
    Pass,
    Fail(Vec<Violation>),
    /// The scan could not complete; no score exists to compare
    Error(String),
}

impl GateOutcome {
    pub fn exit_code(&self) -> u8 {
        match self {
            GateOutcome::Pass => EXIT_PASS,
            GateOutcome::Fail(_) => EXIT_VIOLATION,
            GateOutcome::Error(_) => EXIT_ERROR,
        }
    }

    pub fn is_pass(&self) -> bool {
        matches!(self, GateOutcome::Pass)
    }

    pub fn violations(&self) -> &[Violation] {
        match self {
            GateOutcome::Fail(v) => v,
            _ => &[],
        }
    }

    /// Outcome for a scan that failed before producing a score
    pub fn from_error(err: &ScanError) -> Self {
        GateOutcome::Error(err.to_string())
    }
}

/// Check every configured axis.
pub fn evaluate(score: &HealthScore, thresholds: &ThresholdConfig) -> GateOutcome {
    let mut violations = Vec::new();

    // Grades order A < F, so "worse than minimum" is "greater than"
    if let Some(min) = thresholds.min_grade {
        if score.grade > min {
            violations.push(Violation {
                axis: GateAxis::Grade,
                actual: score.grade.to_string(),
                threshold: min.to_string(),
            });
        }
    }

    if let Some(max) = thresholds.max_risk {
        if score.risk_level > max {
            violations.push(Violation {
                axis: GateAxis::Risk,
                actual: score.risk_level.to_string(),
                threshold: max.to_string(),
            });
        }
    }

    if let Some(max) = thresholds.max_onboarding {
        if score.onboarding_difficulty > max {
            violations.push(Violation {
                axis: GateAxis::Onboarding,
                actual: score.onboarding_difficulty.to_string(),
                threshold: max.to_string(),
            });
        }
    }

    if violations.is_empty() {
        GateOutcome::Pass
    } else {
        GateOutcome::Fail(violations)
    }
}

/// Actual values the gate compared
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateActuals {
    pub grade: Grade,
    pub risk_level: RiskLevel,
    pub onboarding_difficulty: OnboardingDifficulty,
}

/// The `ci` section of the JSON report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CiSection {
    pub passed: bool,
    pub exit_code: u8,
    pub thresholds: ThresholdConfig,
    pub actual: GateActuals,
    pub violations: Vec<Violation>,
    /// Human-readable form of `violations`
    pub failures: Vec<String>,
}

impl CiSection {
    pub fn new(score: &HealthScore, thresholds: &ThresholdConfig, outcome: &GateOutcome) -> Self {
        let violations = outcome.violations().to_vec();
        Self {
            passed: outcome.is_pass(),
            exit_code: outcome.exit_code(),
            thresholds: *thresholds,
            actual: GateActuals {
                grade: score.grade,
                risk_level: score.risk_level,
                onboarding_difficulty: score.onboarding_difficulty,
            },
            failures: violations.iter().map(|v| v.to_string()).collect(),
            violations,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ScoreBreakdown;

    fn score(grade: Grade, risk: RiskLevel, onboarding: OnboardingDifficulty) -> HealthScore {
        HealthScore {
            overall: 85.0,
            grade,
            risk_level: risk,
            onboarding_difficulty: onboarding,
            breakdown: ScoreBreakdown {
                complexity: Some(100.0),
                structure: Some(100.0),
                tests: Some(55.0),
                git_activity: None,
                hotspots: Some(85.0),
            },
            scoring_version: 1,
        }
    }

    fn thresholds(
        grade: Option<&str>,
        risk: Option<&str>,
        onboarding: Option<&str>,
    ) -> ThresholdConfig {
        ThresholdConfig::parse(grade, risk, onboarding).unwrap()
    }

    #[test]
    fn test_grade_meets_minimum_passes() {
        let s = score(Grade::B, RiskLevel::Low, OnboardingDifficulty::Easy);
        let outcome = evaluate(&s, &thresholds(Some("B"), None, None));
        assert_eq!(outcome, GateOutcome::Pass);
        assert_eq!(outcome.exit_code(), 0);
    }

    #[test]
    fn test_grade_below_minimum_fails_on_grade_axis() {
        let s = score(Grade::B, RiskLevel::Low, OnboardingDifficulty::Easy);
        let outcome = evaluate(&s, &thresholds(Some("A"), None, None));
        assert_eq!(outcome.exit_code(), 2);
        assert_eq!(
            outcome.violations(),
            &[Violation {
                axis: GateAxis::Grade,
                actual: "B".to_string(),
                threshold: "A".to_string(),
            }]
        );
        assert_eq!(outcome.violations()[0].to_string(), "Grade B is below minimum A");
    }

    #[test]
    fn test_every_axis_reported() {
        let s = score(Grade::D, RiskLevel::High, OnboardingDifficulty::Hard);
        let outcome = evaluate(&s, &thresholds(Some("C"), Some("medium"), Some("Moderate")));
        let axes: Vec<GateAxis> = outcome.violations().iter().map(|v| v.axis).collect();
        assert_eq!(axes, vec![GateAxis::Grade, GateAxis::Risk, GateAxis::Onboarding]);
        assert_eq!(
            outcome.violations()[1].to_string(),
            "Risk level High exceeds maximum Medium"
        );
    }

    #[test]
    fn test_equal_to_maximum_passes() {
        let s = score(Grade::A, RiskLevel::Medium, OnboardingDifficulty::Moderate);
        let outcome = evaluate(&s, &thresholds(None, Some("Medium"), Some("Moderate")));
        assert!(outcome.is_pass());
    }

    #[test]
    fn test_no_thresholds_always_pass() {
        let s = score(Grade::F, RiskLevel::High, OnboardingDifficulty::Hard);
        let t = ThresholdConfig::default();
        assert!(t.is_empty());
        assert!(evaluate(&s, &t).is_pass());
    }

    #[test]
    fn test_invalid_threshold_is_config_error() {
        let err = ThresholdConfig::parse(Some("E"), None, None).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "min_grade"));
        assert!(ThresholdConfig::parse(None, Some("extreme"), None).is_err());
        assert!(ThresholdConfig::parse(None, None, Some("trivial")).is_err());
    }

    #[test]
    fn test_scan_error_maps_to_exit_one() {
        let err = ScanError::path("/missing", "does not exist");
        let outcome = GateOutcome::from_error(&err);
        assert_eq!(outcome.exit_code(), 1);
        assert!(outcome.violations().is_empty());
    }

    #[test]
    fn test_merge_prefers_overrides() {
        let base = thresholds(Some("C"), Some("High"), None);
        let merged = base.merged_with(thresholds(Some("A"), None, Some("Easy")));
        assert_eq!(merged.min_grade, Some(Grade::A));
        assert_eq!(merged.max_risk, Some(RiskLevel::High));
        assert_eq!(merged.max_onboarding, Some(OnboardingDifficulty::Easy));
    }

    #[test]
    fn test_ci_section_serializes() {
        let s = score(Grade::B, RiskLevel::Low, OnboardingDifficulty::Easy);
        let t = thresholds(Some("A"), None, None);
        let outcome = evaluate(&s, &t);
        let json = serde_json::to_value(CiSection::new(&s, &t, &outcome)).unwrap();
        assert_eq!(json["passed"], false);
        assert_eq!(json["exit_code"], 2);
        assert_eq!(json["thresholds"]["min_grade"], "A");
        assert!(json["thresholds"].get("max_risk").is_none());
        assert_eq!(json["violations"][0]["axis"], "grade");
        assert_eq!(json["failures"][0], "Grade B is below minimum A");
    }
}
