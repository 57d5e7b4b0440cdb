//! Health Scoring
//!
//! Turns an [`AnalysisResult`](crate::models::AnalysisResult) into a graded
//! [`HealthScore`](crate::models::HealthScore). The engine is a pure
//! function: the same analysis always yields the same score, whatever the
//! cache state, thread count or time of day.
//!
//! # Scoring Formula
//!
//! ```text
//! Overall = Σ wᵢ × scoreᵢ / Σ wᵢ      over the dimensions with data
//!
//!   Complexity   0.25   file size, nesting depth
//!   Tests        0.30   test presence and test:source ratio
//!   Git activity 0.15   commits, contributors, recency
//!   Hotspots     0.20   flagged-file density and severity
//!   Structure    0.10   lines per file, tree size
//! ```
//!
//! A dimension whose input could not be collected (no git repository, for
//! instance) is excluded and the remaining weights are rescaled to sum to 1.
//! It is never scored as zero nor given a neutral midpoint.
//!
//! # Grade Bands (lower edge inclusive)
//!
//! - A: 90 and above
//! - B: 80 to below 90
//! - C: 70 to below 80
//! - D: 60 to below 70
//! - F: below 60
//!
//! Weights, bands and rules are fixed per [`SCORING_VERSION`].

mod engine;

pub use engine::{
    onboarding_difficulty, risk_level, score_complexity, score_git_activity, score_hotspots,
    score_structure, score_tests, ScoringEngine, SCORING_VERSION, WEIGHT_COMPLEXITY,
    WEIGHT_GIT_ACTIVITY, WEIGHT_HOTSPOTS, WEIGHT_STRUCTURE, WEIGHT_TESTS,
};
