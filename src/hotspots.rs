//! Hotspot risk scoring
//!
//! Each non-test source file gets three bounded sub-scores in [0, 100]:
//!
//! - **size**: `loc * 50 / 200` up to 200 lines, then linear from 50 to 100
//!   between 200 and 500 lines, saturating at 100 above 500
//! - **depth**: `depth / 4 * 100`, saturating at depth 4
//! - **tests**: 0 when a nearby test exists, otherwise 100
//!
//! The risk score is `0.4 * size + 0.3 * depth + 0.3 * tests`, rounded to
//! one decimal. Files scoring above 30 are flagged; the top K flagged files
//! are reported, highest risk first, ties broken by ascending path.

use crate::extractors::test_coverage::{is_source_path, is_test_path};
use crate::extractors::TestIndex;
use crate::models::{FileRecord, HotspotEntry};

use std::cmp::Ordering;
use tracing::debug;

pub const WEIGHT_LOC: f64 = 0.4;
pub const WEIGHT_DEPTH: f64 = 0.3;
pub const WEIGHT_NO_TESTS: f64 = 0.3;

const HIGH_LOC_THRESHOLD: u64 = 500;
const MEDIUM_LOC_THRESHOLD: u64 = 200;
const HIGH_DEPTH_THRESHOLD: usize = 4;
const NESTED_DEPTH_THRESHOLD: usize = 3;

/// Files must score strictly above this to be flagged
pub const INCLUSION_THRESHOLD: f64 = 30.0;

/// Default length of the reported hotspot list
pub const DEFAULT_TOP_K: usize = 10;

/// Size sub-score
pub fn loc_score(loc: u64) -> f64 {
    if loc > HIGH_LOC_THRESHOLD {
        100.0
    } else if loc > MEDIUM_LOC_THRESHOLD {
        50.0 + (loc - MEDIUM_LOC_THRESHOLD) as f64 * 50.0
            / (HIGH_LOC_THRESHOLD - MEDIUM_LOC_THRESHOLD) as f64
    } else {
        loc as f64 * 50.0 / MEDIUM_LOC_THRESHOLD as f64
    }
}

/// Nesting sub-score
pub fn depth_score(depth: usize) -> f64 {
    (depth as f64 / HIGH_DEPTH_THRESHOLD as f64 * 100.0).min(100.0)
}

/// Test-proximity sub-score
pub fn test_score(has_nearby_tests: bool) -> f64 {
    if has_nearby_tests {
        0.0
    } else {
        100.0
    }
}

/// Weighted risk in [0, 100], one decimal
pub fn risk_score(loc: u64, depth: usize, has_nearby_tests: bool) -> f64 {
    let raw = WEIGHT_LOC * loc_score(loc)
        + WEIGHT_DEPTH * depth_score(depth)
        + WEIGHT_NO_TESTS * test_score(has_nearby_tests);
    ((raw * 10.0).round() / 10.0).clamp(0.0, 100.0)
}

/// Human-readable explanation naming the factors that contribute.
///
/// Factors appear in descending order of their weighted contribution;
/// equal contributions keep the order size, depth, tests.
pub fn rationale(loc: u64, depth: usize, has_nearby_tests: bool) -> String {
    let mut reasons: Vec<(f64, String)> = Vec::new();

    if loc > HIGH_LOC_THRESHOLD {
        reasons.push((WEIGHT_LOC * loc_score(loc), format!("Very large file ({} LOC)", loc)));
    } else if loc > MEDIUM_LOC_THRESHOLD {
        reasons.push((WEIGHT_LOC * loc_score(loc), format!("Large file ({} LOC)", loc)));
    }

    if depth >= HIGH_DEPTH_THRESHOLD {
        reasons.push((
            WEIGHT_DEPTH * depth_score(depth),
            format!("Deeply nested (depth {})", depth),
        ));
    } else if depth >= NESTED_DEPTH_THRESHOLD {
        reasons.push((
            WEIGHT_DEPTH * depth_score(depth),
            format!("Nested structure (depth {})", depth),
        ));
    }

    if !has_nearby_tests {
        reasons.push((WEIGHT_NO_TESTS * test_score(false), "No nearby tests".to_string()));
    }

    if reasons.is_empty() {
        return "Potential complexity".to_string();
    }

    // Stable sort keeps the fixed order for equal contributions
    reasons.sort_by(|a, b| b.0.total_cmp(&a.0));
    reasons
        .into_iter()
        .map(|(_, reason)| reason)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Hotspots selected for a tree
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HotspotRanking {
    /// Top K, descending risk, ties by ascending path
    pub hotspots: Vec<HotspotEntry>,
    /// Files above the threshold before truncation
    pub flagged: usize,
}

/// Ranking order: higher risk first, then ascending path
fn rank_order(a: &HotspotEntry, b: &HotspotEntry) -> Ordering {
    b.risk_score
        .total_cmp(&a.risk_score)
        .then_with(|| a.file_path.cmp(&b.file_path))
}

pub struct HotspotScorer {
    top_k: usize,
}

impl Default for HotspotScorer {
    fn default() -> Self {
        Self::new(DEFAULT_TOP_K)
    }
}

impl HotspotScorer {
    pub fn new(top_k: usize) -> Self {
        Self { top_k }
    }

    /// Score one file
    pub fn score(&self, file: &FileRecord, tests: &TestIndex) -> HotspotEntry {
        let depth = file.depth();
        let has_nearby_tests = tests.has_nearby_test(&file.rel_path);
        HotspotEntry {
            file_path: file.rel_path.clone(),
            lines_of_code: file.line_count,
            depth,
            has_nearby_tests,
            risk_score: risk_score(file.line_count, depth, has_nearby_tests),
            reason: rationale(file.line_count, depth, has_nearby_tests),
        }
    }

    /// Score every candidate and select the top K.
    ///
    /// Candidates are text source files with at least one line that are not
    /// tests themselves. The result does not depend on the order of `files`.
    pub fn rank(&self, files: &[FileRecord], tests: &TestIndex) -> HotspotRanking {
        let mut flagged: Vec<HotspotEntry> = files
            .iter()
            .filter(|f| {
                !f.is_binary
                    && f.line_count > 0
                    && is_source_path(&f.rel_path)
                    && !is_test_path(&f.rel_path)
            })
            .map(|f| self.score(f, tests))
            .filter(|h| h.risk_score > INCLUSION_THRESHOLD)
            .collect();

        let total = flagged.len();
        flagged.sort_by(rank_order);
        flagged.truncate(self.top_k);

        debug!("Flagged {} hotspots, reporting {}", total, flagged.len());

        HotspotRanking {
            hotspots: flagged,
            flagged: total,
        }
    }
}
