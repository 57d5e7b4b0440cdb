//! Filesystem-level complexity: file sizes and directory nesting

use super::{ExtractionContext, Extractor, PartialMetrics};
use crate::models::{ComplexitySummary, SizedFile};

use anyhow::Result;

/// Nesting at or beyond this depth raises the deep-nesting warning
pub const DEEP_NESTING_THRESHOLD: usize = 6;

/// Length of the largest-files list
const LARGEST_FILES: usize = 10;

pub struct ComplexityExtractor;

impl Extractor for ComplexityExtractor {
    fn name(&self) -> &'static str {
        "complexity"
    }

    fn extract(&self, ctx: &ExtractionContext<'_>) -> Result<Option<PartialMetrics>> {
        Ok(Some(PartialMetrics::Complexity(summarize(ctx))))
    }
}

fn summarize(ctx: &ExtractionContext<'_>) -> ComplexitySummary {
    // Binary and empty files say nothing about code size
    let sized: Vec<_> = ctx
        .files
        .iter()
        .filter(|f| !f.is_binary && f.size > 0)
        .collect();

    let total_size: u64 = sized.iter().map(|f| f.size).sum();
    let avg_file_size = if sized.is_empty() {
        0.0
    } else {
        total_size as f64 / sized.len() as f64
    };

    let max_directory_depth = sized.iter().map(|f| f.depth()).max().unwrap_or(0);

    let mut largest: Vec<SizedFile> = sized
        .iter()
        .map(|f| SizedFile {
            file_path: f.rel_path.clone(),
            size_bytes: f.size,
        })
        .collect();
    largest.sort_by(|a, b| {
        b.size_bytes
            .cmp(&a.size_bytes)
            .then_with(|| a.file_path.cmp(&b.file_path))
    });
    largest.truncate(LARGEST_FILES);

    ComplexitySummary {
        avg_file_size,
        max_directory_depth,
        largest_files: largest,
        deep_nesting_warning: max_directory_depth >= DEEP_NESTING_THRESHOLD,
    }
}
