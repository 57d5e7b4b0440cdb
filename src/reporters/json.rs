//! JSON reporter
//!
//! Outputs the composite report as pretty-printed JSON with every object's
//! keys in sorted order, so unchanged trees diff cleanly.

use crate::gate::CiSection;
use crate::pipeline::ScanReport;
use anyhow::Result;
use serde::Serialize;
use serde_json::{json, Value};

/// Report envelope version
pub const SCHEMA_VERSION: &str = "1.0";

#[derive(Serialize)]
struct Analysis<'a> {
    repo_name: &'a str,
    #[serde(flatten)]
    metrics: &'a crate::models::AnalysisResult,
    health: &'a crate::models::HealthScore,
    cache: &'a crate::cache::CacheStats,
    warnings: &'a [String],
    scan_duration_secs: f64,
}

#[derive(Serialize)]
struct Envelope<'a> {
    schema_version: &'static str,
    healthscan_version: &'static str,
    analysis: Analysis<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ci: Option<&'a CiSection>,
}

/// Render report as JSON
pub fn render(report: &ScanReport, ci: Option<&CiSection>) -> Result<String> {
    let envelope = Envelope {
        schema_version: SCHEMA_VERSION,
        healthscan_version: env!("CARGO_PKG_VERSION"),
        analysis: Analysis {
            repo_name: &report.repo_name,
            metrics: &report.analysis,
            health: &report.health,
            cache: &report.cache,
            warnings: &report.warnings,
            scan_duration_secs: report.scan_duration_secs,
        },
        ci,
    };

    // Value maps are ordered, which sorts every key on the way out
    let value = serde_json::to_value(&envelope)?;
    Ok(serde_json::to_string_pretty(&value)?)
}

/// Error document for a scan that could not complete
pub fn render_error(message: &str) -> String {
    let value: Value = json!({
        "error": message,
        "schema_version": SCHEMA_VERSION,
        "success": false,
    });
    value.to_string()
}
