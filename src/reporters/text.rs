//! Text (terminal) reporter with colors and formatting

use crate::gate::CiSection;
use crate::models::{GitSummary, Grade};
use crate::pipeline::ScanReport;
use console::style;

/// Hotspots shown in the summary
const SHOWN_HOTSPOTS: usize = 5;
/// Languages shown in the summary
const SHOWN_LANGUAGES: usize = 5;

fn styled_grade(grade: Grade) -> String {
    let g = style(grade.as_str()).bold();
    let colored = match grade {
        Grade::A | Grade::B => g.green(),
        Grade::C => g.yellow(),
        Grade::D | Grade::F => g.red(),
    };
    colored.to_string()
}

fn format_score(score: Option<f64>) -> String {
    match score {
        None => style("n/a").dim().to_string(),
        Some(s) if s >= 80.0 => style(format!("{:.0}", s)).green().to_string(),
        Some(s) if s >= 60.0 => style(format!("{:.0}", s)).yellow().to_string(),
        Some(s) => style(format!("{:.0}", s)).red().to_string(),
    }
}

/// Render report as formatted terminal output
pub fn render(report: &ScanReport, ci: Option<&CiSection>) -> String {
    let mut out = String::new();
    let analysis = &report.analysis;
    let health = &report.health;

    out.push_str(&format!("\n{}\n", style(format!("healthscan: {}", report.repo_name)).bold()));
    out.push_str(&format!("{}\n", style("─".repeat(38)).dim()));
    out.push_str(&format!(
        "Score: {}  Grade: {}  Risk: {}  Onboarding: {}\n",
        style(format!("{:.1}/100", health.overall)).bold(),
        styled_grade(health.grade),
        health.risk_level,
        health.onboarding_difficulty
    ));
    out.push_str(&format!(
        "Files: {}  Lines: {}\n\n",
        analysis.total_files, analysis.total_lines
    ));

    let b = &health.breakdown;
    out.push_str(&format!("{}\n", style("SCORES").bold()));
    out.push_str(&format!(
        "  Complexity: {}  Structure: {}  Tests: {}  Git: {}  Hotspots: {}\n\n",
        format_score(b.complexity),
        format_score(b.structure),
        format_score(b.tests),
        format_score(b.git_activity),
        format_score(b.hotspots)
    ));

    if !analysis.languages.is_empty() {
        let mut langs: Vec<(&String, &f64)> = analysis.languages.iter().collect();
        langs.sort_by(|a, b| b.1.total_cmp(a.1).then_with(|| a.0.cmp(b.0)));
        let shown: Vec<String> = langs
            .iter()
            .take(SHOWN_LANGUAGES)
            .map(|(lang, pct)| format!("{} {:.1}%", lang, pct))
            .collect();
        out.push_str(&format!("Languages: {}\n", shown.join(", ")));
    }

    match &analysis.tests {
        Some(t) => out.push_str(&format!(
            "Tests: {} test / {} source files (ratio {:.2})\n",
            t.test_file_count, t.source_file_count, t.test_ratio
        )),
        None => out.push_str("Tests: unknown\n"),
    }

    match &analysis.git {
        GitSummary::Known {
            commit_count,
            contributor_count,
            days_since_last_commit,
            truncated,
        } => {
            let last = days_since_last_commit
                .map(|d| format!("{} days ago", d))
                .unwrap_or_else(|| "never".to_string());
            out.push_str(&format!(
                "Git: {}{} commits, {} contributors, last commit {}\n",
                commit_count,
                if *truncated { "+" } else { "" },
                contributor_count,
                last
            ));
        }
        GitSummary::Unknown { reason } => {
            out.push_str(&format!("Git: {}\n", style(format!("unknown ({})", reason)).dim()));
        }
    }

    for dep in &analysis.dependencies {
        out.push_str(&format!(
            "Dependencies: {} ({}) {}\n",
            dep.ecosystem, dep.manifest_file, dep.dependency_count
        ));
    }

    if !analysis.hotspots.is_empty() {
        out.push_str(&format!(
            "\n{} ({} flagged)\n",
            style("HOTSPOTS").bold(),
            analysis.flagged_files
        ));
        for h in analysis.hotspots.iter().take(SHOWN_HOTSPOTS) {
            out.push_str(&format!(
                "  {:>5.1}  {:<40}  {}\n",
                h.risk_score,
                h.file_path,
                style(&h.reason).dim()
            ));
        }
    }

    let c = &report.cache;
    if c.enabled {
        out.push_str(&format!(
            "\n{}\n",
            style(format!(
                "Cache: {} hits, {} misses ({:.1}%), ~{:.3}s saved",
                c.hits, c.misses, c.hit_rate, c.time_saved_secs
            ))
            .dim()
        ));
    }

    if !report.warnings.is_empty() {
        out.push_str(&format!(
            "{} {} warning(s)\n",
            style("!").yellow(),
            report.warnings.len()
        ));
        for w in &report.warnings {
            out.push_str(&format!("  {}\n", style(w).dim()));
        }
    }

    if let Some(ci) = ci {
        out.push('\n');
        if ci.passed {
            out.push_str(&format!("{}\n", style("CI gate: PASSED").green().bold()));
        } else {
            out.push_str(&format!("{}\n", style("CI gate: FAILED").red().bold()));
            for failure in &ci.failures {
                out.push_str(&format!("  - {}\n", failure));
            }
        }
    }

    out
}
