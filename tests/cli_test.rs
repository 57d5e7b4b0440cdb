//! CLI contract tests
//!
//! Runs the built binary against scratch trees and checks the exit-code
//! contract (0 pass, 1 error, 2 threshold violated), the JSON report shape
//! and the cache behaviour across repeated runs.

use serde_json::Value;
use std::path::Path;
use std::process::Command;
use tempfile::TempDir;

fn healthscan_bin() -> &'static str {
    env!("CARGO_BIN_EXE_healthscan")
}

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

/// A tree with sources, tests and a manifest
fn tested_tree() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "src/app.py", &"value = compute()\n".repeat(120));
    write(dir.path(), "src/models.py", &"class Model:\n    pass\n".repeat(30));
    write(dir.path(), "src/util.py", "def helper():\n    return 1\n");
    write(dir.path(), "tests/test_app.py", "def test_app():\n    assert True\n");
    write(dir.path(), "tests/test_util.py", "def test_helper():\n    assert True\n");
    write(dir.path(), "requirements.txt", "requests>=2.31\nclick\n");
    dir
}

/// One large file and no tests at all: grades F
fn untested_tree() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "app.py", &"x = 1\n".repeat(600));
    dir
}

/// Run the binary with an isolated user cache directory
fn run(cache_home: &Path, args: &[&str]) -> (i32, String, String) {
    let output = Command::new(healthscan_bin())
        .args(args)
        .env("XDG_CACHE_HOME", cache_home)
        .env("HOME", cache_home)
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to run healthscan");
    (
        output.status.code().unwrap_or(-1),
        String::from_utf8_lossy(&output.stdout).to_string(),
        String::from_utf8_lossy(&output.stderr).to_string(),
    )
}

fn parse(stdout: &str) -> Value {
    serde_json::from_str(stdout).unwrap_or_else(|e| panic!("invalid JSON ({}): {}", e, stdout))
}

/// Drop the fields allowed to differ between identical scans
fn stable_part(mut report: Value) -> Value {
    let analysis = report["analysis"].as_object_mut().unwrap();
    analysis.remove("scan_duration_secs");
    analysis.remove("cache");
    report
}

// ============================================================================
// Exit codes
// ============================================================================

#[test]
fn test_scan_exits_zero_with_json_report() {
    let tree = tested_tree();
    let cache = tempfile::tempdir().unwrap();
    let path = tree.path().to_str().unwrap();

    let (code, stdout, _) = run(cache.path(), &[path, "scan", "--json", "--no-git"]);
    assert_eq!(code, 0);

    let report = parse(&stdout);
    assert_eq!(report["schema_version"], "1.0");
    let analysis = &report["analysis"];
    assert_eq!(analysis["total_files"], 6);
    assert_eq!(analysis["tests"]["has_tests"], true);
    assert_eq!(analysis["tests"]["test_file_count"], 2);
    assert_eq!(analysis["dependencies"][0]["manifest_file"], "requirements.txt");
    assert_eq!(analysis["git"]["status"], "unknown");
    assert!(analysis["health"]["breakdown"]["git_activity"].is_null());
    let overall = analysis["health"]["overall"].as_f64().unwrap();
    assert!((0.0..=100.0).contains(&overall));
    assert!(report.get("ci").is_none());
}

#[test]
fn test_ci_pass_exits_zero() {
    let tree = untested_tree();
    let cache = tempfile::tempdir().unwrap();
    let path = tree.path().to_str().unwrap();

    let (code, stdout, _) = run(
        cache.path(),
        &[path, "ci", "--fail-under", "F", "--json", "--no-git"],
    );
    assert_eq!(code, 0);
    let report = parse(&stdout);
    assert_eq!(report["ci"]["passed"], true);
    assert_eq!(report["ci"]["failures"].as_array().unwrap().len(), 0);
}

#[test]
fn test_ci_violation_exits_two_on_grade_axis() {
    let tree = untested_tree();
    let cache = tempfile::tempdir().unwrap();
    let path = tree.path().to_str().unwrap();

    let (code, stdout, _) = run(
        cache.path(),
        &[path, "ci", "--fail-under", "A", "--json", "--no-git"],
    );
    assert_eq!(code, 2);

    let report = parse(&stdout);
    assert_eq!(report["analysis"]["health"]["grade"], "F");
    assert_eq!(report["ci"]["passed"], false);
    assert_eq!(report["ci"]["violations"][0]["axis"], "grade");
    assert_eq!(report["ci"]["failures"][0], "Grade F is below minimum A");
}

#[test]
fn test_ci_text_mode_violation() {
    let tree = untested_tree();
    let cache = tempfile::tempdir().unwrap();
    let path = tree.path().to_str().unwrap();

    let (code, stdout, _) = run(cache.path(), &[path, "ci", "--max-risk", "Low", "--no-git"]);
    assert_eq!(code, 2);
    assert!(stdout.contains("CI gate: FAILED"));
    assert!(stdout.contains("exceeds maximum Low"));
}

#[test]
fn test_missing_root_exits_one() {
    let cache = tempfile::tempdir().unwrap();
    let missing = cache.path().join("does-not-exist");

    let (code, stdout, _) = run(
        cache.path(),
        &[missing.to_str().unwrap(), "ci", "--fail-under", "F", "--json"],
    );
    assert_eq!(code, 1);

    let doc = parse(&stdout);
    assert_eq!(doc["success"], false);
    assert!(doc["error"].as_str().unwrap().contains("does-not-exist"));
    assert!(doc.get("analysis").is_none());
}

#[test]
fn test_file_root_exits_one() {
    let tree = untested_tree();
    let cache = tempfile::tempdir().unwrap();
    let file = tree.path().join("app.py");

    let (code, _, stderr) = run(cache.path(), &[file.to_str().unwrap(), "scan"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("not a directory"));
}

#[test]
fn test_invalid_threshold_exits_one_before_scanning() {
    let tree = untested_tree();
    let cache = tempfile::tempdir().unwrap();
    let path = tree.path().to_str().unwrap();

    let (code, stdout, _) = run(cache.path(), &[path, "ci", "--fail-under", "E", "--json"]);
    assert_eq!(code, 1);
    let doc = parse(&stdout);
    assert!(doc["error"].as_str().unwrap().contains("--fail-under"));

    // Nothing was scanned, so nothing was cached
    assert!(!cache.path().join("healthscan").exists());
}

#[test]
fn test_timeout_cancels_with_error_document() {
    let tree = tested_tree();
    let cache = tempfile::tempdir().unwrap();
    let path = tree.path().to_str().unwrap();

    let (code, stdout, _) = run(
        cache.path(),
        &[path, "ci", "--fail-under", "F", "--json", "--no-git", "--timeout", "0"],
    );
    assert_eq!(code, 1);

    let doc = parse(&stdout);
    assert_eq!(doc["success"], false);
    assert!(doc["error"].as_str().unwrap().contains("cancelled"));
    assert!(doc.get("analysis").is_none());
    assert!(doc.get("ci").is_none());
}

#[test]
fn test_invalid_config_file_exits_one() {
    let tree = untested_tree();
    write(tree.path(), "healthscan.toml", "[gate]\nmax_onboarding = \"Impossible\"\n");
    let cache = tempfile::tempdir().unwrap();

    let (code, _, stderr) = run(cache.path(), &[tree.path().to_str().unwrap(), "ci"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("max_onboarding"));
}

#[test]
fn test_config_thresholds_apply_to_ci() {
    let tree = untested_tree();
    write(tree.path(), "healthscan.toml", "[gate]\nmin_grade = \"C\"\n[git]\nenabled = false\n");
    let cache = tempfile::tempdir().unwrap();

    let (code, stdout, _) = run(cache.path(), &[tree.path().to_str().unwrap(), "ci", "--json"]);
    assert_eq!(code, 2);
    assert_eq!(parse(&stdout)["ci"]["thresholds"]["min_grade"], "C");
}

#[test]
fn test_usage_error_exits_one_and_help_zero() {
    let cache = tempfile::tempdir().unwrap();
    let (code, _, _) = run(cache.path(), &["scan", "--no-such-flag"]);
    assert_eq!(code, 1);

    let (code, stdout, _) = run(cache.path(), &["--help"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("healthscan"));
}

// ============================================================================
// Report stability and cache
// ============================================================================

#[test]
fn test_json_keys_are_sorted() {
    let tree = tested_tree();
    let cache = tempfile::tempdir().unwrap();
    let path = tree.path().to_str().unwrap();

    let (_, stdout, _) = run(cache.path(), &[path, "scan", "--json", "--no-git"]);
    let positions: Vec<usize> = [
        "\"complexity\"",
        "\"dependencies\"",
        "\"git\"",
        "\"health\"",
        "\"hotspots\"",
        "\"languages\"",
        "\"largest_dirs\"",
        "\"repo_name\"",
        "\"total_files\"",
    ]
    .iter()
    .map(|k| stdout.find(k).unwrap_or_else(|| panic!("missing {}", k)))
    .collect();
    assert!(positions.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn test_repeated_scans_are_identical() {
    let tree = tested_tree();
    let cache = tempfile::tempdir().unwrap();
    let path = tree.path().to_str().unwrap();

    let (_, first, _) = run(cache.path(), &[path, "scan", "--json", "--no-git"]);
    let (_, second, _) = run(cache.path(), &[path, "scan", "--json", "--no-git"]);
    assert_eq!(stable_part(parse(&first)), stable_part(parse(&second)));
}

#[test]
fn test_second_scan_served_from_cache() {
    let tree = tested_tree();
    let cache = tempfile::tempdir().unwrap();
    let path = tree.path().to_str().unwrap();

    let (_, first, _) = run(cache.path(), &[path, "scan", "--json", "--no-git"]);
    let first = parse(&first);
    assert_eq!(first["analysis"]["cache"]["hits"], 0);
    assert_eq!(first["analysis"]["cache"]["misses"], 6);

    let (_, second, _) = run(cache.path(), &[path, "scan", "--json", "--no-git"]);
    let second = parse(&second);
    assert_eq!(second["analysis"]["cache"]["hits"], 6);
    assert_eq!(second["analysis"]["cache"]["hit_rate"], 100.0);

    // A changed file misses, the rest still hit
    write(tree.path(), "src/util.py", "def helper():\n    return 2 + 2\n");
    let (_, third, _) = run(cache.path(), &[path, "scan", "--json", "--no-git"]);
    let third = parse(&third);
    assert_eq!(third["analysis"]["cache"]["hits"], 5);
    assert_eq!(third["analysis"]["cache"]["misses"], 1);
}

#[test]
fn test_no_cache_never_hits() {
    let tree = tested_tree();
    let cache = tempfile::tempdir().unwrap();
    let path = tree.path().to_str().unwrap();

    for _ in 0..2 {
        let (code, stdout, _) = run(
            cache.path(),
            &[path, "scan", "--json", "--no-git", "--no-cache"],
        );
        assert_eq!(code, 0);
        let report = parse(&stdout);
        assert_eq!(report["analysis"]["cache"]["enabled"], false);
        assert_eq!(report["analysis"]["cache"]["hits"], 0);
        assert_eq!(report["analysis"]["cache"]["misses"], 6);
    }
}

#[test]
fn test_clear_cache_flag_and_command() {
    let tree = tested_tree();
    let cache = tempfile::tempdir().unwrap();
    let path = tree.path().to_str().unwrap();

    run(cache.path(), &[path, "scan", "--json", "--no-git"]);
    let (_, stdout, _) = run(
        cache.path(),
        &[path, "scan", "--json", "--no-git", "--clear-cache"],
    );
    assert_eq!(parse(&stdout)["analysis"]["cache"]["hits"], 0);

    let (code, stdout, _) = run(cache.path(), &[path, "cache", "stats"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("Entries:     6"));

    let (code, _, _) = run(cache.path(), &[path, "cache", "clear"]);
    assert_eq!(code, 0);
    let (_, stdout, _) = run(cache.path(), &[path, "cache", "stats"]);
    assert!(stdout.contains("Entries:     0"));
}

#[test]
fn test_clear_cache_with_no_cache_still_clears() {
    let tree = tested_tree();
    let cache = tempfile::tempdir().unwrap();
    let path = tree.path().to_str().unwrap();

    run(cache.path(), &[path, "scan", "--json", "--no-git"]);
    run(
        cache.path(),
        &[path, "scan", "--json", "--no-git", "--no-cache", "--clear-cache"],
    );
    let (_, stdout, _) = run(cache.path(), &[path, "cache", "stats"]);
    assert!(stdout.contains("Entries:     0"));
}
