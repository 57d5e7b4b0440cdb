//! Test-coverage heuristic
//!
//! No test is ever run. A file counts as a test when it has a source-code
//! extension and either lives under a test-designated directory or carries a
//! recognised test affix in its name. Every other source-code file is a
//! source file. The ratio of the two is the coverage signal.

use super::{ExtractionContext, Extractor, PartialMetrics};
use crate::models::{FileRecord, TestSummary};

use anyhow::Result;
use std::collections::HashMap;

/// Directory names that mark everything below them as tests
pub const TEST_DIRS: &[&str] = &[
    "test",
    "tests",
    "__tests__",
    "spec",
    "specs",
    "testing",
    "test_unit",
    "test_integration",
];

/// Extensions of files that hold code
pub const SOURCE_EXTENSIONS: &[&str] = &[
    "py", "js", "ts", "jsx", "tsx", "java", "kt", "scala", "rb", "php", "go", "rs", "c", "cpp",
    "cc", "cxx", "h", "hpp", "cs", "swift", "m", "mm", "dart", "lua", "pl", "r", "vue",
];

/// Lowercase stem prefixes marking a test file
const TEST_PREFIXES: &[&str] = &["test_"];

/// Lowercase stem suffixes marking a test file
const TEST_SUFFIXES: &[&str] = &["_test", ".test", "_spec", ".spec"];

/// Case-sensitive CamelCase suffixes (`FooTest.java`, `FooTests.kt`)
const CAMEL_SUFFIXES: &[&str] = &["Tests", "Test"];

pub struct TestCoverageExtractor;

impl Extractor for TestCoverageExtractor {
    fn name(&self) -> &'static str {
        "tests"
    }

    fn extract(&self, ctx: &ExtractionContext<'_>) -> Result<Option<PartialMetrics>> {
        Ok(Some(PartialMetrics::Tests(summarize(ctx.files))))
    }
}

/// Count test and source files.
pub fn summarize(files: &[FileRecord]) -> TestSummary {
    let mut test_file_count = 0;
    let mut source_file_count = 0;

    for file in files.iter().filter(|f| is_source_path(&f.rel_path)) {
        if is_test_path(&file.rel_path) {
            test_file_count += 1;
        } else {
            source_file_count += 1;
        }
    }

    let test_ratio = if source_file_count == 0 {
        0.0
    } else {
        round3(test_file_count as f64 / source_file_count as f64)
    };

    TestSummary {
        has_tests: test_file_count > 0,
        test_file_count,
        source_file_count,
        test_ratio,
    }
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

fn split_path(rel_path: &str) -> (Option<&str>, &str) {
    match rel_path.rsplit_once('/') {
        Some((dir, name)) => (Some(dir), name),
        None => (None, rel_path),
    }
}

fn stem_and_extension(name: &str) -> Option<(&str, &str)> {
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        None
    } else {
        Some((stem, ext))
    }
}

/// Whether a path has a source-code extension
pub fn is_source_path(rel_path: &str) -> bool {
    let (_, name) = split_path(rel_path);
    stem_and_extension(name)
        .map(|(_, ext)| SOURCE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

fn in_test_dir(rel_path: &str) -> bool {
    match split_path(rel_path).0 {
        Some(dir) => dir
            .split('/')
            .any(|part| TEST_DIRS.contains(&part.to_lowercase().as_str())),
        None => false,
    }
}

/// Whether a source path is a test
pub fn is_test_path(rel_path: &str) -> bool {
    if !is_source_path(rel_path) {
        return false;
    }
    if in_test_dir(rel_path) {
        return true;
    }
    let (_, name) = split_path(rel_path);
    stem_and_extension(name)
        .map(|(stem, _)| {
            let lower = stem.to_lowercase();
            lower == "test" || lower == "tests" || lower == "spec" || tested_stem(stem).is_some()
        })
        .unwrap_or(false)
}

/// The stem a test file is named after: `test_foo` and `FooTest` both give `foo`.
pub fn tested_stem(stem: &str) -> Option<String> {
    let lower = stem.to_lowercase();

    for prefix in TEST_PREFIXES {
        if let Some(rest) = lower.strip_prefix(prefix) {
            if !rest.is_empty() {
                return Some(rest.to_string());
            }
        }
    }
    for suffix in TEST_SUFFIXES {
        if let Some(rest) = lower.strip_suffix(suffix) {
            if !rest.is_empty() {
                return Some(rest.to_string());
            }
        }
    }
    for suffix in CAMEL_SUFFIXES {
        if let Some(rest) = stem.strip_suffix(suffix) {
            if !rest.is_empty() {
                return Some(rest.to_lowercase());
            }
        }
    }
    None
}

/// Directory holding the outermost test directory in `dir`, `""` for the root
fn parent_of_test_dir(dir: &str) -> Option<String> {
    let parts: Vec<&str> = dir.split('/').collect();
    let pos = parts
        .iter()
        .position(|part| TEST_DIRS.contains(&part.to_lowercase().as_str()))?;
    Some(parts[..pos].join("/"))
}

/// Whether `base` is `dir` or one of its ancestors
fn is_ancestor(base: &str, dir: Option<&str>) -> bool {
    if base.is_empty() {
        return true;
    }
    match dir {
        Some(dir) => dir
            .strip_prefix(base)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('/')),
        None => false,
    }
}

/// Location of one test file, keyed by the stem it tests
#[derive(Debug, Clone)]
struct TestLocation {
    dir: Option<String>,
    /// Set when the test lives under a test directory
    test_dir_parent: Option<String>,
}

/// Lookup of test files by the source stem they are named after.
///
/// A source file has a nearby test when some test file is named after its
/// stem and that test lives either in the source file's own directory or
/// under a test directory whose parent is an ancestor of the source file.
#[derive(Debug, Default)]
pub struct TestIndex {
    by_stem: HashMap<String, Vec<TestLocation>>,
}

impl TestIndex {
    pub fn build(files: &[FileRecord]) -> Self {
        let mut by_stem: HashMap<String, Vec<TestLocation>> = HashMap::new();

        for file in files.iter().filter(|f| is_test_path(&f.rel_path)) {
            let (dir, name) = split_path(&file.rel_path);
            let Some((stem, _)) = stem_and_extension(name) else {
                continue;
            };
            // Files inside test directories need no affix (`tests/parser.rs`)
            let key = match tested_stem(stem) {
                Some(key) => key,
                None => stem.to_lowercase(),
            };
            by_stem.entry(key).or_default().push(TestLocation {
                dir: dir.map(str::to_string),
                test_dir_parent: dir.and_then(parent_of_test_dir),
            });
        }

        Self { by_stem }
    }

    pub fn has_nearby_test(&self, rel_path: &str) -> bool {
        let (dir, name) = split_path(rel_path);
        let Some((stem, _)) = stem_and_extension(name) else {
            return false;
        };
        let Some(locations) = self.by_stem.get(&stem.to_lowercase()) else {
            return false;
        };
        locations.iter().any(|loc| {
            loc.dir.as_deref() == dir
                || loc
                    .test_dir_parent
                    .as_deref()
                    .is_some_and(|base| is_ancestor(base, dir))
        })
    }
}
