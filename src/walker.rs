//! File discovery and classification
//!
//! Discovery walks the tree under gitignore rules plus a fixed set of skip
//! directories and yields one [`DiscoveredFile`] per regular file, carrying
//! only what `stat` provides. Classification reads the file and produces the
//! cacheable [`FileMetrics`] (binary flag, line count, language).

use crate::cache::Fingerprint;
use crate::error::{ConfigError, ScanError, ScanResult};
use crate::models::{FileMetrics, FileRecord};

use ignore::overrides::OverrideBuilder;
use ignore::WalkBuilder;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

/// Bytes inspected when deciding whether a file is binary
const BINARY_SAMPLE_SIZE: usize = 8192;

/// Share of non-text bytes above which a sample counts as binary
const NON_TEXT_RATIO: f64 = 0.3;

/// Directories never descended into, regardless of ignore files
pub const SKIP_DIRS: &[&str] = &[
    ".git",
    ".svn",
    ".hg",
    ".bzr",
    "node_modules",
    "venv",
    "env",
    ".env",
    "dist",
    "build",
    "target",
    "out",
    "__pycache__",
    ".pytest_cache",
    ".mypy_cache",
    ".tox",
    ".eggs",
    "vendor",
    "bower_components",
    ".vscode",
    ".idea",
    ".vs",
];

/// Extension to language name
const LANGUAGES: &[(&str, &str)] = &[
    ("py", "Python"),
    ("js", "JavaScript"),
    ("jsx", "JavaScript"),
    ("ts", "TypeScript"),
    ("tsx", "TypeScript"),
    ("java", "Java"),
    ("c", "C"),
    ("cpp", "C++"),
    ("cc", "C++"),
    ("cxx", "C++"),
    ("hpp", "C++"),
    ("h", "C/C++"),
    ("cs", "C#"),
    ("go", "Go"),
    ("rs", "Rust"),
    ("rb", "Ruby"),
    ("php", "PHP"),
    ("swift", "Swift"),
    ("kt", "Kotlin"),
    ("scala", "Scala"),
    ("sh", "Shell"),
    ("bash", "Shell"),
    ("zsh", "Shell"),
    ("sql", "SQL"),
    ("html", "HTML"),
    ("css", "CSS"),
    ("scss", "SCSS"),
    ("sass", "Sass"),
    ("less", "Less"),
    ("md", "Markdown"),
    ("json", "JSON"),
    ("yaml", "YAML"),
    ("yml", "YAML"),
    ("xml", "XML"),
    ("toml", "TOML"),
    ("ini", "INI"),
    ("vue", "Vue"),
    ("r", "R"),
    ("m", "MATLAB"),
    ("pl", "Perl"),
    ("lua", "Lua"),
    ("dart", "Dart"),
];

/// Look up the language for a lowercased extension
pub fn language_for_extension(ext: &str) -> Option<&'static str> {
    LANGUAGES
        .iter()
        .find(|(e, _)| *e == ext)
        .map(|(_, lang)| *lang)
}

/// Ignore configuration for a walk
#[derive(Debug, Clone)]
pub struct IgnoreRules {
    skip_dirs: BTreeSet<String>,
    /// Extra gitignore-style patterns to exclude
    patterns: Vec<String>,
}

impl Default for IgnoreRules {
    fn default() -> Self {
        Self {
            skip_dirs: SKIP_DIRS.iter().map(|s| s.to_string()).collect(),
            patterns: Vec::new(),
        }
    }
}

impl IgnoreRules {
    pub fn with_patterns(mut self, patterns: impl IntoIterator<Item = String>) -> Self {
        self.patterns.extend(patterns);
        self
    }

    fn skips_dir(&self, name: &str) -> bool {
        self.skip_dirs.contains(name) || name.ends_with(".egg-info")
    }
}

/// A regular file found during the walk, before it is read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredFile {
    pub path: PathBuf,
    pub rel_path: String,
    pub size: u64,
    pub mtime_ns: i64,
}

impl DiscoveredFile {
    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint {
            path: self.rel_path.clone(),
            size: self.size,
            mtime_ns: self.mtime_ns,
        }
    }

    pub fn into_record(self, metrics: FileMetrics) -> FileRecord {
        FileRecord {
            path: self.path,
            rel_path: self.rel_path,
            size: self.size,
            mtime_ns: self.mtime_ns,
            is_binary: metrics.is_binary,
            line_count: metrics.line_count,
            language: metrics.language,
        }
    }
}

/// Files found plus the entries that had to be skipped
#[derive(Debug, Default)]
pub struct WalkOutcome {
    /// Sorted by relative path
    pub files: Vec<DiscoveredFile>,
    pub warnings: Vec<String>,
}

/// Walk `root` and return every file that survives the ignore rules.
///
/// A single unreadable entry never aborts the walk; it becomes a warning.
pub fn discover(root: &Path, rules: &IgnoreRules) -> ScanResult<WalkOutcome> {
    let mut builder = WalkBuilder::new(root);
    builder
        .hidden(true)
        .git_ignore(true)
        .git_global(false)
        .git_exclude(true)
        .require_git(false)
        .follow_links(false)
        .add_custom_ignore_filename(".healthscanignore")
        .sort_by_file_name(|a, b| a.cmp(b));

    if !rules.patterns.is_empty() {
        let mut overrides = OverrideBuilder::new(root);
        for pattern in &rules.patterns {
            overrides
                .add(&format!("!{}", pattern))
                .map_err(|e| ConfigError::Pattern {
                    pattern: pattern.clone(),
                    message: e.to_string(),
                })?;
        }
        let overrides = overrides.build().map_err(|e| ConfigError::Pattern {
            pattern: rules.patterns.join(", "),
            message: e.to_string(),
        })?;
        builder.overrides(overrides);
    }

    let skip = rules.clone();
    builder.filter_entry(move |entry| {
        let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
        !(is_dir && entry.depth() > 0 && skip.skips_dir(&entry.file_name().to_string_lossy()))
    });

    let mut outcome = WalkOutcome::default();

    for entry in builder.build() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable entry: {}", e);
                outcome.warnings.push(format!("skipped entry: {}", e));
                continue;
            }
        };

        if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
            continue;
        }

        let path = entry.path();
        let metadata = match entry.metadata() {
            Ok(m) => m,
            Err(e) => {
                warn!("Cannot stat {}: {}", path.display(), e);
                outcome
                    .warnings
                    .push(format!("skipped {}: {}", path.display(), e));
                continue;
            }
        };

        let Some(rel_path) = relative_path(root, path) else {
            debug!("Entry outside root: {}", path.display());
            continue;
        };

        let mtime_ns = metadata.modified().map(system_time_ns).unwrap_or(0);

        outcome.files.push(DiscoveredFile {
            path: path.to_path_buf(),
            rel_path,
            size: metadata.len(),
            mtime_ns,
        });
    }

    outcome.files.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));
    debug!("Discovered {} files under {}", outcome.files.len(), root.display());

    Ok(outcome)
}

/// Read a file and compute its cacheable metrics.
pub fn classify(file: &DiscoveredFile) -> ScanResult<FileMetrics> {
    let bytes = std::fs::read(&file.path).map_err(|source| ScanError::FileAccess {
        path: file.path.clone(),
        source,
    })?;

    let is_binary = is_binary(&bytes);
    let line_count = if is_binary { 0 } else { count_lines(&bytes) };

    Ok(FileMetrics {
        is_binary,
        line_count,
        language: language_for_path(&file.rel_path),
    })
}

/// Heuristic binary check on the leading sample of a file.
pub fn is_binary(bytes: &[u8]) -> bool {
    let sample = &bytes[..bytes.len().min(BINARY_SAMPLE_SIZE)];
    if sample.is_empty() {
        return false;
    }
    if memchr::memchr(0, sample).is_some() {
        return true;
    }

    let non_text = sample.iter().filter(|b| !is_text_byte(**b)).count();
    non_text as f64 / sample.len() as f64 > NON_TEXT_RATIO
}

fn is_text_byte(b: u8) -> bool {
    matches!(b, 7 | 8 | 9 | 10 | 12 | 13 | 27) || (b >= 0x20 && b != 0x7f)
}

/// Number of lines, counting a trailing unterminated line.
pub fn count_lines(bytes: &[u8]) -> u64 {
    if bytes.is_empty() {
        return 0;
    }
    let newlines = memchr::memchr_iter(b'\n', bytes).count() as u64;
    if bytes.last() == Some(&b'\n') {
        newlines
    } else {
        newlines + 1
    }
}

fn language_for_path(rel_path: &str) -> Option<String> {
    let name = rel_path.rsplit('/').next()?;
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() {
        return None;
    }
    language_for_extension(&ext.to_lowercase()).map(String::from)
}

fn relative_path(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

fn system_time_ns(time: SystemTime) -> i64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(d) => d.as_nanos().min(i64::MAX as u128) as i64,
        Err(e) => -(e.duration().as_nanos().min(i64::MAX as u128) as i64),
    }
}
