//! Project-level configuration support
//!
//! Loads per-project configuration from `healthscan.toml` or
//! `.healthscanrc.json` in the scan root.
//!
//! # Configuration Format
//!
//! ```toml
//! # healthscan.toml
//!
//! [gate]
//! min_grade = "B"
//! max_risk = "Medium"
//! max_onboarding = "Moderate"
//!
//! [cache]
//! enabled = true
//!
//! [git]
//! enabled = true
//! max_commits = 50000
//!
//! [exclude]
//! paths = ["generated/", "**/*.min.js"]
//!
//! [hotspots]
//! top = 10
//! ```
//!
//! Unlike a missing file, a file that exists but does not parse is an
//! error: gate thresholds live here and must never be silently dropped.

use crate::error::ConfigError;
use crate::extractors::git::DEFAULT_MAX_COMMITS;
use crate::gate::ThresholdConfig;
use crate::hotspots::DEFAULT_TOP_K;
use crate::pipeline::ScanOptions;

use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Config file names, in lookup order
pub const CONFIG_FILES: &[&str] = &["healthscan.toml", ".healthscanrc.json"];

/// Project-level configuration loaded from healthscan.toml or .healthscanrc.json
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProjectConfig {
    #[serde(default)]
    pub gate: GateConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub git: GitConfig,

    /// Path exclusion patterns
    #[serde(default)]
    pub exclude: ExcludeConfig,

    #[serde(default)]
    pub hotspots: HotspotConfig,
}

/// CI thresholds, as written in the file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GateConfig {
    pub min_grade: Option<String>,
    pub max_risk: Option<String>,
    pub max_onboarding: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CacheConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Overrides the per-root directory under the user cache dir
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GitConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Bound on the history walk
    #[serde(default = "default_max_commits")]
    pub max_commits: usize,
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_commits: DEFAULT_MAX_COMMITS,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExcludeConfig {
    /// Gitignore-style patterns to exclude from analysis
    #[serde(default)]
    pub paths: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HotspotConfig {
    /// Length of the reported hotspot list
    #[serde(default = "default_top_k")]
    pub top: usize,
}

impl Default for HotspotConfig {
    fn default() -> Self {
        Self { top: DEFAULT_TOP_K }
    }
}

fn default_true() -> bool {
    true
}

fn default_max_commits() -> usize {
    DEFAULT_MAX_COMMITS
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

impl ProjectConfig {
    /// Gate thresholds, validated against their enumerations
    pub fn thresholds(&self) -> Result<ThresholdConfig, ConfigError> {
        ThresholdConfig::parse(
            self.gate.min_grade.as_deref(),
            self.gate.max_risk.as_deref(),
            self.gate.max_onboarding.as_deref(),
        )
    }

    /// Scan options implied by the file alone, before CLI overrides
    pub fn scan_options(&self) -> ScanOptions {
        ScanOptions {
            use_cache: self.cache.enabled,
            cache_dir: self.cache.dir.clone(),
            git_enabled: self.git.enabled,
            max_commits: self.git.max_commits,
            top_k: self.hotspots.top,
            exclude: self.exclude.paths.clone(),
            ..ScanOptions::default()
        }
    }

    fn validate(&self, path: &Path) -> Result<(), ConfigError> {
        self.thresholds()?;
        if self.git.max_commits == 0 {
            return Err(ConfigError::invalid("git.max_commits", "0", "a positive integer"));
        }
        if self.hotspots.top == 0 {
            return Err(ConfigError::invalid("hotspots.top", "0", "a positive integer"));
        }
        debug!("Validated project config from {}", path.display());
        Ok(())
    }

    fn rooted_at(mut self, repo_path: &Path) -> Self {
        if let Some(dir) = self.cache.dir.take() {
            self.cache.dir = Some(if dir.is_relative() {
                repo_path.join(dir)
            } else {
                dir
            });
        }
        self
    }
}

/// Load project configuration from the scan root.
///
/// Searches for `healthscan.toml`, then `.healthscanrc.json`. Returns the
/// default configuration if neither exists. A relative `cache.dir` is taken
/// relative to the scan root, not the working directory.
pub fn load_project_config(repo_path: &Path) -> Result<ProjectConfig, ConfigError> {
    let toml_path = repo_path.join(CONFIG_FILES[0]);
    if toml_path.is_file() {
        let content = read_config(&toml_path)?;
        let config: ProjectConfig = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: toml_path.clone(),
            message: e.to_string(),
        })?;
        config.validate(&toml_path)?;
        debug!("Loaded project config from {}", toml_path.display());
        return Ok(config.rooted_at(repo_path));
    }

    let json_path = repo_path.join(CONFIG_FILES[1]);
    if json_path.is_file() {
        let content = read_config(&json_path)?;
        let config: ProjectConfig =
            serde_json::from_str(&content).map_err(|e| ConfigError::Parse {
                path: json_path.clone(),
                message: e.to_string(),
            })?;
        config.validate(&json_path)?;
        debug!("Loaded project config from {}", json_path.display());
        return Ok(config.rooted_at(repo_path));
    }

    debug!("No project config found, using defaults");
    Ok(ProjectConfig::default())
}

fn read_config(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}
