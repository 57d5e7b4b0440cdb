//! Configuration module for healthscan
//!
//! This module handles:
//! - Project-level configuration (healthscan.toml)
//! - CI gate thresholds
//! - Cache, git and hotspot settings

mod project_config;

pub use project_config::{
    load_project_config, CacheConfig, ExcludeConfig, GateConfig, GitConfig, HotspotConfig,
    ProjectConfig, CONFIG_FILES,
};
