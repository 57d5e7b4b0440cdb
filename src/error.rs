//! Error taxonomy for a scan
//!
//! Only [`ScanError::Path`], [`ScanError::Config`], [`ScanError::Cancelled`]
//! and [`ScanError::Io`] abort a scan. The other variants are recorded as
//! warnings and the affected data is marked absent.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while scanning a tree
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Invalid scan root {path}: {reason}")]
    Path { path: PathBuf, reason: String },

    #[error("Cannot read {path}: {source}")]
    FileAccess {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Git data unavailable: {0}")]
    GitUnavailable(String),

    #[error("Discarded cache data for {key}: {reason}")]
    CacheCorruption { key: String, reason: String },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Scan cancelled after {completed} of {total} files")]
    Cancelled { completed: usize, total: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ScanError {
    pub fn path(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        ScanError::Path {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn cache_corruption(key: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        ScanError::CacheCorruption {
            key: key.into(),
            reason: reason.to_string(),
        }
    }
}

/// Invalid configuration, reported before any scan work begins
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value '{value}' for {key} (expected one of: {expected})")]
    InvalidValue {
        key: String,
        value: String,
        expected: String,
    },

    #[error("failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("invalid exclude pattern '{pattern}': {message}")]
    Pattern { pattern: String, message: String },
}

impl ConfigError {
    pub fn invalid(key: &str, value: &str, expected: &str) -> Self {
        ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            expected: expected.to_string(),
        }
    }

    /// Name an invalid value after the option the user actually set
    pub fn with_key(self, key: &str) -> Self {
        match self {
            ConfigError::InvalidValue {
                value, expected, ..
            } => ConfigError::InvalidValue {
                key: key.to_string(),
                value,
                expected,
            },
            other => other,
        }
    }
}

pub type ScanResult<T> = Result<T, ScanError>;
