//! healthscan - deterministic code health reports
//!
//! Walks a source tree, gathers filesystem and git signals through a set of
//! pluggable extractors, and turns them into a graded [`models::HealthScore`]
//! that can gate a CI pipeline. Repeated scans of a mostly unchanged tree are
//! served from a per-repository fingerprint cache.

pub mod aggregate;
pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod extractors;
pub mod gate;
pub mod hotspots;
pub mod models;
pub mod pipeline;
pub mod reporters;
pub mod scoring;
pub mod walker;
