//! CLI command definitions and handlers

mod cache;
mod scan;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub use scan::ScanFlags;

/// Parse and validate workers count (1-64)
fn parse_workers(s: &str) -> Result<usize, String> {
    let n: usize = s
        .parse()
        .map_err(|_| format!("'{}' is not a valid number", s))?;
    if n == 0 {
        Err("workers must be at least 1".to_string())
    } else if n > 64 {
        Err("workers cannot exceed 64".to_string())
    } else {
        Ok(n)
    }
}

/// healthscan - code health reports and CI gates
#[derive(Parser, Debug)]
#[command(name = "healthscan")]
#[command(
    version,
    about = "Deterministic code health report for a source tree, usable as a CI gate",
    long_about = "healthscan walks a source tree and combines filesystem and git signals \
(file sizes, nesting depth, test layout, dependency manifests, commit history) \
into a graded health score.\n\n\
Run without a subcommand to scan the current directory:\n  \
healthscan .",
    after_help = "\
Examples:
  healthscan .                             Scan current directory
  healthscan . scan --json                 JSON report for scripting
  healthscan . ci --fail-under B           Exit 2 if the grade is below B
  healthscan . cache stats                 Show the fingerprint cache

Exit codes: 0 success, 1 scan or usage error, 2 CI threshold violated"
)]
pub struct Cli {
    /// Path to repository (default: current directory)
    #[arg(global = true, default_value = ".")]
    pub path: PathBuf,

    /// Log level (error, warn, info, debug, trace)
    #[arg(
        long,
        global = true,
        default_value = "warn",
        value_parser = ["error", "warn", "info", "debug", "trace"]
    )]
    pub log_level: String,

    /// Number of parallel workers (1-64, default: available CPUs)
    #[arg(long, global = true, value_parser = parse_workers)]
    pub workers: Option<usize>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Scan the tree and print a health report
    Scan {
        #[command(flatten)]
        flags: ScanFlags,
    },

    /// Scan and enforce thresholds (exit 2 on violation)
    #[command(after_help = "\
Examples:
  healthscan . ci --fail-under B
  healthscan . ci --max-risk Medium --max-onboarding Moderate --json
  healthscan . ci --no-cache --no-git      Reproducible run without cache or history")]
    Ci {
        #[command(flatten)]
        flags: ScanFlags,

        /// Minimum acceptable grade (A, B, C, D, F)
        #[arg(long)]
        fail_under: Option<String>,

        /// Maximum acceptable risk level (Low, Medium, High)
        #[arg(long)]
        max_risk: Option<String>,

        /// Maximum acceptable onboarding difficulty (Easy, Moderate, Hard)
        #[arg(long)]
        max_onboarding: Option<String>,
    },

    /// Manage the fingerprint cache for this repository
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand, Debug, Clone, Copy)]
pub enum CacheAction {
    /// Delete the stored cache
    Clear,
    /// Show cache location and size
    Stats,
}

/// Run a parsed command line and return the process exit code.
pub fn run(cli: Cli) -> Result<u8> {
    match cli.command {
        None => scan::run(&cli.path, cli.workers, &ScanFlags::default(), None),
        Some(Commands::Scan { flags }) => scan::run(&cli.path, cli.workers, &flags, None),
        Some(Commands::Ci {
            flags,
            fail_under,
            max_risk,
            max_onboarding,
        }) => {
            let gate = scan::GateArgs {
                min_grade: fail_under,
                max_risk,
                max_onboarding,
            };
            scan::run(&cli.path, cli.workers, &flags, Some(&gate))
        }
        Some(Commands::Cache { action }) => cache::run(&cli.path, action),
    }
}
