//! Scan and CI commands

use crate::config::{load_project_config, ProjectConfig};
use crate::error::{ConfigError, ScanError};
use crate::gate::{evaluate, CiSection, GateOutcome, ThresholdConfig, EXIT_ERROR, EXIT_PASS};
use crate::pipeline::{ScanOptions, ScanSession};
use crate::reporters::{self, render_error, OutputFormat};

use anyhow::Result;
use clap::Args;
use console::Term;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

/// Flags shared by `scan` and `ci`
#[derive(Args, Debug, Clone, Default)]
pub struct ScanFlags {
    /// Print the composite report as JSON
    #[arg(long)]
    pub json: bool,

    /// Disable the fingerprint cache for this run
    #[arg(long)]
    pub no_cache: bool,

    /// Delete the stored cache before scanning (also with --no-cache)
    #[arg(long)]
    pub clear_cache: bool,

    /// Skip git history analysis
    #[arg(long)]
    pub no_git: bool,

    /// Cancel the scan after this many seconds (exit 1, no report)
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,
}

/// Thresholds given on the command line
#[derive(Debug, Clone, Default)]
pub(super) struct GateArgs {
    pub min_grade: Option<String>,
    pub max_risk: Option<String>,
    pub max_onboarding: Option<String>,
}

impl GateArgs {
    /// Validate the flags, naming the offending one on error
    fn thresholds(&self) -> Result<ThresholdConfig, ConfigError> {
        Ok(ThresholdConfig {
            min_grade: parse_flag(self.min_grade.as_deref(), "--fail-under")?,
            max_risk: parse_flag(self.max_risk.as_deref(), "--max-risk")?,
            max_onboarding: parse_flag(self.max_onboarding.as_deref(), "--max-onboarding")?,
        })
    }
}

fn parse_flag<T>(value: Option<&str>, flag: &str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr<Err = ConfigError>,
{
    value
        .map(str::parse)
        .transpose()
        .map_err(|e: ConfigError| e.with_key(flag))
}

/// Project config first, then command-line flags on top
fn scan_options(config: &ProjectConfig, flags: &ScanFlags, workers: Option<usize>) -> ScanOptions {
    let mut options = config.scan_options();
    if flags.no_cache {
        options.use_cache = false;
    }
    if flags.no_git {
        options.git_enabled = false;
    }
    options.clear_cache = flags.clear_cache;
    options.workers = workers;
    options
}

/// Report a scan that could not complete. No score exists, so no gate runs.
fn fail(flags: &ScanFlags, err: ScanError) -> u8 {
    let message = err.to_string();
    error!("{}", message);
    if flags.json {
        println!("{}", render_error(&message));
    } else {
        eprintln!("Error: {}", message);
    }
    GateOutcome::from_error(&err).exit_code()
}

/// The first termination signal cancels the scan at the next file boundary;
/// a second one exits immediately.
fn install_signal_handlers(cancel: &Arc<AtomicBool>) {
    for &signal in signal_hook::consts::TERM_SIGNALS {
        let installed = signal_hook::flag::register_conditional_shutdown(
            signal,
            i32::from(EXIT_ERROR),
            Arc::clone(cancel),
        )
        .and_then(|_| signal_hook::flag::register(signal, Arc::clone(cancel)));
        if let Err(e) = installed {
            warn!("Failed to install handler for signal {}: {}", signal, e);
        }
    }
}

fn progress_bar() -> ProgressBar {
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▓▒░  ");
    let bar = ProgressBar::new(0).with_style(style);
    bar.set_message("files");
    bar
}

/// Run a scan, gated when `gate` is given. Returns the exit code.
pub(super) fn run(
    path: &Path,
    workers: Option<usize>,
    flags: &ScanFlags,
    gate: Option<&GateArgs>,
) -> Result<u8> {
    // Configuration problems surface before any scan work
    let config = match load_project_config(path) {
        Ok(config) => config,
        Err(e) => return Ok(fail(flags, e.into())),
    };

    let thresholds = match gate {
        Some(args) => {
            let overrides = match args.thresholds() {
                Ok(t) => t,
                Err(e) => return Ok(fail(flags, e.into())),
            };
            let merged = match config.thresholds() {
                Ok(base) => base.merged_with(overrides),
                Err(e) => return Ok(fail(flags, e.into())),
            };
            if merged.is_empty() {
                warn!("No thresholds set by flags or config; the gate always passes");
            }
            Some(merged)
        }
        None => None,
    };

    let options = scan_options(&config, flags, workers);
    debug!("Scan options: {:?}", options);

    let mut session = match ScanSession::new(path, options) {
        Ok(session) => session,
        Err(e) => return Ok(fail(flags, e)),
    };
    if !flags.json && Term::stderr().is_term() {
        session = session.with_progress(progress_bar());
    }
    if let Some(secs) = flags.timeout {
        session = session.with_timeout(Duration::from_secs(secs));
    }
    install_signal_handlers(&session.cancel_handle());

    let report = match session.run() {
        Ok(report) => report,
        Err(e) => return Ok(fail(flags, e)),
    };

    let (ci, code) = match &thresholds {
        Some(t) => {
            let outcome = evaluate(&report.health, t);
            let code = outcome.exit_code();
            (Some(CiSection::new(&report.health, t, &outcome)), code)
        }
        None => (None, EXIT_PASS),
    };

    let format = if flags.json {
        OutputFormat::Json
    } else {
        OutputFormat::Text
    };
    println!("{}", reporters::render(&report, ci.as_ref(), format)?);

    Ok(code)
}
