//! Repository activity from git history using libgit2
//!
//! Reads the commit graph reachable from HEAD: commit count, distinct author
//! emails and the age of the HEAD commit. The walk is bounded by
//! `max_commits`; a bounded walk is flagged as truncated in the summary.
//! When no repository is found (or git analysis is switched off) the summary
//! is the explicit unknown marker, never zeros.

use super::{ExtractionContext, Extractor, PartialMetrics};
use crate::error::{ScanError, ScanResult};
use crate::models::GitSummary;

use anyhow::Result;
use chrono::{DateTime, TimeZone, Utc};
use git2::{ErrorCode, Repository, Sort};
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, warn};

/// Default bound on the history walk
pub const DEFAULT_MAX_COMMITS: usize = 50_000;

pub struct GitExtractor {
    enabled: bool,
    max_commits: usize,
}

impl GitExtractor {
    pub fn new(enabled: bool, max_commits: usize) -> Self {
        Self {
            enabled,
            max_commits: max_commits.max(1),
        }
    }
}

impl Extractor for GitExtractor {
    fn name(&self) -> &'static str {
        "git"
    }

    fn extract(&self, ctx: &ExtractionContext<'_>) -> Result<Option<PartialMetrics>> {
        if !self.enabled {
            return Ok(Some(PartialMetrics::Git(GitSummary::unknown(
                "git analysis disabled",
            ))));
        }

        let summary = match summarize_history(ctx.root, self.max_commits, ctx.reference_time) {
            Ok(summary) => summary,
            Err(e) => {
                warn!("{}", e);
                let reason = match e {
                    ScanError::GitUnavailable(reason) => reason,
                    other => other.to_string(),
                };
                GitSummary::unknown(reason)
            }
        };
        Ok(Some(PartialMetrics::Git(summary)))
    }
}

/// Walk history reachable from HEAD.
pub fn summarize_history(
    root: &Path,
    max_commits: usize,
    reference_time: DateTime<Utc>,
) -> ScanResult<GitSummary> {
    let repo = Repository::discover(root).map_err(|e| {
        ScanError::GitUnavailable(format!("no git repository found: {}", e.message()))
    })?;
    debug!("Opened git repository at {:?}", repo.path());

    let head = match repo.head() {
        Ok(head) => head,
        // Freshly initialised repository, nothing committed yet
        Err(e) if matches!(e.code(), ErrorCode::UnbornBranch | ErrorCode::NotFound) => {
            return Ok(GitSummary::Known {
                commit_count: 0,
                contributor_count: 0,
                days_since_last_commit: None,
                truncated: false,
            });
        }
        Err(e) => return Err(git_error("failed to resolve HEAD", e)),
    };

    let head_commit = head
        .peel_to_commit()
        .map_err(|e| git_error("HEAD does not point at a commit", e))?;
    let days_since_last_commit = days_between(head_commit.time().seconds(), reference_time);

    let mut revwalk = repo.revwalk().map_err(|e| git_error("revwalk failed", e))?;
    revwalk
        .set_sorting(Sort::TIME)
        .map_err(|e| git_error("revwalk failed", e))?;
    revwalk
        .push(head_commit.id())
        .map_err(|e| git_error("revwalk failed", e))?;

    let mut commit_count = 0usize;
    let mut authors: HashSet<String> = HashSet::new();
    let mut truncated = false;

    for oid_result in revwalk {
        if commit_count >= max_commits {
            truncated = true;
            break;
        }

        let oid = oid_result.map_err(|e| git_error("revwalk failed", e))?;
        let commit = repo
            .find_commit(oid)
            .map_err(|e| git_error("failed to read commit", e))?;

        commit_count += 1;
        if let Some(email) = commit.author().email() {
            if !email.is_empty() {
                authors.insert(email.to_lowercase());
            }
        };
    }

    if truncated {
        warn!("Git history walk stopped at {} commits", max_commits);
    }

    Ok(GitSummary::Known {
        commit_count,
        contributor_count: authors.len(),
        days_since_last_commit,
        truncated,
    })
}

fn git_error(context: &str, e: git2::Error) -> ScanError {
    ScanError::GitUnavailable(format!("{}: {}", context, e.message()))
}

/// Whole days from a commit timestamp to the reference time, never negative
fn days_between(commit_seconds: i64, reference_time: DateTime<Utc>) -> Option<i64> {
    let committed = Utc.timestamp_opt(commit_seconds, 0).single()?;
    Some((reference_time - committed).num_days().max(0))
}

/// Display name for a repository.
///
/// The last segment of the `origin` remote URL (without `.git`) when git is
/// in use and such a remote exists, otherwise the root directory name.
pub fn repo_name(root: &Path, use_git: bool) -> String {
    if use_git {
        if let Some(name) = origin_name(root) {
            return name;
        }
    }

    let canonical = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());
    canonical
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "repo".to_string())
}

fn origin_name(root: &Path) -> Option<String> {
    let repo = Repository::discover(root).ok()?;
    let remote = repo.find_remote("origin").ok()?;
    let url = remote.url()?.trim_end_matches('/');
    let last = url.rsplit(['/', ':']).next()?;
    let name = last.trim_end_matches(".git");
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}
