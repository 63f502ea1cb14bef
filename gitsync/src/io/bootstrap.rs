//! Idempotent repository bootstrap.
//!
//! Each step checks persistent repository state before acting, so running
//! bootstrap against an initialized repository is a single probe. Only the
//! raw `git init` is fatal; every other step degrades to a warning.

use std::fs;

use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::core::types::{Mode, StepOutcome};
use crate::error::SyncError;
use crate::io::git::Git;
use crate::io::runner::CommandRunner;

const FALLBACK_USER_NAME: &str = "clike";
const FALLBACK_USER_EMAIL: &str = "dev@local";
const INITIAL_COMMIT_MESSAGE: &str = "chore: initial commit (clike init)";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BootstrapStatus {
    AlreadyInitialized,
    Initialized,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BootstrapReport {
    pub status: BootstrapStatus,
    /// True if bootstrap created a commit (initial or empty).
    pub committed: bool,
    pub warnings: Vec<String>,
}

impl BootstrapReport {
    pub fn outcome(&self) -> StepOutcome {
        let detail = match (self.status, self.committed) {
            (BootstrapStatus::AlreadyInitialized, _) => "repository already initialized",
            (BootstrapStatus::Initialized, true) => "repository initialized",
            (BootstrapStatus::Initialized, false) => "repository initialized without commits",
        };
        StepOutcome::from_warnings(self.warnings.clone(), detail)
    }
}

/// Ensure a repository exists for the context, with identity and a
/// materialized `default_branch`.
#[instrument(skip_all, fields(default_branch = %default_branch))]
pub async fn ensure_repo<R: CommandRunner>(
    git: &Git<'_, R>,
    default_branch: &str,
) -> Result<BootstrapReport, SyncError> {
    if git.is_inside_work_tree().await {
        git.note("[git:init] repository already initialized");
        return Ok(BootstrapReport {
            status: BootstrapStatus::AlreadyInitialized,
            committed: false,
            warnings: Vec::new(),
        });
    }
    git.note("[git:init] repository not initialized, creating");
    let ctx = git.context();
    let mut warnings = Vec::new();

    if ctx.mode == Mode::Detached
        && let Some(parent) = ctx.metadata_directory.parent()
        && let Err(err) = fs::create_dir_all(parent)
    {
        warn!(err = %err, dir = %parent.display(), "cannot create detached repository dir");
        warnings.push(format!("create {}: {err}", parent.display()));
    }

    if git.run("init", &["init", "-b", default_branch]).await.is_err() {
        git.run("init", &["init"])
            .await
            .map_err(|source| SyncError::InitFailed {
                dir: ctx.metadata_directory.clone(),
                source,
            })?;
        if let Err(err) = git.run("init", &["checkout", "-b", default_branch]).await {
            warnings.push(format!("create branch {default_branch}: {err}"));
        }
    }
    info!(mode = ?ctx.mode, dir = %ctx.metadata_directory.display(), "repository initialized");

    if ctx.mode == Mode::Detached {
        let work_tree = ctx.work_tree.to_string_lossy().into_owned();
        if let Err(err) = git
            .run("init", &["config", "core.worktree", &work_tree])
            .await
        {
            warnings.push(format!("set core.worktree: {err}"));
        }
    }

    ensure_identity(git, &mut warnings).await;

    let mut committed = initial_commit(git, &mut warnings).await;
    committed |= ensure_default_branch(git, default_branch, &mut warnings).await;

    Ok(BootstrapReport {
        status: BootstrapStatus::Initialized,
        committed,
        warnings,
    })
}

async fn ensure_identity<R: CommandRunner>(git: &Git<'_, R>, warnings: &mut Vec<String>) {
    if git.config_get("user.name").await.is_none() {
        let name = os_username();
        if let Err(err) = git.run("init", &["config", "user.name", &name]).await {
            warnings.push(format!("set user.name: {err}"));
        }
    }
    if git.config_get("user.email").await.is_none()
        && let Err(err) = git
            .run("init", &["config", "user.email", FALLBACK_USER_EMAIL])
            .await
    {
        warnings.push(format!("set user.email: {err}"));
    }
}

/// Stage everything and commit it if anything was staged.
async fn initial_commit<R: CommandRunner>(git: &Git<'_, R>, warnings: &mut Vec<String>) -> bool {
    if let Err(err) = git.run("init", &["add", "-A"]).await {
        warnings.push(format!("stage initial files: {err}"));
        return false;
    }
    // `diff --cached --quiet` exits 0 when nothing is staged.
    if git.probe(&["diff", "--cached", "--quiet"]).await.is_some() {
        git.note("[git:init] empty repo, nothing to commit");
        return false;
    }
    match git
        .run("init", &["commit", "-m", INITIAL_COMMIT_MESSAGE])
        .await
    {
        Ok(_) => true,
        Err(err) => {
            warnings.push(format!("initial commit: {err}"));
            false
        }
    }
}

/// Check out `branch` and, in a repository with no commits, materialize its
/// ref with an empty commit.
async fn ensure_default_branch<R: CommandRunner>(
    git: &Git<'_, R>,
    branch: &str,
    warnings: &mut Vec<String>,
) -> bool {
    let has_commits = git.has_commits().await;
    if let Err(err) = git.run("init", &["checkout", "-B", branch]).await {
        warnings.push(format!("checkout -B {branch}: {err}"));
    }
    if has_commits {
        return false;
    }
    let message = format!("chore: bootstrap {branch}");
    match git
        .run("init", &["commit", "--allow-empty", "-m", &message])
        .await
    {
        Ok(_) => true,
        Err(err) => {
            warnings.push(format!("bootstrap empty commit: {err}"));
            false
        }
    }
}

fn os_username() -> String {
    ["USER", "USERNAME", "LOGNAME"]
        .iter()
        .filter_map(|key| std::env::var(key).ok())
        .map(|name| name.trim().to_string())
        .find(|name| !name.is_empty())
        .unwrap_or_else(|| FALLBACK_USER_NAME.to_string())
}
