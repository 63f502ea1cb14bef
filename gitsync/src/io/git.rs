//! Git adapter bound to one [`GitContext`].
//!
//! Every invocation goes through [`Git::run`], which prepends the context's
//! global flags, runs in the context's working directory, and emits exactly
//! one [`CommandRecord`] to the sync log.

use std::path::Path;

use tracing::{debug, instrument};

use crate::io::context::GitContext;
use crate::io::log::{CommandRecord, CommandResult, LogEvent, SyncLog};
use crate::io::runner::{CommandError, CommandRunner};

/// Parsed `git status --porcelain` entry.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct StatusEntry {
    /// 2-letter XY code, or "??" for untracked.
    pub code: String,
    /// Path for the changed file.
    pub path: String,
}

/// Wrapper for executing git commands against one context.
pub struct Git<'a, R> {
    context: &'a GitContext,
    runner: &'a R,
    log: &'a dyn SyncLog,
}

impl<'a, R: CommandRunner> Git<'a, R> {
    pub fn new(context: &'a GitContext, runner: &'a R, log: &'a dyn SyncLog) -> Self {
        Self {
            context,
            runner,
            log,
        }
    }

    pub fn context(&self) -> &GitContext {
        self.context
    }

    /// Emit an informational line to the sync log.
    pub fn note(&self, message: impl Into<String>) {
        self.log.emit(LogEvent::Info {
            message: message.into(),
        });
    }

    /// Run `git <global flags> <args>`.
    pub async fn run(&self, label: &str, args: &[&str]) -> Result<String, CommandError> {
        let mut full: Vec<String> = self.context.global_flags.clone();
        full.extend(args.iter().map(|a| (*a).to_string()));
        self.exec(label, "git", full).await
    }

    /// Run a non-git program (e.g. `gh`) in the working directory, without
    /// git's global flags.
    pub async fn run_program(
        &self,
        label: &str,
        program: &str,
        args: &[&str],
    ) -> Result<String, CommandError> {
        let args = args.iter().map(|a| (*a).to_string()).collect();
        self.exec(label, program, args).await
    }

    /// Diagnostic probe: output on success, `None` on any failure.
    pub async fn probe(&self, args: &[&str]) -> Option<String> {
        self.run("diag", args).await.ok()
    }

    async fn exec(
        &self,
        label: &str,
        program: &str,
        args: Vec<String>,
    ) -> Result<String, CommandError> {
        let cwd = &self.context.working_directory;
        let result = self.runner.run(program, &args, cwd).await;
        self.log.emit(LogEvent::Command(CommandRecord {
            label: label.to_string(),
            program: program.to_string(),
            args,
            cwd: cwd.clone(),
            result: match &result {
                Ok(out) => CommandResult::Output(out.clone()),
                Err(err) => CommandResult::Error(err.to_string()),
            },
        }));
        result
    }

    /// True if git considers the context a work tree.
    pub async fn is_inside_work_tree(&self) -> bool {
        self.probe(&["rev-parse", "--is-inside-work-tree"])
            .await
            .is_some_and(|out| out == "true")
    }

    /// True if `HEAD` resolves to a commit.
    pub async fn has_commits(&self) -> bool {
        self.probe(&["rev-parse", "--verify", "HEAD"]).await.is_some()
    }

    /// Check whether a local branch exists.
    pub async fn branch_exists(&self, branch: &str) -> bool {
        let reference = format!("refs/heads/{branch}");
        self.probe(&["show-ref", "--verify", "--quiet", &reference])
            .await
            .is_some()
    }

    /// Current branch name, `None` on detached HEAD or error.
    pub async fn current_branch(&self) -> Option<String> {
        self.probe(&["branch", "--show-current"])
            .await
            .filter(|name| !name.is_empty())
    }

    /// Get status entries (including untracked) in porcelain format.
    pub async fn status_porcelain(&self) -> Result<Vec<StatusEntry>, CommandError> {
        let out = self.run("diag", &["status", "--porcelain"]).await?;
        Ok(out
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(parse_status_line)
            .collect())
    }

    /// True if the working tree has uncommitted or untracked changes.
    ///
    /// An unreadable status counts as clean.
    #[instrument(skip_all)]
    pub async fn is_dirty(&self) -> bool {
        let dirty = self
            .status_porcelain()
            .await
            .is_ok_and(|entries| !entries.is_empty());
        debug!(dirty, "working tree state");
        dirty
    }

    /// Upstream of the current branch, e.g. `origin/main`.
    pub async fn upstream(&self) -> Option<String> {
        self.probe(&["rev-parse", "--abbrev-ref", "--symbolic-full-name", "@{u}"])
            .await
            .filter(|up| !up.is_empty())
    }

    pub async fn remote_url(&self, remote: &str) -> Option<String> {
        self.probe(&["remote", "get-url", remote]).await
    }

    /// Read a config value, `None` if unset.
    pub async fn config_get(&self, key: &str) -> Option<String> {
        self.probe(&["config", "--get", key])
            .await
            .filter(|value| !value.is_empty())
    }

    /// Switch to `branch`, creating it at HEAD if it does not exist.
    pub async fn switch_or_create(&self, branch: &str) -> Result<(), CommandError> {
        if self.current_branch().await.as_deref() == Some(branch) {
            return Ok(());
        }
        if self.branch_exists(branch).await {
            self.run("git", &["checkout", branch]).await?;
        } else {
            self.run("git", &["checkout", "-B", branch]).await?;
        }
        Ok(())
    }

    pub fn work_tree(&self) -> &Path {
        &self.context.work_tree
    }
}

fn parse_status_line(line: &str) -> Option<StatusEntry> {
    if let Some(path) = line.strip_prefix("?? ") {
        return Some(StatusEntry {
            code: "??".to_string(),
            path: path.trim().to_string(),
        });
    }
    if line.len() < 4 || !line.is_char_boundary(2) || !line.is_char_boundary(3) {
        return None;
    }
    let code = line[..2].to_string();
    let mut path = line[3..].trim().to_string();
    if let Some((_, new)) = path.split_once("->") {
        path = new.trim().to_string();
    }
    Some(StatusEntry { code, path })
}
