//! Network, branch, and commit steps of a sync. Each returns a
//! [`StepOutcome`]; none of them can abort the sequence.

use tracing::{debug, info};

use crate::core::path::normalize_changed_files;
use crate::core::types::StepOutcome;
use crate::io::config::GitSettings;
use crate::io::git::Git;
use crate::io::runner::CommandRunner;

/// Resolved inputs shared by the steps after routing.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Plan<'a> {
    pub settings: &'a GitSettings,
    pub branch: &'a str,
    pub has_remote: bool,
}

impl Plan<'_> {
    pub fn remote(&self) -> &str {
        &self.settings.remote_name
    }

    pub fn default_branch(&self) -> &str {
        &self.settings.default_branch
    }

    /// Rebase onto the remote default branch before committing.
    pub fn rebases(&self) -> bool {
        self.has_remote && self.settings.push_rebase
    }
}

pub(crate) async fn fetch<R: CommandRunner>(git: &Git<'_, R>, plan: &Plan<'_>) -> StepOutcome {
    if !plan.has_remote {
        return StepOutcome::skipped("no remote");
    }
    match git.run("git", &["fetch", plan.remote()]).await {
        Ok(_) => StepOutcome::done(),
        Err(err) => StepOutcome::warning(format!("fetch {}: {err}", plan.remote())),
    }
}

/// Put HEAD on the target branch.
///
/// An existing target is switched to without resetting it. A new one is cut
/// from the default branch after pulling it. Either way a requirement branch
/// is then rebased onto the remote default.
pub(crate) async fn sync_branch<R: CommandRunner>(
    git: &Git<'_, R>,
    plan: &Plan<'_>,
) -> StepOutcome {
    let target = plan.branch;
    let default = plan.default_branch();
    let mut warnings = Vec::new();

    if git.branch_exists(target).await {
        let detail = if git.current_branch().await.as_deref() == Some(target) {
            format!("already on {target}")
        } else {
            if let Err(err) = git.run("git", &["checkout", target]).await {
                return StepOutcome::warning(format!("checkout {target}: {err}"));
            }
            format!("switched to {target}")
        };
        if target != default && plan.rebases() {
            rebase_onto_default(git, plan, &mut warnings).await;
        }
        return StepOutcome::from_warnings(warnings, detail);
    }

    if plan.rebases() {
        if let Err(err) = git.switch_or_create(default).await {
            warnings.push(format!("switch to {default}: {err}"));
        }
        let autostash = git.is_dirty().await;
        let mut args = vec!["pull", "--rebase"];
        if autostash {
            args.push("--autostash");
        }
        args.extend([plan.remote(), default]);
        if let Err(err) = git.run("git", &args).await {
            warnings.push(format!("pull --rebase {} {default}: {err}", plan.remote()));
        }
    }

    if !git.branch_exists(target).await
        && let Err(err) = git.run("git", &["checkout", "-B", target]).await
    {
        warnings.push(format!("checkout -B {target}: {err}"));
    }

    if target != default && plan.rebases() {
        rebase_onto_default(git, plan, &mut warnings).await;
    }
    StepOutcome::from_warnings(warnings, format!("created {target}"))
}

async fn rebase_onto_default<R: CommandRunner>(
    git: &Git<'_, R>,
    plan: &Plan<'_>,
    warnings: &mut Vec<String>,
) {
    let default = plan.default_branch();
    if let Err(err) = git.run("git", &["fetch", plan.remote(), default]).await {
        warnings.push(format!("fetch {} {default}: {err}", plan.remote()));
        return;
    }
    let upstream = format!("{}/{default}", plan.remote());
    let autostash = git.is_dirty().await;
    let mut args = vec!["rebase"];
    if autostash {
        args.push("--autostash");
    }
    args.push(&upstream);
    if let Err(err) = git.run("git", &args).await {
        warnings.push(format!("rebase {upstream}: {err}"));
    }
}

/// Stage the changed files, or everything when none were given.
///
/// `kit_req_id` maps kit output paths to the workspace files they produce.
/// If the batch `add` fails, files are retried one at a time and the ones git
/// rejects are skipped.
pub(crate) async fn stage<R: CommandRunner>(
    git: &Git<'_, R>,
    changed: &[String],
    kit_req_id: Option<&str>,
) -> StepOutcome {
    let files = normalize_changed_files(changed, git.work_tree(), kit_req_id);
    if files.is_empty() {
        return match git.run("git", &["add", "-A"]).await {
            Ok(_) => StepOutcome::done_with("staged all changes"),
            Err(err) => StepOutcome::warning(format!("add -A: {err}")),
        };
    }

    let mut args = vec!["add", "--"];
    args.extend(files.iter().map(String::as_str));
    let Err(batch_err) = git.run("git", &args).await else {
        return StepOutcome::done_with(format!("staged {} file(s)", files.len()));
    };
    debug!(err = %batch_err, "batch add failed, retrying per file");

    let mut skipped = Vec::new();
    for file in &files {
        if let Err(err) = git.run("git", &["add", "--", file]).await {
            git.note(format!("[git] add skip file '{file}': {err}"));
            skipped.push(file.as_str());
        }
    }
    if skipped.is_empty() {
        StepOutcome::done_with(format!("staged {} file(s)", files.len()))
    } else {
        StepOutcome::warning(format!("skipped {}", skipped.join(", ")))
    }
}

pub(crate) async fn commit<R: CommandRunner>(git: &Git<'_, R>, message: &str) -> StepOutcome {
    match git.run("git", &["commit", "-m", message]).await {
        Ok(_) => StepOutcome::done(),
        Err(err) if err.mentions("nothing to commit") => {
            StepOutcome::warning("nothing to commit")
        }
        Err(err) => StepOutcome::warning(format!("commit: {err}")),
    }
}

/// Push the branch, setting its upstream on first push.
pub(crate) async fn push<R: CommandRunner>(git: &Git<'_, R>, plan: &Plan<'_>) -> StepOutcome {
    if !plan.has_remote {
        git.note("[git] no remote configured, committed locally; set remote_url to enable pushes");
        return StepOutcome::skipped("no remote");
    }
    let result = match git.upstream().await {
        Some(upstream) => {
            debug!(%upstream, "pushing to existing upstream");
            git.run("git", &["push"]).await
        }
        None => {
            git.run("git", &["push", "--set-upstream", plan.remote(), plan.branch])
                .await
        }
    };
    match result {
        Ok(_) => StepOutcome::done_with(format!("{} -> {}", plan.branch, plan.remote())),
        Err(err) => StepOutcome::warning(format!("push: {err}")),
    }
}

/// Create the annotated run tag and publish it when a remote exists.
pub(crate) async fn tag<R: CommandRunner>(
    git: &Git<'_, R>,
    plan: &Plan<'_>,
    tag: &str,
) -> StepOutcome {
    if let Err(err) = git.run("git", &["tag", "-a", tag, "-m", tag]).await {
        return StepOutcome::warning(format!("tag {tag}: {err}"));
    }
    if !plan.has_remote {
        return StepOutcome::done_with(format!("{tag} (local)"));
    }
    match git.run("git", &["push", plan.remote(), tag]).await {
        Ok(_) => {
            info!(tag, "tag pushed");
            StepOutcome::done_with(tag.to_string())
        }
        Err(err) => StepOutcome::warning(format!("push tag {tag}: {err}")),
    }
}
