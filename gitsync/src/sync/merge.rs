//! Merge of a requirement branch into the default branch after `gate`.

use tracing::info;

use crate::core::types::StepOutcome;
use crate::io::git::Git;
use crate::io::runner::CommandRunner;
use crate::sync::steps::Plan;

/// `merge --no-ff` the target into the default branch and publish it.
///
/// Branch deletion and returning to the feature branch follow the
/// `delete_branch_on_merge` and `return_to_feature_after_merge` settings.
pub(crate) async fn merge_on_gate<R: CommandRunner>(
    git: &Git<'_, R>,
    plan: &Plan<'_>,
    run_id: &str,
    req_id: &str,
) -> StepOutcome {
    let default = plan.default_branch();
    let target = plan.branch;
    let remote = plan.remote();
    let mut warnings = Vec::new();

    if let Err(err) = git.run("git", &["checkout", default]).await {
        return StepOutcome::warning(format!("checkout {default}: {err}"));
    }

    if plan.rebases() {
        if git.is_dirty().await {
            git.note(format!("[git:gate] {default} dirty, skip pull --rebase"));
        } else if let Err(err) = git.run("git", &["pull", "--rebase", remote, default]).await {
            warnings.push(format!("pull {default}: {err}"));
        }
    }

    let message = format!("merge: {req_id} via gate [runId={run_id}]");
    if let Err(err) = git
        .run("git", &["merge", "--no-ff", target, "-m", &message])
        .await
    {
        warnings.push(format!("merge {target}: {err}"));
        return StepOutcome::from_warnings(warnings, String::new());
    }
    info!(from = target, into = default, "gate merge completed");

    if plan.has_remote
        && let Err(err) = git.run("git", &["push", remote, default]).await
    {
        warnings.push(format!("push {default}: {err}"));
    }

    if plan.settings.delete_branch_on_merge {
        match git.run("git", &["branch", "-d", target]).await {
            Ok(_) if plan.has_remote => {
                if let Err(err) = git.run("git", &["push", remote, "--delete", target]).await {
                    warnings.push(format!("delete remote {target}: {err}"));
                }
            }
            Ok(_) => {}
            Err(err) => warnings.push(format!("delete {target}: {err}")),
        }
    }

    if plan.settings.return_to_feature_after_merge
        && !plan.settings.delete_branch_on_merge
        && let Err(err) = git.run("git", &["checkout", target]).await
    {
        warnings.push(format!("return to {target}: {err}"));
    }

    StepOutcome::from_warnings(warnings, format!("{target} -> {default}"))
}
