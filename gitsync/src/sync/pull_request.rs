//! Pull request automation: `gh pr create`, or a host-provided action.

use anyhow::anyhow;

use crate::core::types::{Phase, StepOutcome};
use crate::io::git::Git;
use crate::io::runner::CommandRunner;
use crate::sync::steps::Plan;

/// Host-side "create pull request" action, used when `pr_use_gh_cli` is off.
pub trait PullRequestHost: Send + Sync {
    fn create_pull_request(&self, branch: &str, title: &str) -> anyhow::Result<()>;
}

/// Host without a pull request action; every request fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPullRequestHost;

impl PullRequestHost for NoPullRequestHost {
    fn create_pull_request(&self, branch: &str, _title: &str) -> anyhow::Result<()> {
        Err(anyhow!("no pull request host configured for {branch}"))
    }
}

/// What kind of pull request a phase opens, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PullRequestPlan {
    pub title: String,
    pub draft: bool,
}

/// `kit` opens a draft per requirement; `finalize` opens one on request.
/// Both need a remote.
pub(crate) fn plan_for(
    phase: &Phase,
    req_id: Option<&str>,
    plan: &Plan<'_>,
    finalize_open_pr: bool,
) -> Option<PullRequestPlan> {
    if !plan.has_remote {
        return None;
    }
    match phase {
        Phase::Kit if plan.settings.pr_per_req_draft => Some(PullRequestPlan {
            title: format!("[CLike] {} - draft", req_id.unwrap_or("REQ")),
            draft: true,
        }),
        Phase::Finalize if finalize_open_pr => Some(PullRequestPlan {
            title: "[CLike] Finalize".to_string(),
            draft: false,
        }),
        _ => None,
    }
}

pub(crate) async fn open_pull_request<R: CommandRunner>(
    git: &Git<'_, R>,
    plan: &Plan<'_>,
    pr: &PullRequestPlan,
    host: &dyn PullRequestHost,
) -> StepOutcome {
    if let Err(err) = git
        .run("git", &["push", "-u", plan.remote(), plan.branch])
        .await
    {
        return StepOutcome::warning(format!("push -u {}: {err}", plan.branch));
    }

    if !plan.settings.pr_use_gh_cli {
        return match host.create_pull_request(plan.branch, &pr.title) {
            Ok(()) => StepOutcome::done_with(format!("host: {}", pr.title)),
            Err(err) => StepOutcome::warning(format!("host pull request: {err:#}")),
        };
    }

    let body_path = plan
        .settings
        .pr_body_path
        .as_ref()
        .map(|path| path.to_string_lossy().into_owned());
    let mut args = vec!["pr", "create", "--title", pr.title.as_str()];
    if pr.draft {
        args.push("--draft");
    }
    match &body_path {
        Some(path) => args.extend(["--body-file", path.as_str()]),
        None => args.push("--fill"),
    }
    match git.run_program("gh", "gh", &args).await {
        Ok(url) if url.is_empty() => StepOutcome::done_with(pr.title.clone()),
        Ok(url) => StepOutcome::done_with(url),
        Err(err) => StepOutcome::warning(format!("gh pr create: {err}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::config::GitSettings;

    fn plan(settings: &GitSettings, has_remote: bool) -> Plan<'_> {
        Plan {
            settings,
            branch: "feature/req-1",
            has_remote,
        }
    }

    #[test]
    fn kit_draft_needs_setting_and_remote() {
        let off = GitSettings::default();
        assert_eq!(plan_for(&Phase::Kit, Some("REQ-1"), &plan(&off, true), false), None);

        let on = GitSettings {
            pr_per_req_draft: true,
            ..GitSettings::default()
        };
        assert_eq!(plan_for(&Phase::Kit, Some("REQ-1"), &plan(&on, false), false), None);
        let pr = plan_for(&Phase::Kit, Some("REQ-1"), &plan(&on, true), false).expect("pr");
        assert_eq!(pr.title, "[CLike] REQ-1 - draft");
        assert!(pr.draft);
    }

    #[test]
    fn finalize_needs_explicit_opt_in() {
        let settings = GitSettings::default();
        assert_eq!(plan_for(&Phase::Finalize, None, &plan(&settings, true), false), None);
        let pr = plan_for(&Phase::Finalize, None, &plan(&settings, true), true).expect("pr");
        assert_eq!(pr.title, "[CLike] Finalize");
        assert!(!pr.draft);
    }

    #[test]
    fn other_phases_never_open_pull_requests() {
        let settings = GitSettings {
            pr_per_req_draft: true,
            ..GitSettings::default()
        };
        for phase in [Phase::Spec, Phase::Plan, Phase::Eval, Phase::Gate] {
            assert_eq!(plan_for(&phase, Some("REQ-1"), &plan(&settings, true), true), None);
        }
    }
}
