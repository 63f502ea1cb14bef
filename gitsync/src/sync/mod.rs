//! Sync orchestration: one request in, one ordered [`SyncReport`] out.
//!
//! The sequence is fixed: validate, gate on `auto_commit`, resolve the
//! context, bootstrap, resolve the remote, route the branch, fetch, sync the
//! branch, stage, commit, push, tag, then the optional gate merge and pull
//! request. Only validation, a missing requirement id, context resolution
//! and a failed `git init` are fatal; every later failure is recorded as a
//! warning and the sequence continues.

mod merge;
mod pull_request;
mod steps;

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::core::branch::{tag_name, target_branch};
use crate::core::message::commit_message;
use crate::core::path::WorkspaceRoot;
use crate::core::types::{Phase, Step, StepOutcome, SyncReport};
use crate::error::SyncError;
use crate::io::bootstrap::ensure_repo;
use crate::io::config::GitSettings;
use crate::io::context::ContextResolver;
use crate::io::git::Git;
use crate::io::lock::WorkspaceLocks;
use crate::io::log::{LogEvent, SyncLog, TracingLog};
use crate::io::remote::ensure_remote;
use crate::io::runner::{CommandRunner, ProcessRunner};

pub use pull_request::{NoPullRequestHost, PullRequestHost};

use steps::Plan;

/// One sync invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRequest {
    pub phase: Phase,
    pub run_id: String,
    /// Required for `kit`, `eval` and `gate`.
    pub req_id: Option<String>,
    /// Paths to stage, relative to the work tree (absolute paths and
    /// `file://` URLs are normalized). Empty means stage everything.
    pub changed_files: Vec<String>,
    pub settings: GitSettings,
    pub workspace_root: PathBuf,
    /// Open a pull request after a `finalize` sync.
    #[serde(default)]
    pub finalize_open_pr: bool,
}

/// Runs sync requests against real or scripted git.
pub struct SyncOrchestrator<R = ProcessRunner> {
    runner: R,
    resolver: ContextResolver,
    log: Arc<dyn SyncLog>,
    host: Arc<dyn PullRequestHost>,
    locks: Arc<WorkspaceLocks>,
}

impl Default for SyncOrchestrator<ProcessRunner> {
    fn default() -> Self {
        Self::new(ProcessRunner)
    }
}

impl<R: CommandRunner> SyncOrchestrator<R> {
    pub fn new(runner: R) -> Self {
        Self {
            runner,
            resolver: ContextResolver::from_env(),
            log: Arc::new(TracingLog),
            host: Arc::new(NoPullRequestHost),
            locks: WorkspaceLocks::shared(),
        }
    }

    pub fn with_resolver(mut self, resolver: ContextResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_log(mut self, log: Arc<dyn SyncLog>) -> Self {
        self.log = log;
        self
    }

    pub fn with_host(mut self, host: Arc<dyn PullRequestHost>) -> Self {
        self.host = host;
        self
    }

    pub fn with_locks(mut self, locks: Arc<WorkspaceLocks>) -> Self {
        self.locks = locks;
        self
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Run one sync.
    ///
    /// Holds the workspace lock from context resolution to the last step, so
    /// concurrent syncs of one workspace run back to back.
    #[instrument(skip_all, fields(phase = %request.phase, run_id = %request.run_id))]
    pub async fn sync(&self, request: &SyncRequest) -> Result<SyncReport, SyncError> {
        let settings = &request.settings;
        let root = WorkspaceRoot::new(&request.workspace_root)?;

        if !settings.auto_commit {
            info!("auto_commit disabled, skipping sync");
            return Ok(SyncReport::disabled());
        }

        // Routed before any command runs: a missing reqId issues nothing.
        let branch = target_branch(&request.phase, request.req_id.as_deref(), settings)?;

        let context = self.resolver.resolve(&root)?;
        let _guard = self.locks.acquire(&context.metadata_directory).await;
        let git = Git::new(&context, &self.runner, self.log.as_ref());
        git.note(format!(
            "[git] phase={} runId={} reqId={} files={} mode={:?}",
            request.phase,
            request.run_id,
            request.req_id.as_deref().unwrap_or("-"),
            request.changed_files.len(),
            context.mode,
        ));

        let mut report = SyncReport::started(context.mode, branch.clone());
        self.record(
            &mut report,
            Step::Validate,
            StepOutcome::done_with(root.as_path().display().to_string()),
        );

        let bootstrap = ensure_repo(&git, &settings.default_branch).await?;
        self.record(&mut report, Step::Bootstrap, bootstrap.outcome());

        let remote = ensure_remote(&git, &settings.remote_name, settings.remote_url()).await;
        report.has_remote = remote.has_remote;
        self.record(&mut report, Step::ResolveRemote, remote.outcome);

        git.note(format!("[git] targetBranch={branch}"));
        self.record(&mut report, Step::RouteBranch, StepOutcome::done_with(&branch));

        let plan = Plan {
            settings,
            branch: &branch,
            has_remote: remote.has_remote,
        };

        let outcome = steps::fetch(&git, &plan).await;
        self.record(&mut report, Step::Fetch, outcome);

        let outcome = steps::sync_branch(&git, &plan).await;
        self.record(&mut report, Step::BranchSync, outcome);

        let kit_req_id = request
            .req_id
            .as_deref()
            .filter(|_| request.phase == Phase::Kit);
        let outcome = steps::stage(&git, &request.changed_files, kit_req_id).await;
        self.record(&mut report, Step::Stage, outcome);

        let message = commit_message(
            &request.phase,
            &request.run_id,
            request.req_id.as_deref(),
            settings.conventional_commits,
        );
        let outcome = steps::commit(&git, &message).await;
        self.record(&mut report, Step::Commit, outcome);

        let outcome = steps::push(&git, &plan).await;
        self.record(&mut report, Step::Push, outcome);

        let tag = tag_name(&request.phase, &request.run_id, settings);
        let outcome = steps::tag(&git, &plan, &tag).await;
        if !outcome.is_warning() {
            report.tag = Some(tag);
        }
        self.record(&mut report, Step::Tag, outcome);

        if request.phase == Phase::Gate && settings.merge_on_gate {
            let req_id = request.req_id.as_deref().unwrap_or("REQ");
            let outcome = merge::merge_on_gate(&git, &plan, &request.run_id, req_id).await;
            self.record(&mut report, Step::GateMerge, outcome);
        }

        if let Some(pr) = pull_request::plan_for(
            &request.phase,
            request.req_id.as_deref(),
            &plan,
            request.finalize_open_pr,
        ) {
            let outcome =
                pull_request::open_pull_request(&git, &plan, &pr, self.host.as_ref()).await;
            self.record(&mut report, Step::PullRequest, outcome);
        }

        info!(
            branch = %branch,
            warnings = report.warnings().count(),
            "sync finished"
        );
        Ok(report)
    }

    fn record(&self, report: &mut SyncReport, step: Step, outcome: StepOutcome) {
        if let StepOutcome::Warning { reason } = &outcome {
            warn!(%step, %reason, "step degraded");
            self.log.emit(LogEvent::Warning {
                step,
                reason: reason.clone(),
            });
        }
        report.push(step, outcome);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Mode;
    use crate::test_support::{MemoryLog, ScriptedRunner, TestWorkspace};
    use std::sync::Mutex;

    const INSIDE: &[&str] = &["rev-parse", "--is-inside-work-tree"];
    const GET_URL: &[&str] = &["remote", "get-url", "origin"];
    const UPSTREAM: &[&str] = &["--symbolic-full-name", "@{u}"];

    fn request(ws: &TestWorkspace, phase: Phase, req_id: Option<&str>) -> SyncRequest {
        SyncRequest {
            phase,
            run_id: "run-1".to_string(),
            req_id: req_id.map(str::to_string),
            changed_files: Vec::new(),
            settings: GitSettings::default(),
            workspace_root: ws.path().to_path_buf(),
            finalize_open_pr: false,
        }
    }

    /// Initialized repo with a remote and no local target branch.
    fn initialized_with_remote() -> ScriptedRunner {
        ScriptedRunner::new()
            .reply(INSIDE, "true")
            .reply(GET_URL, "/tmp/remote.git")
            .fail(UPSTREAM, "no upstream configured")
            .fail(&["show-ref"], "")
    }

    fn orchestrator(runner: ScriptedRunner, ws: &TestWorkspace) -> (SyncOrchestrator<ScriptedRunner>, MemoryLog) {
        let log = MemoryLog::new();
        let orch = SyncOrchestrator::new(runner)
            .with_resolver(ContextResolver::new(ws.path().join("home")))
            .with_log(Arc::new(log.clone()))
            .with_locks(Arc::new(WorkspaceLocks::new()));
        (orch, log)
    }

    #[tokio::test]
    async fn disabled_auto_commit_runs_no_commands() {
        let ws = TestWorkspace::new().expect("ws");
        let (orch, _log) = orchestrator(ScriptedRunner::new(), &ws);
        let mut req = request(&ws, Phase::Spec, None);
        req.settings.auto_commit = false;

        let report = orch.sync(&req).await.expect("sync");
        assert_eq!(report, SyncReport::disabled());
        assert!(orch.runner().invocations().is_empty());
    }

    #[tokio::test]
    async fn disabled_auto_commit_skips_req_id_check() {
        let ws = TestWorkspace::new().expect("ws");
        let (orch, _log) = orchestrator(ScriptedRunner::new(), &ws);
        let mut req = request(&ws, Phase::Kit, None);
        req.settings.auto_commit = false;

        let report = orch.sync(&req).await.expect("sync");
        assert_eq!(report, SyncReport::disabled());
        assert!(orch.runner().invocations().is_empty());
    }

    #[tokio::test]
    async fn missing_req_id_fails_before_any_command() {
        let ws = TestWorkspace::new().expect("ws");
        let (orch, _log) = orchestrator(ScriptedRunner::new(), &ws);
        let err = orch
            .sync(&request(&ws, Phase::Kit, None))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::MissingReqId { .. }));
        assert_eq!(err.to_string(), "requirement id required for phase=kit");
        assert!(orch.runner().invocations().is_empty());
    }

    #[tokio::test]
    async fn filesystem_root_is_rejected() {
        let ws = TestWorkspace::new().expect("ws");
        let (orch, _log) = orchestrator(ScriptedRunner::new(), &ws);
        let mut req = request(&ws, Phase::Spec, None);
        req.workspace_root = PathBuf::from("/");
        let err = orch.sync(&req).await.unwrap_err();
        assert!(matches!(err, SyncError::InvalidWorkspace { .. }));
        assert!(orch.runner().invocations().is_empty());
    }

    #[tokio::test]
    async fn first_push_sets_upstream_once() {
        let ws = TestWorkspace::new().expect("ws");
        let (orch, _log) = orchestrator(initialized_with_remote(), &ws);
        let report = orch
            .sync(&request(&ws, Phase::Kit, Some("REQ-009")))
            .await
            .expect("sync");

        assert_eq!(report.branch.as_deref(), Some("feature/req-009"));
        assert_eq!(report.mode, Some(Mode::Direct));
        assert!(report.has_remote);
        let runner = orch.runner();
        assert_eq!(
            runner.count(&["push", "--set-upstream", "origin", "feature/req-009"]),
            1
        );
        assert_eq!(runner.count(&["checkout", "-B", "feature/req-009"]), 1);
        assert_eq!(runner.count(&["tag", "-a", "clike/kit/run-1"]), 1);
        assert_eq!(runner.count(&["push", "origin", "clike/kit/run-1"]), 1);
    }

    #[tokio::test]
    async fn existing_upstream_uses_plain_push() {
        let ws = TestWorkspace::new().expect("ws");
        let runner = ScriptedRunner::new()
            .reply(INSIDE, "true")
            .reply(GET_URL, "/tmp/remote.git")
            .reply(UPSTREAM, "origin/main")
            .reply(&["branch", "--show-current"], "main");
        let (orch, _log) = orchestrator(runner, &ws);
        orch.sync(&request(&ws, Phase::Spec, None))
            .await
            .expect("sync");

        let lines = orch.runner().command_lines();
        assert!(lines.iter().any(|line| line == "git push"), "{lines:#?}");
        assert_eq!(orch.runner().count(&["--set-upstream"]), 0);
    }

    #[tokio::test]
    async fn steps_run_in_order() {
        let ws = TestWorkspace::new().expect("ws");
        let (orch, _log) = orchestrator(initialized_with_remote(), &ws);
        let report = orch
            .sync(&request(&ws, Phase::Kit, Some("REQ-1")))
            .await
            .expect("sync");
        let steps: Vec<Step> = report.steps.iter().map(|r| r.step).collect();
        assert_eq!(
            steps,
            vec![
                Step::Validate,
                Step::Bootstrap,
                Step::ResolveRemote,
                Step::RouteBranch,
                Step::Fetch,
                Step::BranchSync,
                Step::Stage,
                Step::Commit,
                Step::Push,
                Step::Tag,
            ]
        );
    }

    #[tokio::test]
    async fn init_failure_aborts_the_sync() {
        let ws = TestWorkspace::new().expect("ws");
        let runner = ScriptedRunner::new()
            .fail(INSIDE, "not a git repository")
            .fail(&["init"], "permission denied");
        let (orch, _log) = orchestrator(runner, &ws);
        let err = orch
            .sync(&request(&ws, Phase::Spec, None))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::InitFailed { .. }));
        assert_eq!(orch.runner().count(&["commit"]), 0);
    }

    #[tokio::test]
    async fn commit_failure_is_a_warning_and_the_sequence_continues() {
        let ws = TestWorkspace::new().expect("ws");
        let runner = initialized_with_remote()
            .fail_stdout(&["commit", "-m"], "nothing to commit, working tree clean");
        let (orch, log) = orchestrator(runner, &ws);
        let report = orch
            .sync(&request(&ws, Phase::Kit, Some("REQ-1")))
            .await
            .expect("sync");

        assert!(report.outcome(Step::Commit).is_some_and(StepOutcome::is_warning));
        assert!(report.outcome(Step::Push).is_some());
        assert!(report.outcome(Step::Tag).is_some());
        assert!(log.events().iter().any(|event| matches!(
            event,
            LogEvent::Warning { step: Step::Commit, .. }
        )));
    }

    #[tokio::test]
    async fn no_remote_commits_locally() {
        let ws = TestWorkspace::new().expect("ws");
        let runner = ScriptedRunner::new()
            .reply(INSIDE, "true")
            .fail(&["remote", "get-url"], "No such remote 'origin'");
        let (orch, _log) = orchestrator(runner, &ws);
        let report = orch
            .sync(&request(&ws, Phase::Plan, None))
            .await
            .expect("sync");

        assert!(!report.has_remote);
        assert!(report.outcome(Step::Push).is_some_and(StepOutcome::is_skipped));
        let runner = orch.runner();
        assert_eq!(runner.count(&["push"]), 0);
        assert_eq!(runner.count(&["fetch"]), 0);
        assert_eq!(runner.count(&["pull"]), 0);
        assert_eq!(runner.count(&["commit", "-m"]), 1);
        assert_eq!(report.tag.as_deref(), Some("clike/plan/run-1"));
    }

    #[tokio::test]
    async fn changed_files_are_staged_as_given() {
        let ws = TestWorkspace::new().expect("ws");
        let (orch, _log) = orchestrator(initialized_with_remote(), &ws);
        let mut req = request(&ws, Phase::Kit, Some("REQ-1"));
        req.changed_files = vec![
            ws.path().join("src/lib.rs").to_string_lossy().into_owned(),
            "docs/PLAN.md".to_string(),
        ];
        orch.sync(&req).await.expect("sync");

        let runner = orch.runner();
        assert_eq!(runner.count(&["add", "--", "src/lib.rs", "docs/PLAN.md"]), 1);
        assert_eq!(runner.count(&["add", "-A"]), 0);
    }

    #[tokio::test]
    async fn kit_outputs_are_staged_at_workspace_paths() {
        let ws = TestWorkspace::new().expect("ws");
        let (orch, _log) = orchestrator(initialized_with_remote(), &ws);
        let mut req = request(&ws, Phase::Kit, Some("REQ-1"));
        req.changed_files = vec![
            ws.path()
                .join("runs/kit/REQ-1/src/lib.rs")
                .to_string_lossy()
                .into_owned(),
        ];
        orch.sync(&req).await.expect("sync");
        assert_eq!(orch.runner().count(&["add", "--", "src/lib.rs"]), 1);

        let (orch, _log) = orchestrator(initialized_with_remote(), &ws);
        let mut req = request(&ws, Phase::Eval, Some("REQ-1"));
        req.changed_files = vec!["runs/kit/REQ-1/src/lib.rs".to_string()];
        orch.sync(&req).await.expect("sync");
        assert_eq!(
            orch.runner()
                .count(&["add", "--", "runs/kit/REQ-1/src/lib.rs"]),
            1
        );
    }

    #[tokio::test]
    async fn failed_batch_add_retries_per_file() {
        let ws = TestWorkspace::new().expect("ws");
        let runner = initialized_with_remote()
            .fail(&["add", "--", "a.txt", "missing.txt"], "pathspec did not match")
            .fail(&["add", "--", "missing.txt"], "pathspec did not match");
        let (orch, _log) = orchestrator(runner, &ws);
        let mut req = request(&ws, Phase::Kit, Some("REQ-1"));
        req.changed_files = vec!["a.txt".to_string(), "missing.txt".to_string()];
        let report = orch.sync(&req).await.expect("sync");

        let runner = orch.runner();
        assert_eq!(runner.count(&["add", "--", "a.txt"]), 2);
        assert!(report.outcome(Step::Stage).is_some_and(StepOutcome::is_warning));
        assert!(report.outcome(Step::Commit).is_some());
    }

    #[tokio::test]
    async fn dirty_tree_pulls_with_autostash() {
        let ws = TestWorkspace::new().expect("ws");
        let runner = initialized_with_remote().reply(&["status", "--porcelain"], " M notes.md");
        let (orch, _log) = orchestrator(runner, &ws);
        orch.sync(&request(&ws, Phase::Kit, Some("REQ-1")))
            .await
            .expect("sync");

        let runner = orch.runner();
        assert_eq!(
            runner.count(&["pull", "--rebase", "--autostash", "origin", "main"]),
            1
        );
        assert_eq!(runner.count(&["rebase", "--autostash", "origin/main"]), 1);
    }

    #[tokio::test]
    async fn kit_draft_pull_request_uses_gh() {
        let ws = TestWorkspace::new().expect("ws");
        let (orch, _log) = orchestrator(initialized_with_remote(), &ws);
        let mut req = request(&ws, Phase::Kit, Some("REQ-7"));
        req.settings.pr_per_req_draft = true;
        let report = orch.sync(&req).await.expect("sync");

        let gh: Vec<_> = orch
            .runner()
            .invocations()
            .into_iter()
            .filter(|call| call.program == "gh")
            .collect();
        assert_eq!(gh.len(), 1);
        assert_eq!(
            gh[0].args,
            vec!["pr", "create", "--title", "[CLike] REQ-7 - draft", "--draft", "--fill"]
        );
        assert_eq!(orch.runner().count(&["push", "-u", "origin", "feature/req-7"]), 1);
        assert!(report.outcome(Step::PullRequest).is_some());
    }

    #[tokio::test]
    async fn missing_pr_host_is_a_warning() {
        let ws = TestWorkspace::new().expect("ws");
        let (orch, log) = orchestrator(initialized_with_remote(), &ws);
        let mut req = request(&ws, Phase::Kit, Some("REQ-7"));
        req.settings.pr_per_req_draft = true;
        req.settings.pr_use_gh_cli = false;
        let report = orch.sync(&req).await.expect("sync");

        let outcome = report.outcome(Step::PullRequest).expect("pull request step");
        assert!(outcome.is_warning(), "{outcome:?}");
        assert!(report.outcome(Step::Tag).is_some());
        assert!(orch.runner().invocations().iter().all(|c| c.program != "gh"));
        assert!(log.events().iter().any(|event| matches!(
            event,
            LogEvent::Warning { step: Step::PullRequest, .. }
        )));
    }

    #[tokio::test]
    async fn failing_gh_is_a_warning() {
        let ws = TestWorkspace::new().expect("ws");
        let runner = initialized_with_remote().fail(&["pr", "create"], "gh: not logged in");
        let (orch, _log) = orchestrator(runner, &ws);
        let mut req = request(&ws, Phase::Kit, Some("REQ-7"));
        req.settings.pr_per_req_draft = true;
        let report = orch.sync(&req).await.expect("sync");

        assert!(
            report
                .outcome(Step::PullRequest)
                .is_some_and(StepOutcome::is_warning)
        );
    }

    #[derive(Default)]
    struct RecordingHost {
        calls: Mutex<Vec<(String, String)>>,
    }

    impl PullRequestHost for RecordingHost {
        fn create_pull_request(&self, branch: &str, title: &str) -> anyhow::Result<()> {
            self.calls
                .lock()
                .expect("lock")
                .push((branch.to_string(), title.to_string()));
            Ok(())
        }
    }

    #[tokio::test]
    async fn finalize_pull_request_falls_back_to_host() {
        let ws = TestWorkspace::new().expect("ws");
        let host = Arc::new(RecordingHost::default());
        let (orch, _log) = orchestrator(initialized_with_remote(), &ws);
        let orch = orch.with_host(host.clone());
        let mut req = request(&ws, Phase::Finalize, None);
        req.finalize_open_pr = true;
        req.settings.pr_use_gh_cli = false;
        orch.sync(&req).await.expect("sync");

        assert_eq!(
            host.calls.lock().expect("lock").clone(),
            vec![("main".to_string(), "[CLike] Finalize".to_string())]
        );
        assert!(orch.runner().invocations().iter().all(|c| c.program != "gh"));
    }

    #[tokio::test]
    async fn gate_merge_runs_only_when_enabled() {
        let ws = TestWorkspace::new().expect("ws");
        let (orch, _log) = orchestrator(initialized_with_remote(), &ws);
        let req = request(&ws, Phase::Gate, Some("REQ-2"));
        let report = orch.sync(&req).await.expect("sync");
        assert!(report.outcome(Step::GateMerge).is_none());

        let (orch, _log) = orchestrator(initialized_with_remote(), &ws);
        let mut req = request(&ws, Phase::Gate, Some("REQ-2"));
        req.settings.merge_on_gate = true;
        req.settings.delete_branch_on_merge = true;
        let report = orch.sync(&req).await.expect("sync");

        let runner = orch.runner();
        assert_eq!(
            runner.count(&[
                "merge",
                "--no-ff",
                "feature/req-2",
                "-m",
                "merge: REQ-2 via gate [runId=run-1]"
            ]),
            1
        );
        assert_eq!(runner.count(&["push", "origin", "main"]), 1);
        assert_eq!(runner.count(&["branch", "-d", "feature/req-2"]), 1);
        assert_eq!(runner.count(&["push", "origin", "--delete", "feature/req-2"]), 1);
        assert!(report.outcome(Step::GateMerge).is_some());
    }
}
