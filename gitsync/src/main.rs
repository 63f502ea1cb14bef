//! gitsync CLI.
//!
//! Commits, tags and pushes a workspace after a workflow phase, and exposes
//! the context resolution and diagnostics used to troubleshoot it. Every
//! command prints JSON (or a bare name) on stdout; logs go to stderr.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;

use gitsync::core::branch::target_branch;
use gitsync::core::path::WorkspaceRoot;
use gitsync::core::types::Phase;
use gitsync::diag;
use gitsync::error::SyncError;
use gitsync::exit_codes;
use gitsync::io::config::{GitSettings, default_settings_path, load_settings};
use gitsync::io::context::ContextResolver;
use gitsync::io::git::Git;
use gitsync::io::log::TracingLog;
use gitsync::io::runner::ProcessRunner;
use gitsync::logging;
use gitsync::sync::{SyncOrchestrator, SyncRequest};

#[derive(Parser)]
#[command(
    name = "gitsync",
    version,
    about = "Phase-driven git synchronization for workspaces"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Commit, tag and (with a remote) push the workspace for one phase run.
    Sync {
        /// Workflow phase: spec, plan, kit, eval, gate, finalize, or any name.
        #[arg(long)]
        phase: Phase,
        #[arg(long)]
        run_id: String,
        /// Requirement id; required for kit, eval and gate.
        #[arg(long)]
        req_id: Option<String>,
        /// File to stage (repeatable, or comma-separated). Default: all changes.
        #[arg(long = "file")]
        files: Vec<String>,
        /// Open a pull request after a finalize sync.
        #[arg(long)]
        finalize_open_pr: bool,
        #[command(flatten)]
        workspace: WorkspaceArgs,
        #[command(flatten)]
        overrides: SettingsOverrides,
    },
    /// Print the resolved git context (direct or detached) as JSON.
    Context {
        #[command(flatten)]
        workspace: WorkspaceArgs,
    },
    /// Print a read-only repository snapshot as JSON.
    Diag {
        #[command(flatten)]
        workspace: WorkspaceArgs,
    },
    /// Print the branch a phase syncs to.
    Branch {
        #[arg(long)]
        phase: Phase,
        #[arg(long)]
        req_id: Option<String>,
        #[command(flatten)]
        workspace: WorkspaceArgs,
    },
}

#[derive(Args)]
struct WorkspaceArgs {
    /// Workspace root: a path, `~/...`, or a `file://` URL.
    #[arg(long, default_value = ".")]
    root: String,
    /// Settings file. Default: `<root>/.clike/git.toml`.
    #[arg(long)]
    config: Option<PathBuf>,
}

impl WorkspaceArgs {
    fn root(&self) -> Result<WorkspaceRoot> {
        Ok(WorkspaceRoot::parse(&self.root)?)
    }

    fn settings(&self, root: &WorkspaceRoot) -> Result<GitSettings> {
        let path = self
            .config
            .clone()
            .unwrap_or_else(|| default_settings_path(root.as_path()));
        load_settings(&path).with_context(|| format!("load settings {}", path.display()))
    }
}

/// Command-line overrides applied on top of the settings file.
#[derive(Args)]
struct SettingsOverrides {
    /// Remote URL to add when the remote is missing.
    #[arg(long)]
    remote_url: Option<String>,
    #[arg(long)]
    default_branch: Option<String>,
    /// Skip the commit sequence entirely.
    #[arg(long)]
    no_auto_commit: bool,
    /// Do not pull/rebase onto the remote default branch.
    #[arg(long)]
    no_rebase: bool,
    /// Open a draft pull request after a kit sync.
    #[arg(long)]
    draft_pr: bool,
    /// Merge the requirement branch into the default branch after gate.
    #[arg(long)]
    merge_on_gate: bool,
}

impl SettingsOverrides {
    fn apply(self, mut settings: GitSettings) -> Result<GitSettings> {
        if let Some(url) = self.remote_url {
            settings.remote_url = Some(url);
        }
        if let Some(branch) = self.default_branch {
            settings.default_branch = branch;
        }
        if self.no_auto_commit {
            settings.auto_commit = false;
        }
        if self.no_rebase {
            settings.push_rebase = false;
        }
        if self.draft_pr {
            settings.pr_per_req_draft = true;
        }
        if self.merge_on_gate {
            settings.merge_on_gate = true;
        }
        settings.validate()?;
        Ok(settings)
    }
}

#[tokio::main]
async fn main() {
    logging::init();
    if let Err(err) = run(Cli::parse()).await {
        eprintln!("{:#}", err);
        std::process::exit(exit_code(&err));
    }
}

fn exit_code(err: &anyhow::Error) -> i32 {
    if err.downcast_ref::<SyncError>().is_some() {
        exit_codes::FATAL
    } else {
        exit_codes::INVALID
    }
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Sync {
            phase,
            run_id,
            req_id,
            files,
            finalize_open_pr,
            workspace,
            overrides,
        } => {
            let root = workspace.root()?;
            let settings = overrides.apply(workspace.settings(&root)?)?;
            let request = SyncRequest {
                phase,
                run_id,
                req_id,
                changed_files: files,
                settings,
                workspace_root: root.into_path_buf(),
                finalize_open_pr,
            };
            let report = SyncOrchestrator::default().sync(&request).await?;
            print_json(&report)
        }
        Command::Context { workspace } => {
            let root = workspace.root()?;
            let context = ContextResolver::from_env().resolve(&root)?;
            print_json(&context)
        }
        Command::Diag { workspace } => {
            let root = workspace.root()?;
            let settings = workspace.settings(&root)?;
            let context = ContextResolver::from_env().resolve(&root)?;
            let runner = ProcessRunner;
            let git = Git::new(&context, &runner, &TracingLog);
            let snapshot = diag::snapshot(&git, &settings.remote_name).await;
            print_json(&snapshot)
        }
        Command::Branch {
            phase,
            req_id,
            workspace,
        } => {
            let root = workspace.root()?;
            let settings = workspace.settings(&root)?;
            println!("{}", target_branch(&phase, req_id.as_deref(), &settings)?);
            Ok(())
        }
    }
}

/// Pretty-print `value` as JSON on stdout.
fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let payload = serde_json::to_string_pretty(value).context("serialize json")?;
    println!("{payload}");
    Ok(())
}
