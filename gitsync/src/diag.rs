//! Read-only repository snapshot for troubleshooting a workspace.

use serde::Serialize;

use crate::io::context::GitContext;
use crate::io::git::Git;
use crate::io::log::CommandResult;
use crate::io::runner::CommandRunner;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Probe {
    pub program: String,
    pub args: Vec<String>,
    pub result: CommandResult,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiagSnapshot {
    pub context: GitContext,
    pub probes: Vec<Probe>,
}

impl DiagSnapshot {
    /// Output of the first successful probe with exactly these arguments.
    pub fn output(&self, args: &[&str]) -> Option<&str> {
        self.probes
            .iter()
            .find(|probe| probe.args == args)
            .and_then(|probe| match &probe.result {
                CommandResult::Output(out) => Some(out.as_str()),
                CommandResult::Error(_) => None,
            })
    }
}

/// Run every probe; failures are recorded, never returned.
pub async fn snapshot<R: CommandRunner>(git: &Git<'_, R>, remote_name: &str) -> DiagSnapshot {
    let git_probes: [&[&str]; 9] = [
        &["rev-parse", "--is-inside-work-tree"],
        &["status", "--porcelain"],
        &["remote", "-v"],
        &["branch", "--show-current"],
        &["config", "--get", "user.name"],
        &["config", "--get", "user.email"],
        &["ls-files"],
        &["rev-parse", "HEAD"],
        &["ls-remote", remote_name],
    ];
    let mut probes = Vec::new();
    for args in git_probes {
        let result = git.run("diag", args).await;
        probes.push(probe("git", args, result));
    }
    for args in [&["--version"][..], &["auth", "status"][..]] {
        let result = git.run_program("diag", "gh", args).await;
        probes.push(probe("gh", args, result));
    }
    DiagSnapshot {
        context: git.context().clone(),
        probes,
    }
}

fn probe(
    program: &str,
    args: &[&str],
    result: Result<String, crate::io::runner::CommandError>,
) -> Probe {
    Probe {
        program: program.to_string(),
        args: args.iter().map(|a| (*a).to_string()).collect(),
        result: match result {
            Ok(out) => CommandResult::Output(out),
            Err(err) => CommandResult::Error(err.to_string()),
        },
    }
}
