//! Child process execution for git (and `gh`) commands.
//!
//! [`CommandRunner`] is the seam between sync orchestration and real
//! processes. Tests use a scripted runner that records invocations and returns
//! canned replies without spawning anything.

use std::future::Future;
use std::path::Path;
use std::process::Stdio;

use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, error, instrument};

/// Failure of a single command invocation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    /// The process could not be started (e.g. executable not on PATH).
    #[error("spawn {program}: {message}")]
    Spawn { program: String, message: String },

    /// The process ran and exited unsuccessfully.
    #[error("{}", failure_message(.code, .stderr, .stdout))]
    Failed {
        code: Option<i32>,
        stderr: String,
        stdout: String,
    },
}

impl CommandError {
    /// True if the command output mentions `needle` (stderr or stdout).
    pub fn mentions(&self, needle: &str) -> bool {
        match self {
            CommandError::Spawn { message, .. } => message.contains(needle),
            CommandError::Failed { stderr, stdout, .. } => {
                stderr.contains(needle) || stdout.contains(needle)
            }
        }
    }
}

fn failure_message(code: &Option<i32>, stderr: &str, stdout: &str) -> String {
    let detail = if !stderr.trim().is_empty() {
        stderr.trim()
    } else {
        stdout.trim()
    };
    match (code, detail.is_empty()) {
        (Some(code), true) => format!("exit status {code}"),
        (None, true) => "terminated by signal".to_string(),
        (_, false) => detail.to_string(),
    }
}

/// Runs an external program to completion.
pub trait CommandRunner: Send + Sync {
    /// Run `program args...` in `cwd`, resolving to trimmed stdout on a zero
    /// exit status.
    fn run(
        &self,
        program: &str,
        args: &[String],
        cwd: &Path,
    ) -> impl Future<Output = Result<String, CommandError>> + Send;
}

/// Runner that spawns real processes via `tokio::process`.
///
/// There is no timeout: a hung git process stalls the caller's sync.
/// Interactive credential prompts are disabled so a missing credential fails
/// the push instead of waiting on a terminal.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl CommandRunner for ProcessRunner {
    #[instrument(skip_all, fields(program = %program, cwd = %cwd.display()))]
    async fn run(&self, program: &str, args: &[String], cwd: &Path) -> Result<String, CommandError> {
        debug!(?args, "spawning child process");
        let output = Command::new(program)
            .args(args)
            .current_dir(cwd)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|err| {
                error!(err = %err, "failed to spawn command");
                CommandError::Spawn {
                    program: program.to_string(),
                    message: err.to_string(),
                }
            })?;

        debug!(exit_code = ?output.status.code(), "command finished");
        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if !output.status.success() {
            return Err(CommandError::Failed {
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
                stdout,
            });
        }
        Ok(stdout)
    }
}
