//! Sync log sink.
//!
//! Every git invocation produces one [`CommandRecord`]; step progress and
//! degraded steps produce [`LogEvent::Info`] and [`LogEvent::Warning`]. Hosts
//! inject a [`SyncLog`] to surface these (an output panel, a file); the
//! default [`TracingLog`] forwards them to `tracing`.

use std::path::PathBuf;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::core::types::Step;

/// What a single command invocation produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandResult {
    Output(String),
    Error(String),
}

/// One structured line per command invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandRecord {
    /// Short category, e.g. `git`, `init`, `diag`, `gh`.
    pub label: String,
    pub program: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    pub result: CommandResult,
}

impl CommandRecord {
    /// Human-readable single line: `[label] $ git args @ cwd -> out: ...`.
    pub fn render(&self) -> String {
        let head = format!(
            "[{}] $ {} {} @ {}",
            self.label,
            self.program,
            self.args.join(" "),
            self.cwd.display()
        );
        match &self.result {
            CommandResult::Output(out) if out.is_empty() => head,
            CommandResult::Output(out) => format!("{head} -> out: {}", one_line(out)),
            CommandResult::Error(err) => format!("{head} -> ERROR: {}", one_line(err)),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.result, CommandResult::Error(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum LogEvent {
    Command(CommandRecord),
    Info { message: String },
    Warning { step: Step, reason: String },
}

/// Destination for sync log events.
pub trait SyncLog: Send + Sync {
    fn emit(&self, event: LogEvent);
}

/// Forwards events to `tracing`.
///
/// Diagnostic probes (label `diag`) log at `debug`; other commands at `info`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLog;

impl SyncLog for TracingLog {
    fn emit(&self, event: LogEvent) {
        match event {
            LogEvent::Command(record) => {
                let line = record.render();
                if record.label == "diag" {
                    debug!(label = %record.label, "{line}");
                } else {
                    info!(label = %record.label, error = record.is_error(), "{line}");
                }
            }
            LogEvent::Info { message } => info!("{message}"),
            LogEvent::Warning { step, reason } => warn!(%step, "{step} warn: {reason}"),
        }
    }
}

fn one_line(s: &str) -> String {
    s.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join(" | ")
}
