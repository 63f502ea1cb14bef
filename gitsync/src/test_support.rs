//! Test-only helpers: a scripted command runner, an in-memory log, and
//! real-git workspace fixtures.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::{Arc, Mutex, PoisonError};

use tempfile::TempDir;

use crate::io::log::{CommandRecord, LogEvent, SyncLog};
use crate::io::runner::{CommandError, CommandRunner};

/// One recorded call to [`ScriptedRunner`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
}

impl Invocation {
    /// True if `pattern` appears as a contiguous run inside the arguments.
    pub fn matches(&self, pattern: &[&str]) -> bool {
        contains_run(&self.args, pattern)
    }
}

#[derive(Debug, Clone)]
struct Rule {
    pattern: Vec<String>,
    reply: Result<String, CommandError>,
}

/// Runner that records invocations and answers from scripted rules.
///
/// Rules match when their pattern appears contiguously in the argument list;
/// the first matching rule wins. Unmatched invocations succeed with empty
/// output. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct ScriptedRunner {
    rules: Arc<Mutex<Vec<Rule>>>,
    calls: Arc<Mutex<Vec<Invocation>>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Succeed with `stdout` for invocations matching `pattern`.
    pub fn reply(self, pattern: &[&str], stdout: &str) -> Self {
        self.push_rule(pattern, Ok(stdout.to_string()));
        self
    }

    /// Fail with `stderr` for invocations matching `pattern`.
    pub fn fail(self, pattern: &[&str], stderr: &str) -> Self {
        self.push_rule(
            pattern,
            Err(CommandError::Failed {
                code: Some(1),
                stderr: stderr.to_string(),
                stdout: String::new(),
            }),
        );
        self
    }

    /// Fail with `stdout` only (as `git commit` does for "nothing to commit").
    pub fn fail_stdout(self, pattern: &[&str], stdout: &str) -> Self {
        self.push_rule(
            pattern,
            Err(CommandError::Failed {
                code: Some(1),
                stderr: String::new(),
                stdout: stdout.to_string(),
            }),
        );
        self
    }

    fn push_rule(&self, pattern: &[&str], reply: Result<String, CommandError>) {
        lock(&self.rules).push(Rule {
            pattern: pattern.iter().map(|s| (*s).to_string()).collect(),
            reply,
        });
    }

    pub fn invocations(&self) -> Vec<Invocation> {
        lock(&self.calls).clone()
    }

    /// Number of invocations whose arguments contain `pattern`.
    pub fn count(&self, pattern: &[&str]) -> usize {
        lock(&self.calls)
            .iter()
            .filter(|call| call.matches(pattern))
            .count()
    }

    /// Argument lists of every invocation, joined by spaces.
    pub fn command_lines(&self) -> Vec<String> {
        lock(&self.calls)
            .iter()
            .map(|call| format!("{} {}", call.program, call.args.join(" ")))
            .collect()
    }
}

impl CommandRunner for ScriptedRunner {
    async fn run(&self, program: &str, args: &[String], cwd: &Path) -> Result<String, CommandError> {
        let invocation = Invocation {
            program: program.to_string(),
            args: args.to_vec(),
            cwd: cwd.to_path_buf(),
        };
        let reply = lock(&self.rules)
            .iter()
            .find(|rule| {
                let pattern: Vec<&str> = rule.pattern.iter().map(String::as_str).collect();
                invocation.matches(&pattern)
            })
            .map(|rule| rule.reply.clone())
            .unwrap_or_else(|| Ok(String::new()));
        lock(&self.calls).push(invocation);
        reply
    }
}

/// Log sink that keeps every event in memory. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MemoryLog {
    events: Arc<Mutex<Vec<LogEvent>>>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<LogEvent> {
        lock(&self.events).clone()
    }

    pub fn commands(&self) -> Vec<CommandRecord> {
        lock(&self.events)
            .iter()
            .filter_map(|event| match event {
                LogEvent::Command(record) => Some(record.clone()),
                _ => None,
            })
            .collect()
    }
}

impl SyncLog for MemoryLog {
    fn emit(&self, event: LogEvent) {
        lock(&self.events).push(event);
    }
}

/// Temporary workspace directory for real-git tests.
#[derive(Debug)]
pub struct TestWorkspace {
    dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> std::io::Result<Self> {
        Ok(Self {
            dir: tempfile::tempdir()?,
        })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write `contents` to `rel`, creating parent directories.
    pub fn write(&self, rel: &str, contents: &str) -> std::io::Result<PathBuf> {
        let path = self.dir.path().join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, contents)?;
        Ok(path)
    }

    /// Create a bare repository under this workspace's temp dir, for use as a
    /// remote. Returns its path.
    pub fn bare_remote(&self, name: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        fs::create_dir_all(&path).expect("create remote dir");
        git_capture(&path, &["init", "--bare", "-b", "main"]);
        path
    }
}

/// Run `git args` in `dir`, asserting success; returns trimmed stdout.
pub fn git_capture(dir: &Path, args: &[&str]) -> String {
    let out = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .expect("run git");
    assert!(
        out.status.success(),
        "git {args:?} failed: {}",
        String::from_utf8_lossy(&out.stderr)
    );
    String::from_utf8_lossy(&out.stdout).trim().to_string()
}

fn contains_run(args: &[String], pattern: &[&str]) -> bool {
    if pattern.is_empty() {
        return true;
    }
    args.windows(pattern.len())
        .any(|window| window.iter().zip(pattern).all(|(a, p)| a == p))
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
