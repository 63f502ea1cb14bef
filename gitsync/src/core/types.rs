//! Shared deterministic types for sync core logic.
//!
//! These types define stable contracts between the orchestrator and its
//! steps. They do not depend on external state and serialize to stable JSON.

use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A named workflow stage that triggers a sync.
///
/// Unknown names are preserved verbatim in [`Phase::Other`] so hosts can add
/// phases without a new release; they route to the default branch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Phase {
    Spec,
    Plan,
    Kit,
    Eval,
    Gate,
    Finalize,
    Other(String),
}

impl Phase {
    pub fn as_str(&self) -> &str {
        match self {
            Phase::Spec => "spec",
            Phase::Plan => "plan",
            Phase::Kit => "kit",
            Phase::Eval => "eval",
            Phase::Gate => "gate",
            Phase::Finalize => "finalize",
            Phase::Other(name) => name,
        }
    }

    /// True for phases that operate on a single requirement and get their own
    /// branch.
    pub fn is_requirement_scoped(&self) -> bool {
        matches!(self, Phase::Kit | Phase::Eval | Phase::Gate)
    }
}

impl FromStr for Phase {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Ok(match trimmed.to_ascii_lowercase().as_str() {
            "spec" => Phase::Spec,
            "plan" => Phase::Plan,
            "kit" => Phase::Kit,
            "eval" => Phase::Eval,
            "gate" => Phase::Gate,
            "finalize" => Phase::Finalize,
            _ => Phase::Other(trimmed.to_string()),
        })
    }
}

impl From<String> for Phase {
    fn from(value: String) -> Self {
        match value.parse() {
            Ok(phase) => phase,
            Err(never) => match never {},
        }
    }
}

impl From<Phase> for String {
    fn from(value: Phase) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where repository metadata lives relative to the workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Writable root: metadata at `<root>/.git`, no global flags.
    Direct,
    /// Read-only root: metadata under `~/.clike/git/<id>/.git`.
    Detached,
}

/// Stages of the sync state machine, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Validate,
    Bootstrap,
    ResolveRemote,
    RouteBranch,
    Fetch,
    BranchSync,
    Stage,
    Commit,
    Push,
    Tag,
    GateMerge,
    PullRequest,
}

impl Step {
    pub fn as_str(self) -> &'static str {
        match self {
            Step::Validate => "validate",
            Step::Bootstrap => "bootstrap",
            Step::ResolveRemote => "resolve_remote",
            Step::RouteBranch => "route_branch",
            Step::Fetch => "fetch",
            Step::BranchSync => "branch_sync",
            Step::Stage => "stage",
            Step::Commit => "commit",
            Step::Push => "push",
            Step::Tag => "tag",
            Step::GateMerge => "gate_merge",
            Step::PullRequest => "pull_request",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a single non-fatal step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum StepOutcome {
    Done {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        detail: Option<String>,
    },
    Skipped {
        reason: String,
    },
    Warning {
        reason: String,
    },
}

impl StepOutcome {
    pub fn done() -> Self {
        StepOutcome::Done { detail: None }
    }

    pub fn done_with(detail: impl Into<String>) -> Self {
        StepOutcome::Done {
            detail: Some(detail.into()),
        }
    }

    pub fn skipped(reason: impl Into<String>) -> Self {
        StepOutcome::Skipped {
            reason: reason.into(),
        }
    }

    pub fn warning(reason: impl Into<String>) -> Self {
        StepOutcome::Warning {
            reason: reason.into(),
        }
    }

    /// Collapse accumulated warnings into one outcome, or `done` if none.
    pub fn from_warnings(warnings: Vec<String>, detail: impl Into<String>) -> Self {
        if warnings.is_empty() {
            Self::done_with(detail)
        } else {
            Self::warning(warnings.join("; "))
        }
    }

    pub fn is_warning(&self) -> bool {
        matches!(self, StepOutcome::Warning { .. })
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, StepOutcome::Skipped { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepRecord {
    pub step: Step,
    #[serde(flatten)]
    pub outcome: StepOutcome,
}

/// Everything a sync invocation did, in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    /// False when `auto_commit` was disabled and nothing ran.
    pub ran: bool,
    pub mode: Option<Mode>,
    pub branch: Option<String>,
    pub has_remote: bool,
    pub tag: Option<String>,
    pub steps: Vec<StepRecord>,
}

impl SyncReport {
    /// Report for a sync short-circuited by `auto_commit = false`.
    pub fn disabled() -> Self {
        Self {
            ran: false,
            mode: None,
            branch: None,
            has_remote: false,
            tag: None,
            steps: Vec::new(),
        }
    }

    pub fn started(mode: Mode, branch: impl Into<String>) -> Self {
        Self {
            ran: true,
            mode: Some(mode),
            branch: Some(branch.into()),
            ..Self::disabled()
        }
    }

    pub fn push(&mut self, step: Step, outcome: StepOutcome) {
        self.steps.push(StepRecord { step, outcome });
    }

    pub fn outcome(&self, step: Step) -> Option<&StepOutcome> {
        self.steps
            .iter()
            .find(|record| record.step == step)
            .map(|record| &record.outcome)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &StepRecord> {
        self.steps.iter().filter(|record| record.outcome.is_warning())
    }
}
