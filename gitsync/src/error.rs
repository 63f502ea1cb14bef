//! Fatal error taxonomy for a sync invocation.
//!
//! Only these errors abort a sync. Every other failure is downgraded to a
//! [`StepOutcome::Warning`](crate::core::types::StepOutcome) and recorded in
//! the report.

use std::path::PathBuf;

use thiserror::Error;

use crate::io::runner::CommandError;

#[derive(Debug, Error)]
pub enum SyncError {
    /// Workspace root was empty or the filesystem root.
    #[error("no valid workspace root ({reason}): open a folder before running sync")]
    InvalidWorkspace { reason: String },

    /// A requirement-scoped phase was invoked without a requirement id.
    #[error("requirement id required for phase={phase}")]
    MissingReqId { phase: String },

    /// The raw repository initialization command failed.
    #[error("git init failed for {}: {source}", .dir.display())]
    InitFailed {
        dir: PathBuf,
        #[source]
        source: CommandError,
    },

    /// The execution context could not be resolved (e.g. no home directory
    /// for a detached repository).
    #[error("resolve git context for {}: {reason}", .root.display())]
    Context { root: PathBuf, reason: String },
}
