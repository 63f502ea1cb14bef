//! Execution context resolution: direct vs. detached repositories.
//!
//! A writable workspace keeps its metadata in `<root>/.git`. A read-only one
//! gets a detached repository under `<home>/.clike/git/<id>/.git`, addressed
//! with `--git-dir`/`--work-tree`, so the workspace itself is never mutated.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, instrument};

use crate::core::path::WorkspaceRoot;
use crate::core::types::Mode;
use crate::error::SyncError;

/// Hex characters of the path hash used for the detached repository id.
pub const WORKSPACE_ID_LEN: usize = 12;

/// Where and how git commands run for one workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GitContext {
    pub mode: Mode,
    /// Process working directory for every command (the workspace root).
    pub working_directory: PathBuf,
    /// The `.git` directory.
    pub metadata_directory: PathBuf,
    pub work_tree: PathBuf,
    /// Prepended to every git invocation; empty in direct mode.
    pub global_flags: Vec<String>,
}

/// Resolves a [`GitContext`] for a workspace root.
#[derive(Debug, Clone)]
pub struct ContextResolver {
    home: Option<PathBuf>,
}

impl ContextResolver {
    /// Resolver that places detached repositories under `home`.
    pub fn new(home: impl Into<PathBuf>) -> Self {
        Self {
            home: Some(home.into()),
        }
    }

    /// Resolver using the current user's home directory.
    pub fn from_env() -> Self {
        Self {
            home: dirs::home_dir(),
        }
    }

    /// Probe writability of `root` and build its context.
    ///
    /// Recomputed on every call: writability can change between syncs.
    #[instrument(skip_all, fields(root = %root.as_path().display()))]
    pub fn resolve(&self, root: &WorkspaceRoot) -> Result<GitContext, SyncError> {
        let writable = is_dir_writable(root.as_path());
        debug!(writable, "probed workspace writability");
        self.context_for(root, writable)
    }

    /// Build the context for a known writability.
    pub fn context_for(
        &self,
        root: &WorkspaceRoot,
        writable: bool,
    ) -> Result<GitContext, SyncError> {
        let cwd = root.as_path().to_path_buf();
        if writable {
            return Ok(GitContext {
                mode: Mode::Direct,
                metadata_directory: cwd.join(".git"),
                work_tree: cwd.clone(),
                working_directory: cwd,
                global_flags: Vec::new(),
            });
        }

        let home = self.home.as_ref().ok_or_else(|| SyncError::Context {
            root: cwd.clone(),
            reason: "workspace is read-only and no home directory is available".to_string(),
        })?;
        let metadata_directory = detached_repo_dir(home, &cwd).join(".git");
        let global_flags = vec![
            "--git-dir".to_string(),
            metadata_directory.to_string_lossy().into_owned(),
            "--work-tree".to_string(),
            cwd.to_string_lossy().into_owned(),
        ];
        Ok(GitContext {
            mode: Mode::Detached,
            metadata_directory,
            work_tree: cwd.clone(),
            working_directory: cwd,
            global_flags,
        })
    }
}

/// `<home>/.clike/git/<id>` for a detached workspace.
pub fn detached_repo_dir(home: &Path, root: &Path) -> PathBuf {
    home.join(".clike").join("git").join(workspace_id(root))
}

/// Stable short id for an absolute workspace path: the first
/// [`WORKSPACE_ID_LEN`] hex characters of its SHA-256.
pub fn workspace_id(root: &Path) -> String {
    let mut hasher = Sha256::new();
    hasher.update(root.to_string_lossy().as_bytes());
    let digest = hasher.finalize();
    let mut id = hex::encode(digest);
    id.truncate(WORKSPACE_ID_LEN);
    id
}

/// True if a throwaway file can be created and removed in `dir`.
pub fn is_dir_writable(dir: &Path) -> bool {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    let probe = dir.join(format!(".clike-write-test-{}-{nanos}", std::process::id()));
    let created = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&probe)
        .and_then(|mut file| file.write_all(b"ok"));
    if created.is_err() {
        return false;
    }
    fs::remove_file(&probe).is_ok()
}
