//! Boundary normalization for workspace roots and changed-file lists.
//!
//! Hosts hand us roots as plain paths, `file://` URLs, or `~`-prefixed
//! strings. Everything is coerced here, once, into an absolute [`PathBuf`].

use std::path::{Component, Path, PathBuf};

use url::Url;

use crate::error::SyncError;

/// Absolute, validated workspace root.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WorkspaceRoot(PathBuf);

impl WorkspaceRoot {
    /// Validate and absolutize `path`.
    ///
    /// Rejects empty paths and the filesystem root.
    pub fn new(path: impl AsRef<Path>) -> Result<Self, SyncError> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() || path.to_string_lossy().trim().is_empty() {
            return Err(SyncError::InvalidWorkspace {
                reason: "empty path".to_string(),
            });
        }
        let absolute = std::path::absolute(path).map_err(|err| SyncError::InvalidWorkspace {
            reason: format!("{}: {err}", path.display()),
        })?;
        let absolute = normalize_lexically(&absolute);
        if absolute.parent().is_none() {
            return Err(SyncError::InvalidWorkspace {
                reason: format!("{} is the filesystem root", absolute.display()),
            });
        }
        Ok(Self(absolute))
    }

    /// Parse any accepted textual form (plain path, `file://` URL, `~/...`).
    pub fn parse(input: &str) -> Result<Self, SyncError> {
        Self::new(to_fs_path(input))
    }

    pub fn as_path(&self) -> &Path {
        &self.0
    }

    pub fn into_path_buf(self) -> PathBuf {
        self.0
    }
}

impl AsRef<Path> for WorkspaceRoot {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

/// Coerce a textual path-like value into a filesystem path.
///
/// `file://` URLs are percent-decoded, a leading `~` expands to the home
/// directory, and anything else is taken verbatim (trimmed).
pub fn to_fs_path(input: &str) -> PathBuf {
    let s = input.trim();
    if s.starts_with("file://") {
        if let Some(path) = Url::parse(s).ok().and_then(|u| u.to_file_path().ok()) {
            return path;
        }
        return PathBuf::from(s.trim_start_matches("file://"));
    }
    if let Some(rest) = s.strip_prefix('~')
        && (rest.is_empty() || rest.starts_with('/') || rest.starts_with('\\'))
        && let Some(home) = dirs::home_dir()
    {
        return home.join(rest.trim_start_matches(['/', '\\']));
    }
    PathBuf::from(s)
}

/// Normalize changed-file inputs into work-tree-relative paths.
///
/// Entries may be comma-separated lists, absolute paths, or `file://` URLs.
/// Absolute paths inside `work_tree` become relative (the tree itself becomes
/// `.`); paths outside it are kept absolute and left for git to reject.
/// With `kit_req_id`, kit output paths are first mapped to their workspace
/// targets (see [`map_kit_src_to_workspace`]). Order is preserved and
/// duplicates are dropped.
pub fn normalize_changed_files(
    files: &[String],
    work_tree: &Path,
    kit_req_id: Option<&str>,
) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for raw in files.iter().flat_map(|entry| entry.split(',')) {
        let raw = raw.trim();
        if raw.is_empty() {
            continue;
        }
        let mut path = to_fs_path(raw);
        if let Some(req_id) = kit_req_id {
            path = PathBuf::from(map_kit_src_to_workspace(&path.to_string_lossy(), req_id));
        }
        let rel = if path.is_absolute() {
            match path.strip_prefix(work_tree) {
                Ok(rel) if rel.as_os_str().is_empty() => ".".to_string(),
                Ok(rel) => rel.to_string_lossy().into_owned(),
                Err(_) => path.to_string_lossy().into_owned(),
            }
        } else {
            path.to_string_lossy().into_owned()
        };
        if !out.contains(&rel) {
            out.push(rel);
        }
    }
    out
}

/// Rewrite a kit output path (`.../runs/kit/<REQ>/src/x`) to its workspace
/// target (`.../src/x`). Paths outside that convention are returned as is.
pub fn map_kit_src_to_workspace(path: &str, req_id: &str) -> String {
    let marker = format!("/runs/kit/{req_id}/src/");
    match path.find(&marker) {
        Some(idx) => format!("{}/src/{}", &path[..idx], &path[idx + marker.len()..]),
        None => path.to_string(),
    }
}

/// Drop `.` and resolve `..` against the preceding component, without
/// touching the filesystem. `..` never climbs above the root.
fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}
