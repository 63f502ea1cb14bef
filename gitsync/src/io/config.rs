//! Sync settings, optionally stored as TOML (default `.clike/git.toml`).

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

/// Git automation settings (TOML).
///
/// Intended to be edited by humans. Missing fields fall back to the defaults
/// below.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GitSettings {
    /// Master switch. When false a sync makes no git calls at all.
    pub auto_commit: bool,

    pub default_branch: String,

    pub remote_name: String,

    /// Added as `remote_name` when the remote is missing.
    pub remote_url: Option<String>,

    /// Requirement-scoped phases commit to `<branch_prefix>/<req-id>`.
    pub branch_prefix: String,

    /// Tags are `<tag_prefix>/<phase>/<run-id>`.
    pub tag_prefix: String,

    pub conventional_commits: bool,

    /// Rebase onto the remote default branch before committing.
    pub push_rebase: bool,

    /// Open a draft PR after each `kit` sync.
    pub pr_per_req_draft: bool,

    /// Use `gh pr create`; otherwise defer to the host's PR action.
    pub pr_use_gh_cli: bool,

    /// Body file passed to `gh pr create --body-file`.
    pub pr_body_path: Option<PathBuf>,

    /// Merge the requirement branch into the default branch after `gate`.
    pub merge_on_gate: bool,

    pub delete_branch_on_merge: bool,

    pub return_to_feature_after_merge: bool,
}

impl Default for GitSettings {
    fn default() -> Self {
        Self {
            auto_commit: true,
            default_branch: "main".to_string(),
            remote_name: "origin".to_string(),
            remote_url: None,
            branch_prefix: "feature".to_string(),
            tag_prefix: "clike".to_string(),
            conventional_commits: true,
            push_rebase: true,
            pr_per_req_draft: false,
            pr_use_gh_cli: true,
            pr_body_path: None,
            merge_on_gate: false,
            delete_branch_on_merge: false,
            return_to_feature_after_merge: false,
        }
    }
}

impl GitSettings {
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("default_branch", &self.default_branch),
            ("remote_name", &self.remote_name),
            ("branch_prefix", &self.branch_prefix),
            ("tag_prefix", &self.tag_prefix),
        ] {
            if value.trim().is_empty() {
                return Err(anyhow!("{name} must be non-empty"));
            }
            if value.chars().any(char::is_whitespace) {
                return Err(anyhow!("{name} must not contain whitespace: '{value}'"));
            }
        }
        Ok(())
    }

    /// The configured remote URL, treating an empty string as unset.
    pub fn remote_url(&self) -> Option<&str> {
        self.remote_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }
}

/// Conventional settings location for a workspace root.
pub fn default_settings_path(root: &Path) -> PathBuf {
    root.join(".clike").join("git.toml")
}

/// Load settings from a TOML file.
///
/// If the file is missing, returns `GitSettings::default()`.
pub fn load_settings(path: &Path) -> Result<GitSettings> {
    if !path.exists() {
        let settings = GitSettings::default();
        settings.validate()?;
        return Ok(settings);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let settings: GitSettings =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    settings.validate()?;
    Ok(settings)
}
