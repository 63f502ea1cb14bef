//! Remote configuration. Never fatal: a missing remote only disables the
//! network steps of a sync.

use tracing::{info, warn};

use crate::core::types::StepOutcome;
use crate::io::git::Git;
use crate::io::runner::CommandRunner;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteResolution {
    pub has_remote: bool,
    pub outcome: StepOutcome,
}

/// Make sure remote `name` exists, adding it from `url` when absent.
pub async fn ensure_remote<R: CommandRunner>(
    git: &Git<'_, R>,
    name: &str,
    url: Option<&str>,
) -> RemoteResolution {
    if let Some(existing) = git.remote_url(name).await {
        return RemoteResolution {
            has_remote: true,
            outcome: StepOutcome::done_with(format!("{name} -> {existing}")),
        };
    }
    let Some(url) = url else {
        git.note(format!("[git] no remote '{name}' configured, network steps skipped"));
        return RemoteResolution {
            has_remote: false,
            outcome: StepOutcome::skipped(format!("remote '{name}' not configured")),
        };
    };
    match git.run("git", &["remote", "add", name, url]).await {
        Ok(_) => {
            info!(remote = name, url, "added remote");
            RemoteResolution {
                has_remote: true,
                outcome: StepOutcome::done_with(format!("added {name} -> {url}")),
            }
        }
        Err(err) => {
            warn!(remote = name, err = %err, "failed to add remote");
            RemoteResolution {
                has_remote: false,
                outcome: StepOutcome::warning(format!("remote add {name}: {err}")),
            }
        }
    }
}
