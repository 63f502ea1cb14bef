//! Branch and tag naming for workflow phases.

use crate::core::types::Phase;
use crate::error::SyncError;
use crate::io::config::GitSettings;

/// Branch a phase commits to.
///
/// Requirement-scoped phases (`kit`, `eval`, `gate`) get
/// `<branch_prefix>/<req-id lowercased>` and fail without a requirement id;
/// every other phase uses the default branch.
pub fn target_branch(
    phase: &Phase,
    req_id: Option<&str>,
    settings: &GitSettings,
) -> Result<String, SyncError> {
    if !phase.is_requirement_scoped() {
        return Ok(settings.default_branch.clone());
    }
    let req_id = req_id
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| SyncError::MissingReqId {
            phase: phase.to_string(),
        })?;
    Ok(format!("{}/{}", settings.branch_prefix, req_id.to_lowercase()))
}

/// Annotated tag name for a phase run: `<tag_prefix>/<phase>/<run-id>`.
pub fn tag_name(phase: &Phase, run_id: &str, settings: &GitSettings) -> String {
    format!("{}/{}/{}", settings.tag_prefix, phase, run_id)
}
