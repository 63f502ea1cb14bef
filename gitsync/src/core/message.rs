//! Commit message rendering.

use crate::core::types::Phase;

/// Build the commit message for a phase run.
///
/// The trailer line `[harper:<phase>] runId=<id>[ reqId=<req>]` is always
/// present. With conventional commits enabled it becomes the body under a
/// phase-specific subject.
pub fn commit_message(
    phase: &Phase,
    run_id: &str,
    req_id: Option<&str>,
    conventional: bool,
) -> String {
    let req_id = req_id.map(str::trim).filter(|id| !id.is_empty());
    let mut base = format!("[harper:{phase}] runId={run_id}");
    if let Some(req) = req_id {
        base.push_str(&format!(" reqId={req}"));
    }
    if !conventional {
        return base;
    }
    let scope = req_id.unwrap_or("req").to_lowercase();
    let subject = match phase {
        Phase::Spec => "spec: update SPEC.md".to_string(),
        Phase::Plan => "plan: update PLAN.md".to_string(),
        Phase::Kit => format!("feat({scope}): implement"),
        Phase::Eval => format!("test({scope}): add eval artifacts"),
        Phase::Gate => format!("chore({scope}): gate report & promotion"),
        Phase::Finalize => "chore: finalize".to_string(),
        Phase::Other(_) => return base,
    };
    format!("{subject}\n\n{base}")
}
