//! Stable exit codes for gitsync CLI commands.

/// Command succeeded. Degraded sync steps still exit with `OK`; they are
/// reported as warnings in the JSON output.
pub const OK: i32 = 0;
/// Sync aborted: invalid workspace, missing requirement id, failed
/// `git init`, or unresolvable context.
pub const FATAL: i32 = 1;
/// Invalid configuration or command-line input.
pub const INVALID: i32 = 2;
