//! Git synchronization engine for phase-driven workspaces.
//!
//! Each workflow phase (`spec`, `plan`, `kit`, `eval`, `gate`, `finalize`)
//! ends with a sync that commits the phase's output to a predictable branch,
//! tags the run, and optionally pushes, merges, or opens a pull request. The
//! crate is layered:
//!
//! - **[`core`]**: Pure logic (branch routing, commit messages, path
//!   normalization, report types). No I/O.
//! - **[`io`]**: Side effects (child processes, context resolution, repository
//!   bootstrap, remotes, settings files). The [`io::runner::CommandRunner`]
//!   seam lets tests script every git call.
//!
//! [`sync`] composes both into the ordered sync sequence; [`diag`] takes a
//! read-only snapshot of a repository.

pub mod core;
pub mod diag;
pub mod error;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod sync;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
