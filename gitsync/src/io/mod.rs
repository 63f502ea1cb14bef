//! Side-effecting layer: processes, the filesystem, and git state.

pub mod bootstrap;
pub mod config;
pub mod context;
pub mod git;
pub mod lock;
pub mod log;
pub mod remote;
pub mod runner;
