//! Deterministic, pure logic shared by the sync engine.
//!
//! Core modules do not spawn processes. They map invocation parameters to
//! names, messages and normalized paths, and are tested in isolation.

pub mod branch;
pub mod message;
pub mod path;
pub mod types;
