//! Process-level tracing setup for the CLI.
//!
//! Library code only emits `tracing` events. Per-command sync lines go
//! through [`SyncLog`](crate::io::log::SyncLog), whose default implementation
//! forwards into the same subscriber.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "warn,gitsync=info";

/// Initialize the tracing subscriber.
///
/// Reads `RUST_LOG`, falling back to [`DEFAULT_FILTER`]. Output goes to
/// stderr in compact format so stdout stays machine-readable.
///
/// # Example
/// ```bash
/// RUST_LOG=gitsync=debug gitsync sync --phase spec --run-id r1
/// ```
pub fn init() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
