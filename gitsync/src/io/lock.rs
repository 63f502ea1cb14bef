//! Per-workspace serialization of sync invocations inside one process.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::debug;

/// Async mutexes keyed by a repository's metadata directory.
///
/// Two syncs for the same workspace resolve to the same metadata directory
/// and so queue behind each other; different workspaces proceed in parallel.
#[derive(Debug, Default)]
pub struct WorkspaceLocks {
    slots: Mutex<HashMap<PathBuf, Arc<AsyncMutex<()>>>>,
}

impl WorkspaceLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide lock table.
    pub fn shared() -> Arc<WorkspaceLocks> {
        static SHARED: OnceLock<Arc<WorkspaceLocks>> = OnceLock::new();
        Arc::clone(SHARED.get_or_init(|| Arc::new(WorkspaceLocks::new())))
    }

    /// Wait for exclusive access to `key`. Released when the guard drops.
    ///
    /// Slots nobody holds or waits on are dropped here, so the table only
    /// keeps workspaces that are in use.
    pub async fn acquire(&self, key: &Path) -> OwnedMutexGuard<()> {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            // Guards and pending waiters each own a clone.
            slots.retain(|_, slot| Arc::strong_count(slot) > 1);
            Arc::clone(slots.entry(key.to_path_buf()).or_default())
        };
        debug!(key = %key.display(), "waiting for workspace lock");
        slot.lock_owned().await
    }
}
