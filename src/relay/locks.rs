//! Per-photo relay serialization
//!
//! The staged path depends only on the photo ID, so two relays of the same
//! photo would write the same file. Relays of one ID take turns; relays of
//! different IDs run concurrently.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::debug;

type LockTable = HashMap<String, Arc<AsyncMutex<()>>>;

/// Async lock per media ID
///
/// An entry lives exactly as long as some relay holds or waits for it, so a
/// long download can never lose its lock to eviction.
#[derive(Clone, Default)]
pub struct MediaLocks {
    table: Arc<Mutex<LockTable>>,
}

/// Held for the duration of one relay; releases the media ID on drop
pub struct MediaGuard {
    table: Arc<Mutex<LockTable>>,
    media_id: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl MediaLocks {
    /// Creates an empty lock table
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits until no other relay holds `media_id`, then holds it until the
    /// guard is dropped
    pub async fn acquire(&self, media_id: &str) -> MediaGuard {
        let lock = {
            let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(table.entry(media_id.to_string()).or_default())
        };

        let guard = match Arc::clone(&lock).try_lock_owned() {
            Ok(guard) => guard,
            Err(_) => {
                debug!(media_id, "Waiting for in-flight relay of the same photo");
                lock.lock_owned().await
            }
        };

        MediaGuard {
            table: Arc::clone(&self.table),
            media_id: media_id.to_string(),
            guard: Some(guard),
        }
    }

    /// Number of media IDs currently held or awaited
    #[must_use]
    pub fn tracked(&self) -> usize {
        self.table
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl Drop for MediaGuard {
    fn drop(&mut self) {
        // Release first so the count below only sees the table and waiters
        drop(self.guard.take());

        let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
        if table
            .get(&self.media_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            table.remove(&self.media_id);
        }
    }
}
