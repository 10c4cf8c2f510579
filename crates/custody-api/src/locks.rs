//! Per-item serialization of custody transitions.
//!
//! Every transition reads then writes the active-credential slot, and the
//! external uploads sit between the read and the write. Holding the item's
//! async mutex across verify, upload and commit serializes transitions on
//! one item inside this process while different items proceed in parallel.

use std::collections::HashMap;
use std::sync::Arc;

use custody_core::ItemKey;
use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Held while a transition on one item runs.
pub type ItemGuard = OwnedMutexGuard<()>;

/// Registry of per-item async mutexes.
#[derive(Debug, Default, Clone)]
pub struct ItemLocks {
    inner: Arc<Mutex<HashMap<ItemKey, Arc<AsyncMutex<()>>>>>,
}

impl ItemLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `key`.
    pub async fn acquire(&self, key: &ItemKey) -> ItemGuard {
        let slot = {
            let mut map = self.inner.lock();
            // Drop slots nobody holds or waits on.
            map.retain(|_, m| Arc::strong_count(m) > 1);
            Arc::clone(map.entry(key.clone()).or_default())
        };
        slot.lock_owned().await
    }

    /// Number of items with a held or awaited lock.
    pub fn in_use(&self) -> usize {
        self.inner
            .lock()
            .values()
            .filter(|m| Arc::strong_count(m) > 1)
            .count()
    }
}
