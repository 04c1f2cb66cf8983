//! Per-key serialization of cache access.
//!
//! Two concurrent misses for the same cache path would otherwise both fetch
//! from the origin and race their writes, and a reader could observe a
//! partially written file. Handing out one async mutex per resolved cache
//! path closes the race: at most one fetch-and-persist runs per key, and a
//! request that waited on an in-flight key re-checks the cache after
//! acquiring, turning into a plain hit. Unrelated keys never contend.
//!
//! Locks are created lazily and kept for the life of the instance; the map
//! is bounded by the set of distinct resources actually requested.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Lazily created map from cache path to its lock.
#[derive(Debug, Default)]
pub struct KeyLocks {
    inner: Mutex<HashMap<PathBuf, Arc<AsyncMutex<()>>>>,
}

impl KeyLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires the lock for `path`, creating it on first use.
    pub async fn acquire(&self, path: &Path) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock();
            Arc::clone(
                map.entry(path.to_path_buf())
                    .or_insert_with(|| Arc::new(AsyncMutex::new(()))),
            )
        };
        lock.lock_owned().await
    }
}
