//! Filesystem-backed cache persistence.
//!
//! Entries are plain files holding raw, already-decompressed response bytes.
//! There is no sidecar metadata, no expiry, and nothing is ever deleted;
//! removing a file by hand is the only eviction mechanism.

use std::io::ErrorKind;
use std::path::Path;

use tokio::fs;

use crate::error::{ProxyError, Result};

/// Filesystem-backed store for cached response bodies.
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheStore;

impl CacheStore {
    pub fn new() -> Self {
        Self
    }

    /// Presence check. Does not open or validate the entry's contents.
    pub async fn exists(&self, path: &Path) -> bool {
        fs::metadata(path).await.is_ok()
    }

    /// Reads the full entry.
    ///
    /// A file that vanished since the existence check maps to
    /// [`ProxyError::NotFound`]; everything else is a storage failure.
    pub async fn read(&self, path: &Path) -> Result<Vec<u8>> {
        fs::read(path).await.map_err(|err| match err.kind() {
            ErrorKind::NotFound => ProxyError::NotFound(path.to_path_buf()),
            _ => ProxyError::Storage(err),
        })
    }

    /// Writes the full buffer, creating intermediate directories on demand
    /// and overwriting any existing entry.
    pub async fn write(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(ProxyError::Storage)?;
        }
        fs::write(path, bytes).await.map_err(ProxyError::Storage)
    }
}
