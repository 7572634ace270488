//! JSON snapshot persistence for [`MemoryStore`](crate::MemoryStore).

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use clipvault_core::{CatalogEntry, Clip, Error, Result, Settings};

use crate::memory::MemoryStore;

/// Full store contents as written to disk.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    #[serde(default)]
    pub clips: Vec<Clip>,
    #[serde(default)]
    pub catalog: Vec<CatalogEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<Settings>,
}

impl MemoryStore {
    /// Load a store from `path`, or start empty when the file does not exist.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(
                    subsystem = "store",
                    component = "snapshot",
                    path = %path.display(),
                    "No store file, starting empty"
                );
                return Ok(Self::new());
            }
            Err(e) => return Err(Error::Io(e)),
        };
        let snapshot: StoreSnapshot = serde_json::from_slice(&bytes)
            .map_err(|e| Error::Store(format!("{}: {}", path.display(), e)))?;
        debug!(
            subsystem = "store",
            component = "snapshot",
            path = %path.display(),
            clip_count = snapshot.clips.len(),
            catalog_count = snapshot.catalog.len(),
            "Store loaded"
        );
        Ok(Self::from_snapshot(snapshot))
    }

    /// Write the store to `path`, replacing it atomically.
    pub async fn persist(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let snapshot = self.snapshot().await;
        let bytes = serde_json::to_vec_pretty(&snapshot)?;

        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, path).await?;

        debug!(
            subsystem = "store",
            component = "snapshot",
            path = %path.display(),
            clip_count = snapshot.clips.len(),
            byte_len = bytes.len(),
            "Store persisted"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clipvault_core::{CatalogKind, CatalogRepository, ClipRepository};

    #[tokio::test]
    async fn test_open_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::open(dir.path().join("absent.json")).await.unwrap();
        assert_eq!(store.clip_count().await, 0);
    }

    #[tokio::test]
    async fn test_persist_and_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");

        let store = MemoryStore::new();
        let saved = store.save(Clip::new("kept").with_tag("t1")).await.unwrap();
        store
            .save_entry(CatalogEntry::new("t1", "Work", CatalogKind::Tag))
            .await
            .unwrap();
        store.persist(&path).await.unwrap();

        let reopened = MemoryStore::open(&path).await.unwrap();
        let clips = reopened.get_all_clips().await.unwrap();
        assert_eq!(clips.len(), 1);
        assert_eq!(clips[0].local_id, saved.local_id);
        assert_eq!(reopened.tag_usage("t1").await, 1);
        assert!(reopened.find_by_id("t1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_open_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        tokio::fs::write(&path, b"{ nope").await.unwrap();
        assert!(matches!(
            MemoryStore::open(&path).await,
            Err(Error::Store(_))
        ));
    }
}
