//! In-memory implementation of the store boundary.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::trace;
use uuid::Uuid;

use clipvault_core::{
    CatalogEntry, CatalogKind, CatalogRepository, Clip, ClipRepository, Error, Result, Settings,
    SettingsRepository,
};

use crate::snapshot::StoreSnapshot;

#[derive(Debug, Default)]
struct State {
    /// Keyed by UUIDv7 local id, so iteration follows insertion time.
    clips: BTreeMap<Uuid, Clip>,
    catalog: Vec<CatalogEntry>,
    settings: Option<Settings>,
    /// Number of clips referencing each tag id.
    tag_usage: HashMap<String, usize>,
}

impl State {
    fn count_tags(&mut self, clip: &Clip, delta: isize) {
        for tag in &clip.tag_ids {
            let count = self.tag_usage.entry(tag.clone()).or_default();
            *count = count.saturating_add_signed(delta);
            if *count == 0 {
                self.tag_usage.remove(tag);
            }
        }
    }

    fn upsert(&mut self, mut next: Clip) -> Clip {
        let id = *next.local_id.get_or_insert_with(Uuid::now_v7);
        if let Some(prior) = self.clips.remove(&id) {
            self.count_tags(&prior, -1);
        }
        self.count_tags(&next, 1);
        self.clips.insert(id, next.clone());
        next
    }
}

/// Thread-safe in-memory store.
///
/// Serves as the reference implementation of the repository traits and as
/// the test double for everything built on them.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store holding the contents of `snapshot`.
    pub fn from_snapshot(snapshot: StoreSnapshot) -> Self {
        let mut state = State {
            catalog: snapshot.catalog,
            settings: snapshot.settings,
            ..Default::default()
        };
        for clip in snapshot.clips {
            state.upsert(clip);
        }
        Self {
            state: RwLock::new(state),
        }
    }

    /// Copy the current contents out.
    pub async fn snapshot(&self) -> StoreSnapshot {
        let state = self.state.read().await;
        StoreSnapshot {
            clips: state.clips.values().cloned().collect(),
            catalog: state.catalog.clone(),
            settings: state.settings.clone(),
        }
    }

    pub async fn clip_count(&self) -> usize {
        self.state.read().await.clips.len()
    }

    /// Number of clips tagged with `tag_id`.
    pub async fn tag_usage(&self, tag_id: &str) -> usize {
        self.state
            .read()
            .await
            .tag_usage
            .get(tag_id)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl ClipRepository for MemoryStore {
    async fn get_all_clips(&self) -> Result<Vec<Clip>> {
        Ok(self.state.read().await.clips.values().cloned().collect())
    }

    async fn save(&self, clip: Clip) -> Result<Clip> {
        let saved = self.state.write().await.upsert(clip);
        trace!(
            subsystem = "store",
            component = "memory_store",
            op = "save",
            clip_id = ?saved.local_id,
            "Clip saved"
        );
        Ok(saved)
    }

    async fn update(&self, previous: Option<&Clip>, next: Clip) -> Result<Clip> {
        if let (Some(prev_id), Some(next_id)) =
            (previous.and_then(|p| p.local_id), next.local_id)
        {
            if prev_id != next_id {
                return Err(Error::InvalidInput(format!(
                    "update replaces clip {} with clip {}",
                    prev_id, next_id
                )));
            }
        }
        let mut next = next;
        if next.local_id.is_none() {
            next.local_id = previous.and_then(|p| p.local_id);
        }
        let saved = self.state.write().await.upsert(next);
        trace!(
            subsystem = "store",
            component = "memory_store",
            op = "update",
            clip_id = ?saved.local_id,
            is_new = previous.is_none(),
            "Clip updated"
        );
        Ok(saved)
    }

    async fn get_by_remote_id_or_text(
        &self,
        remote_id: Option<&str>,
        text: &str,
    ) -> Result<Option<Clip>> {
        let state = self.state.read().await;
        if let Some(remote_id) = remote_id {
            if let Some(clip) = state
                .clips
                .values()
                .find(|c| c.remote_id.as_deref() == Some(remote_id))
            {
                return Ok(Some(clip.clone()));
            }
        }
        Ok(state.clips.values().find(|c| c.text == text).cloned())
    }
}

#[async_trait]
impl CatalogRepository for MemoryStore {
    async fn list_catalog(&self, kind: Option<CatalogKind>) -> Result<Vec<CatalogEntry>> {
        let state = self.state.read().await;
        Ok(state
            .catalog
            .iter()
            .filter(|e| kind.map_or(true, |k| e.kind == k))
            .cloned()
            .collect())
    }

    async fn find_by_name(&self, kind: CatalogKind, name: &str) -> Result<Option<CatalogEntry>> {
        let state = self.state.read().await;
        Ok(state
            .catalog
            .iter()
            .find(|e| e.kind == kind && e.name == name)
            .cloned())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<CatalogEntry>> {
        let state = self.state.read().await;
        Ok(state.catalog.iter().find(|e| e.id == id).cloned())
    }

    async fn save_entry(&self, entry: CatalogEntry) -> Result<CatalogEntry> {
        if entry.name.trim().is_empty() {
            return Err(Error::InvalidInput("catalog entry has no name".into()));
        }
        let mut state = self.state.write().await;
        match state.catalog.iter_mut().find(|e| e.id == entry.id) {
            Some(existing) => *existing = entry.clone(),
            None => state.catalog.push(entry.clone()),
        }
        Ok(entry)
    }
}

#[async_trait]
impl SettingsRepository for MemoryStore {
    async fn get_settings(&self) -> Result<Option<Settings>> {
        Ok(self.state.read().await.settings.clone())
    }

    async fn save_settings(&self, settings: Settings) -> Result<()> {
        self.state.write().await.settings = Some(settings);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_save_assigns_local_id() {
        let store = MemoryStore::new();
        let saved = store.save(Clip::new("hello")).await.unwrap();
        assert!(saved.local_id.is_some());
        assert_eq!(store.clip_count().await, 1);

        let again = store.save(saved.clone()).await.unwrap();
        assert_eq!(again.local_id, saved.local_id);
        assert_eq!(store.clip_count().await, 1);
    }

    #[tokio::test]
    async fn test_update_tracks_tag_usage() {
        let store = MemoryStore::new();
        let first = store
            .update(None, Clip::new("a").with_tag("t1"))
            .await
            .unwrap();
        store
            .update(None, Clip::new("b").with_tag("t1").with_tag("t2"))
            .await
            .unwrap();
        assert_eq!(store.tag_usage("t1").await, 2);
        assert_eq!(store.tag_usage("t2").await, 1);

        let mut retagged = first.clone();
        retagged.tag_ids.clear();
        retagged.tag_ids.insert("t2".into());
        store.update(Some(&first), retagged).await.unwrap();
        assert_eq!(store.tag_usage("t1").await, 1);
        assert_eq!(store.tag_usage("t2").await, 2);
    }

    #[tokio::test]
    async fn test_update_rejects_identity_swap() {
        let store = MemoryStore::new();
        let a = store.save(Clip::new("a")).await.unwrap();
        let b = store.save(Clip::new("b")).await.unwrap();
        let result = store.update(Some(&a), b).await;
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_lookup_prefers_remote_id() {
        let store = MemoryStore::new();
        store
            .save(Clip::new("same text").with_remote_id("r1"))
            .await
            .unwrap();
        store.save(Clip::new("other")).await.unwrap();

        let by_remote = store
            .get_by_remote_id_or_text(Some("r1"), "other")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_remote.text, "same text");

        let by_text = store
            .get_by_remote_id_or_text(Some("missing"), "other")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_text.text, "other");

        assert!(store
            .get_by_remote_id_or_text(None, "Other")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_catalog_lookup() {
        let store = MemoryStore::new();
        store
            .save_entry(CatalogEntry::new("t1", "Work", CatalogKind::Tag))
            .await
            .unwrap();
        store
            .save_entry(CatalogEntry::new("f1", "Work", CatalogKind::NamedFilter))
            .await
            .unwrap();

        let tag = store
            .find_by_name(CatalogKind::Tag, "Work")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(tag.id, "t1");
        assert_eq!(store.list_catalog(None).await.unwrap().len(), 2);
        assert_eq!(
            store
                .list_catalog(Some(CatalogKind::NamedFilter))
                .await
                .unwrap()
                .len(),
            1
        );

        let mut renamed = tag.clone();
        renamed.name = "Job".into();
        store.save_entry(renamed).await.unwrap();
        assert_eq!(store.find_by_id("t1").await.unwrap().unwrap().name, "Job");
        assert_eq!(store.list_catalog(None).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_catalog_rejects_blank_name() {
        let store = MemoryStore::new();
        let result = store
            .save_entry(CatalogEntry::new("t1", " ", CatalogKind::Tag))
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_settings() {
        let store = MemoryStore::new();
        assert!(store.get_settings().await.unwrap().is_none());
        let mut map = serde_json::Map::new();
        map.insert("theme".into(), serde_json::json!("dark"));
        store.save_settings(Settings(map.clone())).await.unwrap();
        assert_eq!(store.get_settings().await.unwrap(), Some(Settings(map)));
    }
}
