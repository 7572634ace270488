//! Core traits for the clipvault store boundary.
//!
//! The backup engine never touches persistence directly. Concrete stores
//! implement these traits, which keeps the merge engine and coordinator
//! testable against an in-memory double.

use async_trait::async_trait;

use crate::error::Result;
use crate::models::*;

// =============================================================================
// CLIP REPOSITORY
// =============================================================================

/// Repository for clip persistence.
#[async_trait]
pub trait ClipRepository: Send + Sync {
    /// Every clip in the store, soft-deleted ones included.
    async fn get_all_clips(&self) -> Result<Vec<Clip>>;

    /// Insert or replace a clip. Assigns a local id when the clip has none
    /// and returns the stored record.
    async fn save(&self, clip: Clip) -> Result<Clip>;

    /// Persist `next` and run index bookkeeping against `previous`
    /// (tag usage, filter counts). `previous` is `None` for a new clip.
    async fn update(&self, previous: Option<&Clip>, next: Clip) -> Result<Clip>;

    /// Find a clip by remote id first, then by exact text.
    async fn get_by_remote_id_or_text(
        &self,
        remote_id: Option<&str>,
        text: &str,
    ) -> Result<Option<Clip>>;
}

// =============================================================================
// CATALOG REPOSITORY
// =============================================================================

/// Repository for tags, named filters and snippet kits.
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    /// All catalog entries, optionally restricted to one kind.
    async fn list_catalog(&self, kind: Option<CatalogKind>) -> Result<Vec<CatalogEntry>>;

    /// Look up an entry of `kind` by exact name.
    async fn find_by_name(&self, kind: CatalogKind, name: &str) -> Result<Option<CatalogEntry>>;

    /// Look up an entry by id.
    async fn find_by_id(&self, id: &str) -> Result<Option<CatalogEntry>>;

    /// Insert or replace an entry, keyed by id.
    async fn save_entry(&self, entry: CatalogEntry) -> Result<CatalogEntry>;
}

// =============================================================================
// SETTINGS REPOSITORY
// =============================================================================

#[async_trait]
pub trait SettingsRepository: Send + Sync {
    async fn get_settings(&self) -> Result<Option<Settings>>;

    async fn save_settings(&self, settings: Settings) -> Result<()>;
}

/// Everything the backup coordinator needs from a store.
pub trait BackupStore: ClipRepository + CatalogRepository + SettingsRepository {}

impl<T> BackupStore for T where T: ClipRepository + CatalogRepository + SettingsRepository {}
