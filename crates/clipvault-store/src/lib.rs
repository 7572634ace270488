//! # clipvault-store
//!
//! In-memory implementation of the clipvault store boundary
//! ([`ClipRepository`](clipvault_core::ClipRepository),
//! [`CatalogRepository`](clipvault_core::CatalogRepository),
//! [`SettingsRepository`](clipvault_core::SettingsRepository)) with JSON
//! snapshot persistence.

pub mod memory;
pub mod snapshot;

pub use memory::MemoryStore;
pub use snapshot::StoreSnapshot;
