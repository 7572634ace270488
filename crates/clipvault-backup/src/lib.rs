//! # clipvault-backup
//!
//! Merge engine and backup coordinator for clipvault.
//!
//! - [`merge`](merge::merge) reconciles parsed clips with the stored
//!   collection without ever dropping a user attribute.
//! - [`BackupCoordinator`] drives restore (detect, parse, merge, commit) and
//!   backup (snapshot, serialize, write) as cancellable background
//!   operations and publishes [`BackupEvent`]s.

pub mod config;
pub mod coordinator;
pub mod events;
pub mod export;
pub mod merge;

pub use config::{BackupConfig, RestorePolicy};
pub use coordinator::{BackupCoordinator, OperationHandle};
pub use events::{BackupEvent, ErrorReport, EventBus, Operation};
pub use export::default_backup_file_name;
pub use merge::{merge, reconcile, MergeOutcome, Upsert};
