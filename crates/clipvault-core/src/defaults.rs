//! Centralized default constants for clipvault.
//!
//! **This module is the single source of truth** for shared default values.
//! Crates reference these constants instead of defining their own magic
//! numbers.

// =============================================================================
// BACKUP FILES
// =============================================================================

/// Base name for generated backup files.
pub const BACKUP_BASE_NAME: &str = "clipvault_backup";

/// Extension for generated backup files.
pub const BACKUP_EXTENSION: &str = "json";

/// `chrono` format of the uniqueness suffix appended to backup file names.
pub const BACKUP_SUFFIX_FORMAT: &str = "%y%m%d_%H%M%S_%3f";

/// Fixed date format used by the native backup format (always UTC).
pub const NATIVE_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

// =============================================================================
// IMPORT LIMITS
// =============================================================================

/// Maximum title length kept when importing third-party notes.
pub const MAX_TITLE_LENGTH: usize = 256;

/// Maximum length of a list/category name that is turned into a tag.
pub const MAX_TAG_LENGTH: usize = 64;

/// Upper bound on the size of a restore source (64 MiB).
pub const MAX_SOURCE_BYTES: u64 = 64 * 1024 * 1024;

/// Upper bound on the decompressed size of a gzip/zip member (256 MiB).
pub const MAX_INFLATED_BYTES: u64 = 256 * 1024 * 1024;

// =============================================================================
// COMMIT
// =============================================================================

/// Maximum number of concurrent per-clip upserts during a restore commit.
pub const COMMIT_CONCURRENCY: usize = 8;

/// Broadcast channel capacity for coordinator events.
pub const EVENT_BUS_CAPACITY: usize = 64;

// =============================================================================
// NATIVE CATALOG TYPE IDS
// =============================================================================

/// Native filter type id for tags.
pub const FILTER_TYPE_TAG: i32 = 7;

/// Native filter type id for user-named filters.
pub const FILTER_TYPE_NAMED: i32 = 10;

/// Native filter type id for snippet kits.
pub const FILTER_TYPE_SNIPPET_KIT: i32 = 17;
