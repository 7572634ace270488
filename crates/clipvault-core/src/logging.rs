//! Structured logging schema and field name constants for clipvault.
//!
//! All crates use these constants for consistent structured logging fields,
//! so a restore can be followed from detection through commit by field name.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Whole backup/restore operation failed |
//! | WARN  | Recoverable issue (one upsert failed, parse fell back to empty) |
//! | INFO  | Operation start/completion, detected format |
//! | DEBUG | Decision points (identity match, catalog resolution) |
//! | TRACE | Per-record iteration (skipped records, individual upserts) |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Subsystem originating the log event.
/// Values: "formats", "merge", "coordinator", "store", "cli"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "registry", "native", "legacy_v1", "memory_store"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "restore", "backup", "detect", "parse", "commit"
pub const OPERATION: &str = "op";

/// Name of the restore source or backup target, when known.
pub const SOURCE_NAME: &str = "source";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Local clip UUID being operated on.
pub const CLIP_ID: &str = "clip_id";

/// Remote (sync) id of a clip.
pub const REMOTE_ID: &str = "remote_id";

/// Detected backup format.
pub const FORMAT: &str = "format";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of clips parsed, merged or written.
pub const CLIP_COUNT: &str = "clip_count";

/// Number of catalog entries (tags, filters, kits) handled.
pub const CATALOG_COUNT: &str = "catalog_count";

/// Number of records skipped as blank or corrupt.
pub const SKIPPED_COUNT: &str = "skipped_count";

/// Number of upserts that failed during commit.
pub const FAILED_COUNT: &str = "failed_count";

/// Size of the restore source or written backup in bytes.
pub const BYTE_LEN: &str = "byte_len";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Boolean success/failure indicator.
pub const SUCCESS: &str = "success";

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";
