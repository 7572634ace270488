//! Backup file naming.

use chrono::{DateTime, Utc};

use clipvault_core::defaults::{BACKUP_BASE_NAME, BACKUP_EXTENSION, BACKUP_SUFFIX_FORMAT};

/// Generated name for a new backup file: `<base>-<yyMMdd_HHmmss_SSS>.json`.
///
/// The base is trimmed and `.`/`:` are replaced with `_` so the result is a
/// single, portable file name. A blank base falls back to the default.
pub fn default_backup_file_name(base: &str, now: DateTime<Utc>) -> String {
    let base = base.trim();
    let base = if base.is_empty() { BACKUP_BASE_NAME } else { base };
    let sanitized: String = base
        .chars()
        .map(|c| match c {
            '.' | ':' | '/' | '\\' => '_',
            c => c,
        })
        .collect();
    format!(
        "{}-{}.{}",
        sanitized,
        now.format(BACKUP_SUFFIX_FORMAT),
        BACKUP_EXTENSION
    )
}
