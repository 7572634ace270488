//! Coordinator configuration.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use clipvault_core::defaults;
use clipvault_core::Error;
use clipvault_formats::FormatLimits;

/// What a restore request does while another restore is running.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RestorePolicy {
    /// Wait for the running restore to finish.
    #[default]
    Queue,
    /// Fail immediately with [`Error::RestoreInProgress`].
    Reject,
}

impl RestorePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            RestorePolicy::Queue => "queue",
            RestorePolicy::Reject => "reject",
        }
    }
}

impl fmt::Display for RestorePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RestorePolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "queue" | "wait" => Ok(RestorePolicy::Queue),
            "reject" | "fail" => Ok(RestorePolicy::Reject),
            other => Err(Error::Config(format!("unknown restore policy: {}", other))),
        }
    }
}

/// Configuration for [`BackupCoordinator`](crate::BackupCoordinator).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupConfig {
    /// Maximum number of in-flight upserts while committing a restore.
    pub commit_concurrency: usize,
    /// Largest restore source accepted, in bytes.
    pub max_source_bytes: u64,
    pub restore_policy: RestorePolicy,
    /// Base of generated backup file names.
    pub backup_base_name: String,
    pub max_title_len: usize,
    pub max_tag_len: usize,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            commit_concurrency: defaults::COMMIT_CONCURRENCY,
            max_source_bytes: defaults::MAX_SOURCE_BYTES,
            restore_policy: RestorePolicy::default(),
            backup_base_name: defaults::BACKUP_BASE_NAME.to_string(),
            max_title_len: defaults::MAX_TITLE_LENGTH,
            max_tag_len: defaults::MAX_TAG_LENGTH,
        }
    }
}

impl BackupConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `CLIPVAULT_COMMIT_CONCURRENCY` | `8` | Max in-flight upserts during commit |
    /// | `CLIPVAULT_MAX_SOURCE_BYTES` | `67108864` | Largest accepted restore source |
    /// | `CLIPVAULT_RESTORE_POLICY` | `queue` | `queue` or `reject` concurrent restores |
    /// | `CLIPVAULT_BACKUP_BASE_NAME` | `clipvault_backup` | Base of generated file names |
    /// | `CLIPVAULT_MAX_TITLE_LENGTH` | `256` | Imported titles are truncated to this |
    /// | `CLIPVAULT_MAX_TAG_LENGTH` | `64` | Longer list names are not turned into tags |
    ///
    /// Unparsable values fall back to the default.
    pub fn from_env() -> Self {
        let commit_concurrency = env_parse("CLIPVAULT_COMMIT_CONCURRENCY")
            .unwrap_or(defaults::COMMIT_CONCURRENCY)
            .max(1);

        let max_source_bytes =
            env_parse("CLIPVAULT_MAX_SOURCE_BYTES").unwrap_or(defaults::MAX_SOURCE_BYTES);

        let restore_policy = env_parse("CLIPVAULT_RESTORE_POLICY").unwrap_or_default();

        let backup_base_name = std::env::var("CLIPVAULT_BACKUP_BASE_NAME")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| defaults::BACKUP_BASE_NAME.to_string());

        let max_title_len =
            env_parse("CLIPVAULT_MAX_TITLE_LENGTH").unwrap_or(defaults::MAX_TITLE_LENGTH);

        let max_tag_len = env_parse("CLIPVAULT_MAX_TAG_LENGTH").unwrap_or(defaults::MAX_TAG_LENGTH);

        Self {
            commit_concurrency,
            max_source_bytes,
            restore_policy,
            backup_base_name,
            max_title_len,
            max_tag_len,
        }
    }

    /// Set the maximum number of concurrent upserts (at least 1).
    pub fn with_commit_concurrency(mut self, concurrency: usize) -> Self {
        self.commit_concurrency = concurrency.max(1);
        self
    }

    pub fn with_max_source_bytes(mut self, bytes: u64) -> Self {
        self.max_source_bytes = bytes;
        self
    }

    pub fn with_restore_policy(mut self, policy: RestorePolicy) -> Self {
        self.restore_policy = policy;
        self
    }

    pub fn with_backup_base_name(mut self, name: impl Into<String>) -> Self {
        self.backup_base_name = name.into();
        self
    }

    pub fn with_max_title_len(mut self, len: usize) -> Self {
        self.max_title_len = len;
        self
    }

    pub fn with_max_tag_len(mut self, len: usize) -> Self {
        self.max_tag_len = len;
        self
    }

    /// Import limits handed to the format processors.
    pub fn limits(&self) -> FormatLimits {
        FormatLimits {
            max_title_len: self.max_title_len,
            max_tag_len: self.max_tag_len,
        }
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_shared_constants() {
        let config = BackupConfig::default();
        assert_eq!(config.commit_concurrency, defaults::COMMIT_CONCURRENCY);
        assert_eq!(config.max_source_bytes, defaults::MAX_SOURCE_BYTES);
        assert_eq!(config.restore_policy, RestorePolicy::Queue);
        assert_eq!(config.backup_base_name, "clipvault_backup");
        assert_eq!(config.limits(), FormatLimits::default());
    }

    #[test]
    fn test_builders() {
        let config = BackupConfig::default()
            .with_commit_concurrency(0)
            .with_restore_policy(RestorePolicy::Reject)
            .with_max_title_len(10)
            .with_max_tag_len(3)
            .with_backup_base_name("mine");
        assert_eq!(config.commit_concurrency, 1);
        assert_eq!(config.restore_policy, RestorePolicy::Reject);
        assert_eq!(config.limits().max_title_len, 10);
        assert_eq!(config.limits().max_tag_len, 3);
        assert_eq!(config.backup_base_name, "mine");
    }

    #[test]
    fn test_restore_policy_parse() {
        assert_eq!("queue".parse::<RestorePolicy>().unwrap(), RestorePolicy::Queue);
        assert_eq!(" REJECT ".parse::<RestorePolicy>().unwrap(), RestorePolicy::Reject);
        assert!(matches!(
            "sometimes".parse::<RestorePolicy>(),
            Err(Error::Config(_))
        ));
    }
}
