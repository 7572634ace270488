//! Per-category counters describing the effect of one backup or restore.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::models::{BackupItemType, Clip};

/// Immutable report of one backup or restore operation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BackupStats {
    pub notes: usize,
    pub tags: usize,
    pub filters: usize,
    pub snippet_kits: usize,
    pub settings: bool,
    /// Clips whose upsert failed during commit. Not included in `notes`.
    #[serde(default)]
    pub failed: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub clips: Vec<Clip>,
}

impl BackupStats {
    /// True iff nothing at all was produced.
    pub fn is_empty(&self) -> bool {
        self.notes == 0
            && self.tags == 0
            && self.filters == 0
            && self.snippet_kits == 0
            && !self.settings
            && self.failed == 0
            && self.clips.is_empty()
    }

    fn count_of(&self, item: BackupItemType) -> usize {
        match item {
            BackupItemType::Settings => usize::from(self.settings),
            BackupItemType::Notes => self.notes,
            BackupItemType::Tags => self.tags,
            BackupItemType::Filters => self.filters,
            BackupItemType::SnippetKits => self.snippet_kits,
        }
    }

    /// Report with the default English labels.
    pub fn summary(&self) -> String {
        self.summary_with(&HashMap::new())
    }

    /// Newline-joined `"<Label>: <count>"` lines, one per category in
    /// [`BackupItemType::ALL`] order, zero counts included.
    ///
    /// Labels missing from `labels` fall back to [`BackupItemType::label`].
    /// A non-zero `failed` count is appended last.
    pub fn summary_with(&self, labels: &HashMap<BackupItemType, String>) -> String {
        let mut lines: Vec<String> = BackupItemType::ALL
            .iter()
            .map(|item| {
                let label = labels
                    .get(item)
                    .map(String::as_str)
                    .unwrap_or_else(|| item.label());
                format!("{}: {}", label, self.count_of(*item))
            })
            .collect();
        if self.failed > 0 {
            lines.push(format!("Failed: {}", self.failed));
        }
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_empty() {
        assert!(BackupStats::default().is_empty());
    }

    #[test]
    fn test_settings_alone_is_not_empty() {
        let stats = BackupStats {
            settings: true,
            ..Default::default()
        };
        assert!(!stats.is_empty());
    }

    #[test]
    fn test_clips_alone_is_not_empty() {
        let stats = BackupStats {
            clips: vec![Clip::new("x")],
            ..Default::default()
        };
        assert!(!stats.is_empty());
    }

    #[test]
    fn test_summary_lists_every_category_in_order() {
        let stats = BackupStats {
            notes: 3,
            tags: 0,
            filters: 2,
            snippet_kits: 1,
            settings: true,
            ..Default::default()
        };
        assert_eq!(
            stats.summary(),
            "Settings: 1\nNotes: 3\nTags: 0\nFilters: 2\nSnippet kits: 1"
        );
    }

    #[test]
    fn test_summary_with_localized_labels() {
        let stats = BackupStats {
            notes: 2,
            tags: 1,
            ..Default::default()
        };
        let mut labels = HashMap::new();
        labels.insert(BackupItemType::Notes, "Notizen".to_string());
        assert_eq!(
            stats.summary_with(&labels),
            "Settings: 0\nNotizen: 2\nTags: 1\nFilters: 0\nSnippet kits: 0"
        );
    }

    #[test]
    fn test_summary_reports_failures() {
        let stats = BackupStats {
            notes: 1,
            failed: 2,
            ..Default::default()
        };
        assert_eq!(
            stats.summary(),
            "Settings: 0\nNotes: 1\nTags: 0\nFilters: 0\nSnippet kits: 0\nFailed: 2"
        );
    }

    #[test]
    fn test_empty_summary_still_has_every_line() {
        let summary = BackupStats::default().summary();
        assert_eq!(summary.lines().count(), BackupItemType::ALL.len());
        assert!(summary.lines().all(|line| line.ends_with(": 0")));
    }
}
