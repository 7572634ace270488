//! Format processor trait and the types that flow through it.

use std::fmt;

use chrono::{DateTime, Utc};
use clipvault_core::defaults::{MAX_TAG_LENGTH, MAX_TITLE_LENGTH};
use clipvault_core::{
    BackupItemType, BackupStats, CatalogEntry, CatalogKind, Clip, Error, Result, Settings,
};
use serde::{Deserialize, Serialize};

use crate::source::SourceBuffer;

/// Backup dialects known to clipvault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormatKind {
    /// Current native JSON backup.
    NativeCurrent,
    /// Clipboard manager export with named lists of clippings.
    GenericClipboardApp,
    /// Plain notes app export (`activeNotes`).
    SimpleTextNotesApp,
    /// First-generation native backup: base64 of a binary record stream.
    NativeLegacyV1,
    /// gzip-compressed sticky notes export with categories.
    StickyNotesApp,
    /// Zip archive with one JSON file per note.
    NotesApp,
    /// Plain-text clip history with date header lines.
    ClipLog,
    /// Any JSON object carrying a `clips` array.
    LegacyFlatJson,
}

impl FormatKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NativeCurrent => "native",
            Self::GenericClipboardApp => "clipboard_app",
            Self::SimpleTextNotesApp => "simple_notes",
            Self::NativeLegacyV1 => "legacy_v1",
            Self::StickyNotesApp => "sticky_notes",
            Self::NotesApp => "notes_app",
            Self::ClipLog => "clip_log",
            Self::LegacyFlatJson => "legacy_flat",
        }
    }
}

impl fmt::Display for FormatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Import limits applied by the third-party processors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatLimits {
    pub max_title_len: usize,
    pub max_tag_len: usize,
}

impl Default for FormatLimits {
    fn default() -> Self {
        Self {
            max_title_len: MAX_TITLE_LENGTH,
            max_tag_len: MAX_TAG_LENGTH,
        }
    }
}

impl FormatLimits {
    /// Truncate to `max_title_len` characters.
    pub fn truncate_title(&self, title: &str) -> String {
        match title.char_indices().nth(self.max_title_len) {
            Some((idx, _)) => title[..idx].to_string(),
            None => title.to_string(),
        }
    }

    /// Whether a list/category name is short enough to become a tag.
    pub fn accepts_tag(&self, name: &str) -> bool {
        let len = name.chars().count();
        len > 0 && len <= self.max_tag_len
    }
}

/// Everything a processor decoded from one source.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedBackup {
    pub clips: Vec<Clip>,
    /// Tags, filters and kits carried explicitly by the file. Counted in stats.
    pub catalog: Vec<CatalogEntry>,
    /// Tags synthesized from label/category names. Not counted.
    pub labels: Vec<CatalogEntry>,
    pub settings: Option<Settings>,
}

impl ParsedBackup {
    /// Nothing meaningful to restore.
    pub fn is_empty(&self) -> bool {
        self.settings.is_none()
            && self.catalog.is_empty()
            && !self.clips.iter().any(Clip::has_text)
    }

    pub fn stats(&self) -> BackupStats {
        let clips: Vec<Clip> = self.clips.iter().filter(|c| c.has_text()).cloned().collect();
        BackupStats {
            notes: clips.len(),
            tags: self.count_catalog(CatalogKind::Tag),
            filters: self.count_catalog(CatalogKind::NamedFilter),
            snippet_kits: self.count_catalog(CatalogKind::SnippetKit),
            settings: self.settings.is_some(),
            failed: 0,
            clips,
        }
    }

    fn count_catalog(&self, kind: CatalogKind) -> usize {
        self.catalog.iter().filter(|e| e.kind == kind).count()
    }
}

/// Store snapshot handed to an exporting processor.
#[derive(Debug, Clone, Default)]
pub struct ExportSnapshot {
    pub clips: Vec<Clip>,
    pub catalog: Vec<CatalogEntry>,
    pub settings: Option<Settings>,
}

/// Serialized backup plus what went into it.
#[derive(Debug, Clone)]
pub struct ExportOutput {
    pub bytes: Vec<u8>,
    pub stats: BackupStats,
}

/// A detect/parse/serialize implementation for one backup dialect.
///
/// `detect` must be cheap, side-effect free and never fail: any ambiguity is
/// a `false`. `parse` recovers as many records as it can and skips the rest.
pub trait FormatProcessor: Send + Sync {
    fn kind(&self) -> FormatKind;

    /// Whether `source` looks like this processor's dialect.
    fn detect(&self, source: &SourceBuffer) -> bool;

    /// Decode `source`. `now` is the fallback for present-but-unreadable dates.
    fn parse(&self, source: &SourceBuffer, now: DateTime<Utc>) -> Result<ParsedBackup>;

    /// Whether [`FormatProcessor::serialize`] is implemented.
    fn supports_export(&self) -> bool {
        false
    }

    /// Encode the selected categories of `snapshot`.
    fn serialize(
        &self,
        _snapshot: &ExportSnapshot,
        _selection: &[BackupItemType],
        _now: DateTime<Utc>,
    ) -> Result<ExportOutput> {
        Err(Error::Unsupported(format!(
            "{} backups can only be restored",
            self.kind()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_title_counts_chars() {
        let limits = FormatLimits {
            max_title_len: 3,
            max_tag_len: 2,
        };
        assert_eq!(limits.truncate_title("héllo"), "hél");
        assert_eq!(limits.truncate_title("hi"), "hi");
    }

    #[test]
    fn test_accepts_tag() {
        let limits = FormatLimits {
            max_title_len: 10,
            max_tag_len: 4,
        };
        assert!(limits.accepts_tag("work"));
        assert!(!limits.accepts_tag("workplace"));
        assert!(!limits.accepts_tag(""));
    }

    #[test]
    fn test_parsed_backup_stats_skip_blank() {
        let mut parsed = ParsedBackup {
            clips: vec![Clip::new("a"), Clip::new("  ")],
            ..Default::default()
        };
        parsed
            .catalog
            .push(CatalogEntry::new("t1", "Tag", CatalogKind::Tag));
        parsed
            .catalog
            .push(CatalogEntry::new("s1", "System", CatalogKind::System(1)));
        parsed.labels.push(CatalogEntry::tag("Label"));

        let stats = parsed.stats();
        assert_eq!(stats.notes, 1);
        assert_eq!(stats.tags, 1);
        assert_eq!(stats.filters, 0);
        assert_eq!(stats.clips.len(), 1);
    }

    #[test]
    fn test_parsed_backup_only_blank_is_empty() {
        let parsed = ParsedBackup {
            clips: vec![Clip::new("")],
            ..Default::default()
        };
        assert!(parsed.is_empty());
        assert!(parsed.stats().is_empty());
    }

    #[test]
    fn test_format_kind_names() {
        assert_eq!(FormatKind::NativeCurrent.to_string(), "native");
        assert_eq!(FormatKind::LegacyFlatJson.as_str(), "legacy_flat");
    }
}
