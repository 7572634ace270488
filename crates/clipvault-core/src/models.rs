//! Core data models for clipvault.
//!
//! These types are the canonical representation every backup dialect is
//! translated into or out of. They are shared across all clipvault crates.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use uuid::Uuid;

use crate::defaults::{FILTER_TYPE_NAMED, FILTER_TYPE_SNIPPET_KIT, FILTER_TYPE_TAG};

// =============================================================================
// CLIP
// =============================================================================

/// How the text of a clip should be interpreted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TextType {
    #[default]
    TextPlain,
    Link,
    Markdown,
    Html,
    Code,
}

static LINK_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:(?:https?|ftp)://|www\.)\S+$|^[\w.+-]+@[\w-]+(?:\.[\w-]+)+$")
        .expect("link pattern is valid")
});

static HTML_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)^\s*<(?:!doctype\s+html|html|body|div|p|span|a\s|table|ul|ol|h[1-6])\b.*</\w+>\s*$")
        .expect("html pattern is valid")
});

impl TextType {
    /// Parse a native type name, falling back to plain text for anything unknown.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_uppercase().as_str() {
            "LINK" => Self::Link,
            "MARKDOWN" => Self::Markdown,
            "HTML" => Self::Html,
            "CODE" => Self::Code,
            _ => Self::TextPlain,
        }
    }

    /// Map the numeric ids used by the legacy binary format.
    pub fn from_id(id: i32) -> Self {
        match id {
            1 => Self::Link,
            2 => Self::Markdown,
            3 => Self::Html,
            4 => Self::Code,
            _ => Self::TextPlain,
        }
    }

    /// Classify imported text that carries no type of its own.
    pub fn detect(text: &str) -> Self {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            Self::TextPlain
        } else if HTML_PATTERN.is_match(trimmed) {
            Self::Html
        } else if LINK_PATTERN.is_match(trimmed) {
            Self::Link
        } else {
            Self::TextPlain
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TextPlain => "TEXT_PLAIN",
            Self::Link => "LINK",
            Self::Markdown => "MARKDOWN",
            Self::Html => "HTML",
            Self::Code => "CODE",
        }
    }
}

impl fmt::Display for TextType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A canonical note/clipboard record.
///
/// `local_id` is owned by the store and stays `None` until the clip has been
/// saved once. `remote_id` is stable across devices and only present once the
/// clip has synced. A clip whose `text` is blank is invalid and never reaches
/// the store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Clip {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_id: Option<String>,
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub tag_ids: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub snippet_kit_ids: BTreeSet<String>,
    #[serde(default)]
    pub favorite: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modify_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_date: Option<DateTime<Utc>>,
    /// Soft-delete marker; deleted clips are kept so later restores still dedupe against them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub text_type: TextType,
    #[serde(default)]
    pub usage_count: u32,
    #[serde(default)]
    pub tracked: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub file_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abbreviation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Clip {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn with_remote_id(mut self, remote_id: impl Into<String>) -> Self {
        self.remote_id = Some(remote_id.into());
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_tag(mut self, tag_id: impl Into<String>) -> Self {
        self.tag_ids.insert(tag_id.into());
        self
    }

    pub fn with_snippet_kit(mut self, kit_id: impl Into<String>) -> Self {
        self.snippet_kit_ids.insert(kit_id.into());
        self
    }

    pub fn with_favorite(mut self, favorite: bool) -> Self {
        self.favorite = favorite;
        self
    }

    pub fn with_create_date(mut self, date: DateTime<Utc>) -> Self {
        self.create_date = Some(date);
        self
    }

    /// Whether the clip carries non-blank text.
    pub fn has_text(&self) -> bool {
        !self.text.trim().is_empty()
    }

    pub fn deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Compare the user-visible content, ignoring identity and timestamps.
    pub fn same_content(&self, other: &Clip) -> bool {
        self.text == other.text
            && self.title == other.title
            && self.tag_ids == other.tag_ids
            && self.snippet_kit_ids == other.snippet_kit_ids
            && self.favorite == other.favorite
    }
}

// =============================================================================
// CATALOG (TAGS, FILTERS, SNIPPET KITS)
// =============================================================================

/// Category of a catalog entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CatalogKind {
    Tag,
    NamedFilter,
    SnippetKit,
    /// Built-in filters (starred, clipboard, deleted...) keyed by their native type id.
    System(i32),
}

impl CatalogKind {
    pub fn from_type_id(type_id: i32) -> Self {
        match type_id {
            FILTER_TYPE_TAG => Self::Tag,
            FILTER_TYPE_NAMED => Self::NamedFilter,
            FILTER_TYPE_SNIPPET_KIT => Self::SnippetKit,
            other => Self::System(other),
        }
    }

    pub fn type_id(&self) -> i32 {
        match self {
            Self::Tag => FILTER_TYPE_TAG,
            Self::NamedFilter => FILTER_TYPE_NAMED,
            Self::SnippetKit => FILTER_TYPE_SNIPPET_KIT,
            Self::System(id) => *id,
        }
    }
}

impl Serialize for CatalogKind {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i32(self.type_id())
    }
}

impl<'de> Deserialize<'de> for CatalogKind {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        i32::deserialize(deserializer).map(Self::from_type_id)
    }
}

/// A tag, named filter or snippet kit.
///
/// The backup only merges these wholesale, so everything beyond identity and
/// name is carried in `attributes` untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub id: String,
    pub name: String,
    pub kind: CatalogKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub attributes: Map<String, JsonValue>,
}

impl CatalogEntry {
    pub fn new(id: impl Into<String>, name: impl Into<String>, kind: CatalogKind) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind,
            color: None,
            created: None,
            updated: None,
            attributes: Map::new(),
        }
    }

    /// A tag with a freshly generated id.
    pub fn tag(name: impl Into<String>) -> Self {
        Self::new(Uuid::now_v7().to_string(), name, CatalogKind::Tag)
    }

    pub fn is_tag(&self) -> bool {
        self.kind == CatalogKind::Tag
    }

    pub fn is_named_filter(&self) -> bool {
        self.kind == CatalogKind::NamedFilter
    }

    pub fn is_snippet_kit(&self) -> bool {
        self.kind == CatalogKind::SnippetKit
    }
}

// =============================================================================
// SETTINGS
// =============================================================================

/// Application settings, carried opaquely through backup and restore.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Settings(pub Map<String, JsonValue>);

impl Settings {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// =============================================================================
// BACKUP ITEM TYPES
// =============================================================================

/// Category a user can select for backup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackupItemType {
    Settings,
    Notes,
    Tags,
    Filters,
    SnippetKits,
}

impl BackupItemType {
    /// Every category, in report order.
    pub const ALL: [BackupItemType; 5] = [
        Self::Settings,
        Self::Notes,
        Self::Tags,
        Self::Filters,
        Self::SnippetKits,
    ];

    /// Default (English) label used in reports.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Settings => "Settings",
            Self::Notes => "Notes",
            Self::Tags => "Tags",
            Self::Filters => "Filters",
            Self::SnippetKits => "Snippet kits",
        }
    }
}

impl fmt::Display for BackupItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for BackupItemType {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace(['-', ' '], "_").as_str() {
            "settings" => Ok(Self::Settings),
            "notes" | "clips" => Ok(Self::Notes),
            "tags" => Ok(Self::Tags),
            "filters" => Ok(Self::Filters),
            "snippet_kits" | "snippets" | "kits" => Ok(Self::SnippetKits),
            _ => Err(format!("Invalid backup item type: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clip_has_text_rejects_blank() {
        assert!(Clip::new("hello").has_text());
        assert!(!Clip::new("").has_text());
        assert!(!Clip::new("  \n\t").has_text());
    }

    #[test]
    fn test_clip_builder_collects_unique_tags() {
        let clip = Clip::new("x").with_tag("t1").with_tag("t2").with_tag("t1");
        assert_eq!(clip.tag_ids.len(), 2);
    }

    #[test]
    fn test_same_content_ignores_identity_and_dates() {
        let a = Clip::new("hello").with_tag("t1").with_create_date(Utc::now());
        let mut b = a.clone();
        b.local_id = Some(Uuid::now_v7());
        b.modify_date = Some(Utc::now());
        assert!(a.same_content(&b));

        b.favorite = true;
        assert!(!a.same_content(&b));
    }

    #[test]
    fn test_text_type_detect() {
        assert_eq!(TextType::detect("https://example.com/a?b=c"), TextType::Link);
        assert_eq!(TextType::detect("www.example.com"), TextType::Link);
        assert_eq!(TextType::detect("someone@example.org"), TextType::Link);
        assert_eq!(TextType::detect("<p>Hello</p>"), TextType::Html);
        assert_eq!(TextType::detect("just words, https://x.y inside"), TextType::TextPlain);
        assert_eq!(TextType::detect(""), TextType::TextPlain);
    }

    #[test]
    fn test_text_type_from_name_is_lenient() {
        assert_eq!(TextType::from_name("LINK"), TextType::Link);
        assert_eq!(TextType::from_name("markdown"), TextType::Markdown);
        assert_eq!(TextType::from_name("QRCODE"), TextType::TextPlain);
    }

    #[test]
    fn test_text_type_serializes_screaming_case() {
        let json = serde_json::to_string(&TextType::TextPlain).unwrap();
        assert_eq!(json, "\"TEXT_PLAIN\"");
    }

    #[test]
    fn test_catalog_kind_type_ids() {
        assert_eq!(CatalogKind::from_type_id(7), CatalogKind::Tag);
        assert_eq!(CatalogKind::from_type_id(10), CatalogKind::NamedFilter);
        assert_eq!(CatalogKind::from_type_id(17), CatalogKind::SnippetKit);
        assert_eq!(CatalogKind::from_type_id(2), CatalogKind::System(2));
        assert_eq!(CatalogKind::System(2).type_id(), 2);
    }

    #[test]
    fn test_catalog_entry_roundtrip_keeps_attributes() {
        let mut entry = CatalogEntry::new("f1", "Work", CatalogKind::NamedFilter);
        entry
            .attributes
            .insert("textLike".to_string(), JsonValue::String("todo".into()));
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["kind"], 10);
        let back: CatalogEntry = serde_json::from_value(json).unwrap();
        assert_eq!(back, entry);
    }

    #[test]
    fn test_backup_item_type_from_str() {
        assert_eq!("notes".parse::<BackupItemType>().unwrap(), BackupItemType::Notes);
        assert_eq!(
            "snippet-kits".parse::<BackupItemType>().unwrap(),
            BackupItemType::SnippetKits
        );
        assert!("bogus".parse::<BackupItemType>().is_err());
    }
}
