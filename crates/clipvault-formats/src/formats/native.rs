//! Current native backup format.
//!
//! ```json
//! {
//!   "created": "2024-03-05T14:02:11",
//!   "settings": { ... },
//!   "notes":   [{ "uid": "...", "text": "...", "tagIds": ["..."], "fav": true, ... }],
//!   "filters": [{ "uid": "...", "name": "Work", "type": 7, "color": "#ff0000", ... }]
//! }
//! ```
//!
//! Dates are written as `%Y-%m-%dT%H:%M:%S` in UTC. Filters carry many view
//! attributes that clipvault does not interpret; they are kept verbatim so a
//! backup round-trips.

use std::collections::{BTreeSet, HashSet};

use chrono::{DateTime, Utc};
use clipvault_core::{
    BackupItemType, BackupStats, CatalogEntry, CatalogKind, Clip, Error, Result, Settings,
    TextType,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use uuid::Uuid;

use super::{decode_records, non_blank};
use crate::dates::{format_native, lenient};
use crate::labels::LabelBook;
use crate::processor::{ExportOutput, ExportSnapshot, FormatKind, FormatProcessor, ParsedBackup};
use crate::source::SourceBuffer;

const FORMAT: &str = "native";

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NativeNote {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    created: Option<JsonValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    updated: Option<JsonValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    modified: Option<JsonValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    deleted: Option<JsonValue>,
    #[serde(default, rename = "type")]
    text_type: Option<JsonValue>,
    /// Tag names written by old versions before `tagIds` existed.
    #[serde(default, skip_serializing)]
    tags: Option<Vec<String>>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    used: Option<i64>,
    #[serde(default)]
    tracked: bool,
    #[serde(default)]
    fav: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    platform: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    file_ids: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tag_ids: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    snippet_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    snippet_sets_ids: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    abbreviation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    uid: Option<String>,
}

impl NativeNote {
    fn into_clip(self, now: DateTime<Utc>, labels: &mut LabelBook) -> Clip {
        let text_type = match &self.text_type {
            Some(JsonValue::String(name)) => TextType::from_name(name),
            Some(JsonValue::Number(n)) => TextType::from_id(n.as_i64().unwrap_or(0) as i32),
            _ => TextType::TextPlain,
        };

        let mut tag_ids: BTreeSet<String> = self.tag_ids.unwrap_or_default().into_iter().collect();
        let named: BTreeSet<String> = self
            .tags
            .unwrap_or_default()
            .iter()
            .filter_map(|name| labels.id_for(name))
            .collect();
        if !named.is_empty() {
            tag_ids = named;
        }

        Clip {
            local_id: None,
            remote_id: non_blank(self.uid),
            text: self.text.unwrap_or_default(),
            title: self.title,
            tag_ids,
            snippet_kit_ids: self.snippet_sets_ids.unwrap_or_default().into_iter().collect(),
            favorite: self.fav,
            create_date: lenient(self.created.as_ref(), now),
            modify_date: lenient(self.modified.as_ref(), now),
            update_date: lenient(self.updated.as_ref(), now),
            deleted_at: lenient(self.deleted.as_ref(), now),
            text_type,
            usage_count: self.used.unwrap_or(0).clamp(0, u32::MAX as i64) as u32,
            tracked: self.tracked,
            platform: self.platform,
            file_ids: self.file_ids.unwrap_or_default(),
            snippet_id: self.snippet_id,
            abbreviation: self.abbreviation,
            description: self.description,
        }
    }

    fn from_clip(clip: &Clip) -> Self {
        Self {
            created: clip.create_date.as_ref().map(date_value),
            updated: clip.update_date.as_ref().map(date_value),
            modified: clip.modify_date.as_ref().map(date_value),
            deleted: clip.deleted_at.as_ref().map(date_value),
            text_type: Some(JsonValue::String(clip.text_type.as_str().to_string())),
            tags: None,
            title: clip.title.clone(),
            text: Some(clip.text.clone()),
            used: Some(clip.usage_count as i64),
            tracked: clip.tracked,
            fav: clip.favorite,
            platform: clip.platform.clone(),
            file_ids: non_empty_vec(clip.file_ids.clone()),
            tag_ids: non_empty_vec(clip.tag_ids.iter().cloned().collect()),
            snippet_id: clip.snippet_id.clone(),
            snippet_sets_ids: non_empty_vec(clip.snippet_kit_ids.iter().cloned().collect()),
            abbreviation: clip.abbreviation.clone(),
            description: clip.description.clone(),
            uid: clip.remote_id.clone(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct NativeFilter {
    #[serde(default)]
    uid: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default = "default_filter_type", rename = "type")]
    filter_type: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    created: Option<JsonValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    updated: Option<JsonValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    color: Option<String>,
    #[serde(flatten)]
    rest: Map<String, JsonValue>,
}

fn default_filter_type() -> i32 {
    CatalogKind::Tag.type_id()
}

impl NativeFilter {
    /// `None` for filters without a name.
    fn into_entry(self, now: DateTime<Utc>) -> Option<CatalogEntry> {
        let name = non_blank(self.name)?;
        let id = non_blank(self.uid).unwrap_or_else(|| Uuid::now_v7().to_string());
        Some(CatalogEntry {
            id,
            name,
            kind: CatalogKind::from_type_id(self.filter_type),
            color: self.color,
            created: lenient(self.created.as_ref(), now),
            updated: lenient(self.updated.as_ref(), now),
            attributes: self.rest,
        })
    }

    fn from_entry(entry: &CatalogEntry) -> Self {
        Self {
            uid: Some(entry.id.clone()),
            name: Some(entry.name.clone()),
            filter_type: entry.kind.type_id(),
            created: entry.created.as_ref().map(date_value),
            updated: entry.updated.as_ref().map(date_value),
            color: entry.color.clone(),
            rest: entry.attributes.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
struct NativeBackupOut {
    created: JsonValue,
    #[serde(skip_serializing_if = "Option::is_none")]
    settings: Option<Settings>,
    notes: Vec<NativeNote>,
    filters: Vec<NativeFilter>,
}

fn date_value(date: &DateTime<Utc>) -> JsonValue {
    JsonValue::String(format_native(date))
}

fn non_empty_vec(v: Vec<String>) -> Option<Vec<String>> {
    if v.is_empty() {
        None
    } else {
        Some(v)
    }
}

/// Reads and writes the native JSON backup.
#[derive(Debug, Default, Clone)]
pub struct NativeProcessor;

impl NativeProcessor {
    pub fn new() -> Self {
        Self
    }
}

impl FormatProcessor for NativeProcessor {
    fn kind(&self) -> FormatKind {
        FormatKind::NativeCurrent
    }

    fn detect(&self, source: &SourceBuffer) -> bool {
        let Some(obj) = source.json_object() else {
            return false;
        };
        obj.get("notes").is_some_and(JsonValue::is_array)
            || obj.get("filters").is_some_and(JsonValue::is_array)
            || obj.get("settings").is_some_and(JsonValue::is_object)
    }

    fn parse(&self, source: &SourceBuffer, now: DateTime<Utc>) -> Result<ParsedBackup> {
        let obj = source
            .json_object()
            .ok_or_else(|| Error::InvalidInput("native backup is not a JSON object".into()))?;

        let mut labels = LabelBook::new();
        let clips = decode_records::<NativeNote>(obj.get("notes"), FORMAT)
            .into_iter()
            .map(|note| note.into_clip(now, &mut labels))
            .collect();
        let catalog = decode_records::<NativeFilter>(obj.get("filters"), FORMAT)
            .into_iter()
            .filter_map(|filter| filter.into_entry(now))
            .collect();
        let settings = obj
            .get("settings")
            .and_then(JsonValue::as_object)
            .map(|m| Settings(m.clone()));

        Ok(ParsedBackup {
            clips,
            catalog,
            labels: labels.into_entries(),
            settings,
        })
    }

    fn supports_export(&self) -> bool {
        true
    }

    fn serialize(
        &self,
        snapshot: &ExportSnapshot,
        selection: &[BackupItemType],
        now: DateTime<Utc>,
    ) -> Result<ExportOutput> {
        let with = |item: BackupItemType| selection.contains(&item);
        let with_notes = with(BackupItemType::Notes);
        let with_kits = with(BackupItemType::SnippetKits);

        let clips: Vec<&Clip> = snapshot
            .clips
            .iter()
            .filter(|c| with_notes || (with_kits && !c.snippet_kit_ids.is_empty()))
            .collect();

        let referenced_tags: HashSet<&str> = clips
            .iter()
            .flat_map(|c| c.tag_ids.iter().map(String::as_str))
            .collect();
        let referenced_kits: HashSet<&str> = clips
            .iter()
            .flat_map(|c| c.snippet_kit_ids.iter().map(String::as_str))
            .collect();

        let mut tags: Vec<&CatalogEntry> = snapshot
            .catalog
            .iter()
            .filter(|e| e.is_tag())
            .filter(|e| with(BackupItemType::Tags) || referenced_tags.contains(e.id.as_str()))
            .collect();
        tags.sort_by(|a, b| a.name.cmp(&b.name));

        let named_filters: Vec<&CatalogEntry> = if with(BackupItemType::Filters) {
            snapshot.catalog.iter().filter(|e| e.is_named_filter()).collect()
        } else {
            Vec::new()
        };

        let mut kits: Vec<&CatalogEntry> = snapshot
            .catalog
            .iter()
            .filter(|e| e.is_snippet_kit())
            .filter(|e| with_kits || referenced_kits.contains(e.id.as_str()))
            .collect();
        kits.sort_by(|a, b| a.name.cmp(&b.name));

        let settings = if with(BackupItemType::Settings) {
            snapshot.settings.clone()
        } else {
            None
        };

        let stats = BackupStats {
            notes: clips.len(),
            tags: tags.len(),
            filters: named_filters.len(),
            snippet_kits: kits.len(),
            settings: settings.is_some(),
            failed: 0,
            clips: Vec::new(),
        };

        let backup = NativeBackupOut {
            created: date_value(&now),
            settings,
            notes: clips.iter().map(|c| NativeNote::from_clip(c)).collect(),
            filters: tags
                .iter()
                .chain(named_filters.iter())
                .chain(kits.iter())
                .map(|e| NativeFilter::from_entry(e))
                .collect(),
        };
        let bytes = serde_json::to_vec(&backup)?;

        Ok(ExportOutput { bytes, stats })
    }
}
