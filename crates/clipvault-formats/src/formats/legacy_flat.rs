//! Flat JSON exports: any object carrying a `clips` array.
//!
//! This covers the desktop app's export
//! (`{"source", "version", "exportDate", "clips": [...], "tags": [{"name", "color"}]}`)
//! and hand-made files that follow the same shape. Detection is deliberately
//! loose, so this processor must stay last in the chain.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use clipvault_core::{CatalogEntry, Clip, Error, Result, TextType};
use serde::Deserialize;
use serde_json::Value as JsonValue;

use super::{decode_records, non_blank};
use crate::dates::lenient;
use crate::labels::LabelBook;
use crate::processor::{FormatKind, FormatProcessor, ParsedBackup};
use crate::source::SourceBuffer;

const FORMAT: &str = "legacy_flat";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FlatClip {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default, rename = "type")]
    text_type: Option<String>,
    #[serde(default)]
    create_date: Option<JsonValue>,
    #[serde(default)]
    modify_date: Option<JsonValue>,
    #[serde(default)]
    fav: bool,
    #[serde(default)]
    tags: Vec<JsonValue>,
}

#[derive(Debug, Deserialize)]
struct FlatTag {
    name: String,
    #[serde(default)]
    color: Option<String>,
}

/// Tag references are plain names or `{"name": ...}` objects.
fn tag_name(value: &JsonValue) -> Option<&str> {
    match value {
        JsonValue::String(name) => Some(name),
        JsonValue::Object(obj) => obj.get("name").and_then(JsonValue::as_str),
        _ => None,
    }
}

#[derive(Debug, Default, Clone)]
pub struct LegacyFlatJsonProcessor;

impl LegacyFlatJsonProcessor {
    pub fn new() -> Self {
        Self
    }
}

impl FormatProcessor for LegacyFlatJsonProcessor {
    fn kind(&self) -> FormatKind {
        FormatKind::LegacyFlatJson
    }

    fn detect(&self, source: &SourceBuffer) -> bool {
        source
            .json_object()
            .and_then(|obj| obj.get("clips"))
            .is_some_and(JsonValue::is_array)
    }

    fn parse(&self, source: &SourceBuffer, now: DateTime<Utc>) -> Result<ParsedBackup> {
        let obj = source
            .json_object()
            .ok_or_else(|| Error::InvalidInput("flat export is not a JSON object".into()))?;

        let mut catalog: Vec<CatalogEntry> = Vec::new();
        let mut tag_ids: HashMap<String, String> = HashMap::new();
        for tag in decode_records::<FlatTag>(obj.get("tags"), FORMAT) {
            let name = tag.name.trim();
            if name.is_empty() || tag_ids.contains_key(name) {
                continue;
            }
            let mut entry = CatalogEntry::tag(name);
            entry.color = tag.color;
            tag_ids.insert(name.to_string(), entry.id.clone());
            catalog.push(entry);
        }

        let mut labels = LabelBook::new();
        let clips = decode_records::<FlatClip>(obj.get("clips"), FORMAT)
            .into_iter()
            .map(|flat| {
                let mut clip = Clip::new(flat.text.unwrap_or_default());
                clip.title = non_blank(flat.title);
                clip.text_type = match flat.text_type.as_deref() {
                    Some(name) => TextType::from_name(name),
                    None => TextType::detect(&clip.text),
                };
                clip.create_date = lenient(flat.create_date.as_ref(), now);
                clip.modify_date = lenient(flat.modify_date.as_ref(), now);
                clip.favorite = flat.fav;
                clip.tag_ids = flat
                    .tags
                    .iter()
                    .filter_map(tag_name)
                    .filter_map(|name| {
                        let name = name.trim();
                        tag_ids.get(name).cloned().or_else(|| labels.id_for(name))
                    })
                    .collect();
                clip
            })
            .collect();

        Ok(ParsedBackup {
            clips,
            catalog,
            labels: labels.into_entries(),
            settings: None,
        })
    }
}
