//! gzip-compressed sticky notes export.
//!
//! ```json
//! {"category": [{"_id": 1, "name": "Ideas"}],
//!  "note": [{"category_id": 1, "title": "...", "body": "...", "is_favorite": 1,
//!            "created_datetime": "2019-04-01 10:00:00"}]}
//! ```

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use clipvault_core::{Clip, Error, Result, TextType};
use serde::Deserialize;
use serde_json::Value as JsonValue;

use super::decode_records;
use crate::dates::lenient;
use crate::labels::LabelBook;
use crate::processor::{FormatKind, FormatLimits, FormatProcessor, ParsedBackup};
use crate::source::SourceBuffer;

const FORMAT: &str = "sticky_notes";

#[derive(Debug, Deserialize)]
struct Category {
    #[serde(rename = "_id")]
    id: i64,
    name: String,
}

#[derive(Debug, Deserialize)]
struct StickyNote {
    #[serde(default)]
    category_id: i64,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    is_favorite: i64,
    #[serde(default)]
    created_datetime: Option<JsonValue>,
}

#[derive(Debug, Default, Clone)]
pub struct StickyNotesProcessor {
    limits: FormatLimits,
}

impl StickyNotesProcessor {
    pub fn new(limits: FormatLimits) -> Self {
        Self { limits }
    }
}

impl FormatProcessor for StickyNotesProcessor {
    fn kind(&self) -> FormatKind {
        FormatKind::StickyNotesApp
    }

    fn detect(&self, source: &SourceBuffer) -> bool {
        source.is_gzip()
            && source
                .gunzipped_json()
                .and_then(|v| v.get("note"))
                .is_some_and(JsonValue::is_array)
    }

    fn parse(&self, source: &SourceBuffer, now: DateTime<Utc>) -> Result<ParsedBackup> {
        let root = source
            .gunzipped_json()
            .ok_or_else(|| Error::InvalidInput("sticky notes export is not gzip JSON".into()))?;

        let categories: HashMap<i64, String> = decode_records::<Category>(root.get("category"), FORMAT)
            .into_iter()
            .map(|c| (c.id, c.name))
            .collect();

        let mut labels = LabelBook::new();
        let clips = decode_records::<StickyNote>(root.get("note"), FORMAT)
            .into_iter()
            .filter_map(|note| {
                let text = note.body.or_else(|| note.title.clone())?;
                let created = lenient(note.created_datetime.as_ref(), now);

                let mut clip = Clip::new(text);
                clip.text_type = TextType::detect(&clip.text);
                clip.title = note.title.map(|t| self.limits.truncate_title(&t));
                clip.favorite = note.is_favorite == 1;
                clip.create_date = created;
                clip.modify_date = created;
                clip.update_date = created;
                if let Some(id) = categories
                    .get(&note.category_id)
                    .and_then(|name| labels.id_for(name))
                {
                    clip.tag_ids.insert(id);
                }
                Some(clip)
            })
            .collect();

        Ok(ParsedBackup {
            clips,
            labels: labels.into_entries(),
            ..Default::default()
        })
    }
}
