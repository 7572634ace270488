//! Clipboard manager export organised as named lists of clippings.
//!
//! ```json
//! {"lists": [{"name": "Favorites", "clippings": [
//!     {"title": "...", "timestamp": 1600000000, "contents": "...", "pinned": false}
//! ]}]}
//! ```

use chrono::{DateTime, Utc};
use clipvault_core::{Clip, Error, Result, TextType};
use serde::Deserialize;
use serde_json::Value as JsonValue;

use super::decode_records;
use crate::dates::from_unix_seconds;
use crate::labels::LabelBook;
use crate::processor::{FormatKind, FormatLimits, FormatProcessor, ParsedBackup};
use crate::source::SourceBuffer;

const FORMAT: &str = "clipboard_app";

/// List whose clippings are imported as favorites rather than tagged.
const FAVORITES_LIST: &str = "Favorites";

#[derive(Debug, Deserialize)]
struct ClippingList {
    #[serde(default)]
    name: String,
    #[serde(default)]
    clippings: JsonValue,
}

#[derive(Debug, Deserialize)]
struct Clipping {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    timestamp: Option<i64>,
    contents: String,
    #[serde(default)]
    pinned: bool,
}

#[derive(Debug, Default, Clone)]
pub struct ClipboardAppProcessor {
    limits: FormatLimits,
}

impl ClipboardAppProcessor {
    pub fn new(limits: FormatLimits) -> Self {
        Self { limits }
    }
}

impl FormatProcessor for ClipboardAppProcessor {
    fn kind(&self) -> FormatKind {
        FormatKind::GenericClipboardApp
    }

    fn detect(&self, source: &SourceBuffer) -> bool {
        source
            .json_object()
            .and_then(|obj| obj.get("lists"))
            .is_some_and(JsonValue::is_array)
    }

    fn parse(&self, source: &SourceBuffer, _now: DateTime<Utc>) -> Result<ParsedBackup> {
        let obj = source
            .json_object()
            .ok_or_else(|| Error::InvalidInput("clipboard export is not a JSON object".into()))?;

        let mut labels = LabelBook::new();
        let mut clips = Vec::new();
        for list in decode_records::<ClippingList>(obj.get("lists"), FORMAT) {
            let is_favorites = list.name == FAVORITES_LIST;
            let tag_id = if !is_favorites && self.limits.accepts_tag(&list.name) {
                labels.id_for(&list.name)
            } else {
                None
            };

            for clipping in decode_records::<Clipping>(Some(&list.clippings), FORMAT) {
                let created = clipping.timestamp.and_then(from_unix_seconds);
                let title = clipping
                    .title
                    .filter(|t| *t != clipping.contents)
                    .map(|t| self.limits.truncate_title(&t));

                let mut clip = Clip::new(clipping.contents);
                clip.text_type = TextType::detect(&clip.text);
                clip.title = title;
                clip.favorite = is_favorites || clipping.pinned;
                clip.create_date = created;
                clip.modify_date = created;
                clip.update_date = created;
                if let Some(id) = &tag_id {
                    clip.tag_ids.insert(id.clone());
                }
                clips.push(clip);
            }
        }

        Ok(ParsedBackup {
            clips,
            labels: labels.into_entries(),
            ..Default::default()
        })
    }
}
