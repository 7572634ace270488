//! Plain notes app export: `{"activeNotes": [{"content", "creationDate", "lastModified", "tags"}]}`.
//!
//! Notes have no title field; the first line of the content acts as one.

use chrono::{DateTime, Utc};
use clipvault_core::{Clip, Error, Result, TextType};
use serde::Deserialize;
use serde_json::Value as JsonValue;

use super::decode_records;
use crate::dates::lenient;
use crate::labels::LabelBook;
use crate::processor::{FormatKind, FormatLimits, FormatProcessor, ParsedBackup};
use crate::source::SourceBuffer;

const FORMAT: &str = "simple_notes";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SimpleNote {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    creation_date: Option<JsonValue>,
    #[serde(default)]
    last_modified: Option<JsonValue>,
    #[serde(default)]
    tags: Vec<String>,
}

/// Split note content into `(title, text)`.
///
/// The first line becomes the title and the remainder, with leading
/// whitespace removed, the text. Single-line notes and notes whose remainder
/// is blank keep the whole content as text.
fn split_title(content: &str) -> (Option<&str>, &str) {
    match content.split_once('\n') {
        Some((first, rest)) if !rest.trim().is_empty() => (Some(first), rest.trim_start()),
        _ => (None, content),
    }
}

#[derive(Debug, Default, Clone)]
pub struct SimpleNotesProcessor {
    limits: FormatLimits,
}

impl SimpleNotesProcessor {
    pub fn new(limits: FormatLimits) -> Self {
        Self { limits }
    }
}

impl FormatProcessor for SimpleNotesProcessor {
    fn kind(&self) -> FormatKind {
        FormatKind::SimpleTextNotesApp
    }

    fn detect(&self, source: &SourceBuffer) -> bool {
        source
            .json_object()
            .and_then(|obj| obj.get("activeNotes"))
            .is_some_and(JsonValue::is_array)
    }

    fn parse(&self, source: &SourceBuffer, now: DateTime<Utc>) -> Result<ParsedBackup> {
        let obj = source
            .json_object()
            .ok_or_else(|| Error::InvalidInput("notes export is not a JSON object".into()))?;

        let mut labels = LabelBook::new();
        let clips = decode_records::<SimpleNote>(obj.get("activeNotes"), FORMAT)
            .into_iter()
            .filter_map(|note| {
                let content = note.content.filter(|c| !c.trim().is_empty())?;
                let (title, text) = split_title(&content);

                let mut clip = Clip::new(text);
                clip.title = title
                    .filter(|t| !t.trim().is_empty())
                    .map(|t| self.limits.truncate_title(t));
                clip.text_type = TextType::detect(text);
                clip.create_date = lenient(note.creation_date.as_ref(), now);
                clip.update_date =
                    lenient(note.last_modified.as_ref(), now).or(clip.create_date);
                clip.modify_date = clip.update_date;
                clip.tag_ids = note
                    .tags
                    .iter()
                    .filter_map(|name| labels.id_for(name))
                    .collect();
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

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn source(value: JsonValue) -> SourceBuffer {
        SourceBuffer::new(serde_json::to_vec(&value).unwrap())
    }

    #[test]
    fn test_split_title() {
        assert_eq!(split_title("Title\n\n  body"), (Some("Title"), "body"));
        assert_eq!(split_title("single line"), (None, "single line"));
        assert_eq!(split_title("Title\n   \n"), (None, "Title\n   \n"));
    }

    #[test]
    fn test_detect() {
        let p = SimpleNotesProcessor::default();
        assert!(p.detect(&source(json!({"activeNotes": [], "trashedNotes": []}))));
        assert!(!p.detect(&source(json!({"notes": []}))));
    }

    #[test]
    fn test_parse() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let src = source(json!({"activeNotes": [
            {"content": "Groceries\nmilk\neggs", "creationDate": "2020-01-02T03:04:05.000Z",
             "lastModified": "2020-02-02T03:04:05.000Z", "tags": ["home", "list"]},
            {"content": "   ", "creationDate": "2020-01-02T03:04:05.000Z"},
            {"content": "one liner", "creationDate": "not a date"}
        ]}));

        let parsed = SimpleNotesProcessor::default().parse(&src, now).unwrap();
        assert_eq!(parsed.clips.len(), 2);
        assert_eq!(parsed.labels.len(), 2);

        let first = &parsed.clips[0];
        assert_eq!(first.title.as_deref(), Some("Groceries"));
        assert_eq!(first.text, "milk\neggs");
        assert_eq!(first.tag_ids.len(), 2);
        assert_eq!(
            first.modify_date,
            Some(Utc.with_ymd_and_hms(2020, 2, 2, 3, 4, 5).unwrap())
        );

        let second = &parsed.clips[1];
        assert!(second.title.is_none());
        assert_eq!(second.text, "one liner");
        assert_eq!(second.create_date, Some(now));
        assert_eq!(second.modify_date, Some(now));
    }
}
