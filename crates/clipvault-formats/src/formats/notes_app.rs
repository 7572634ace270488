//! Notes app takeout: a zip archive holding one JSON file per note.
//!
//! Only the JSON notes are read. Attachments and the HTML renderings that sit
//! next to them in the archive are ignored.

use std::io::{Cursor, Read};

use chrono::{DateTime, Utc};
use clipvault_core::{Clip, Error, Result, TextType};
use serde::Deserialize;
use zip::ZipArchive;

use super::non_blank;
use crate::dates::from_unix_micros;
use crate::labels::LabelBook;
use crate::processor::{FormatKind, FormatLimits, FormatProcessor, ParsedBackup};
use crate::source::SourceBuffer;

const FORMAT: &str = "notes_app";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KeepNote {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    text_content: Option<String>,
    #[serde(default)]
    list_content: Vec<ListItem>,
    #[serde(default)]
    is_pinned: bool,
    #[serde(default)]
    is_trashed: bool,
    #[serde(default)]
    user_edited_timestamp_usec: i64,
    #[serde(default)]
    created_timestamp_usec: i64,
    #[serde(default)]
    labels: Vec<Label>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListItem {
    #[serde(default)]
    text: String,
    #[serde(default)]
    is_checked: bool,
}

#[derive(Debug, Deserialize)]
struct Label {
    name: String,
}

impl KeepNote {
    fn body(&self) -> String {
        if let Some(text) = self.text_content.as_ref().filter(|t| !t.trim().is_empty()) {
            return text.clone();
        }
        self.list_content
            .iter()
            .map(|item| {
                let mark = if item.is_checked { "[x]" } else { "[ ]" };
                format!("{} {}", mark, item.text)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn into_clip(self, now: DateTime<Utc>, limits: &FormatLimits, labels: &mut LabelBook) -> Clip {
        let edited = from_unix_micros(self.user_edited_timestamp_usec);
        let created = from_unix_micros(self.created_timestamp_usec).or(edited);

        let mut clip = Clip::new(self.body());
        clip.text_type = TextType::detect(&clip.text);
        clip.title = non_blank(self.title).map(|t| limits.truncate_title(&t));
        clip.favorite = self.is_pinned;
        clip.create_date = created;
        clip.modify_date = edited.or(created);
        clip.update_date = clip.modify_date;
        if self.is_trashed {
            clip.deleted_at = Some(edited.unwrap_or(now));
        }
        clip.tag_ids = self
            .labels
            .iter()
            .filter_map(|label| labels.id_for(&label.name))
            .collect();
        clip
    }
}

fn is_note_entry(name: &str) -> bool {
    name.to_ascii_lowercase().ends_with(".json")
}

#[derive(Debug, Default, Clone)]
pub struct NotesAppProcessor {
    limits: FormatLimits,
}

impl NotesAppProcessor {
    pub fn new(limits: FormatLimits) -> Self {
        Self { limits }
    }
}

impl FormatProcessor for NotesAppProcessor {
    fn kind(&self) -> FormatKind {
        FormatKind::NotesApp
    }

    fn detect(&self, source: &SourceBuffer) -> bool {
        if !source.is_zip() {
            return false;
        }
        let Ok(archive) = ZipArchive::new(Cursor::new(source.bytes())) else {
            return false;
        };
        let found = archive.file_names().any(is_note_entry);
        found
    }

    fn parse(&self, source: &SourceBuffer, now: DateTime<Utc>) -> Result<ParsedBackup> {
        let mut archive = ZipArchive::new(Cursor::new(source.bytes()))
            .map_err(|e| Error::InvalidInput(format!("notes archive unreadable: {}", e)))?;

        let mut budget = source.max_inflated();
        let mut labels = LabelBook::new();
        let mut clips = Vec::new();

        for index in 0..archive.len() {
            let mut entry = match archive.by_index(index) {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::trace!(
                        subsystem = "formats",
                        format = FORMAT,
                        index,
                        error = %e,
                        "Skipping unreadable entry"
                    );
                    continue;
                }
            };
            if entry.is_dir() || !is_note_entry(entry.name()) {
                continue;
            }

            let mut raw = Vec::new();
            let mut limited = entry.by_ref().take(budget.saturating_add(1));
            if let Err(e) = limited.read_to_end(&mut raw) {
                tracing::trace!(
                    subsystem = "formats",
                    format = FORMAT,
                    index,
                    error = %e,
                    "Skipping unreadable entry"
                );
                continue;
            }
            if raw.len() as u64 > budget {
                tracing::warn!(
                    subsystem = "formats",
                    format = FORMAT,
                    limit = source.max_inflated(),
                    "Archive exceeds inflate limit, ignoring remaining notes"
                );
                break;
            }
            budget -= raw.len() as u64;

            match serde_json::from_slice::<KeepNote>(&raw) {
                Ok(note) => clips.push(note.into_clip(now, &self.limits, &mut labels)),
                Err(e) => {
                    tracing::trace!(
                        subsystem = "formats",
                        format = FORMAT,
                        entry = entry.name(),
                        error = %e,
                        "Skipping corrupt note"
                    );
                }
            }
        }

        Ok(ParsedBackup {
            clips,
            labels: labels.into_entries(),
            ..Default::default()
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    pub(crate) fn build_zip(entries: &[(&str, Vec<u8>)]) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, data) in entries {
            writer
                .start_file(name.to_string(), SimpleFileOptions::default())
                .unwrap();
            writer.write_all(data).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_detect() {
        let p = NotesAppProcessor::default();
        let with_note = build_zip(&[("Takeout/Keep/a.json", b"{}".to_vec())]);
        assert!(p.detect(&SourceBuffer::new(with_note)));

        let without_note = build_zip(&[("Takeout/Keep/a.html", b"<p/>".to_vec())]);
        assert!(!p.detect(&SourceBuffer::new(without_note)));

        assert!(!p.detect(&SourceBuffer::new(b"PK\x03\x04garbage".to_vec())));
    }

    #[test]
    fn test_parse() {
        let text_note = json!({
            "title": "Shopping",
            "textContent": "milk",
            "isPinned": true,
            "isTrashed": false,
            "userEditedTimestampUsec": 1_600_000_000_000_000i64,
            "labels": [{"name": "Home"}]
        });
        let list_note = json!({
            "title": "",
            "listContent": [{"text": "one", "isChecked": true}, {"text": "two", "isChecked": false}],
            "isTrashed": true,
            "userEditedTimestampUsec": 1_600_000_000_000_000i64
        });
        let zip = build_zip(&[
            ("Keep/a.json", serde_json::to_vec(&text_note).unwrap()),
            ("Keep/a.html", b"<p>milk</p>".to_vec()),
            ("Keep/b.json", serde_json::to_vec(&list_note).unwrap()),
            ("Keep/broken.json", b"{not json".to_vec()),
        ]);

        let parsed = NotesAppProcessor::default()
            .parse(&SourceBuffer::new(zip), Utc::now())
            .unwrap();
        assert_eq!(parsed.clips.len(), 2);
        assert_eq!(parsed.labels.len(), 1);

        let first = &parsed.clips[0];
        assert_eq!(first.text, "milk");
        assert_eq!(first.title.as_deref(), Some("Shopping"));
        assert!(first.favorite);
        assert!(!first.deleted());
        assert_eq!(first.create_date.unwrap().timestamp(), 1_600_000_000);

        let second = &parsed.clips[1];
        assert_eq!(second.text, "[x] one\n[ ] two");
        assert!(second.title.is_none());
        assert!(second.deleted());
    }

    #[test]
    fn test_parse_respects_inflate_limit() {
        let note = serde_json::to_vec(&json!({"textContent": "x".repeat(512)})).unwrap();
        let zip = build_zip(&[("a.json", note.clone()), ("b.json", note)]);
        let src = SourceBuffer::new(zip).with_max_inflated(700);
        let parsed = NotesAppProcessor::default().parse(&src, Utc::now()).unwrap();
        assert_eq!(parsed.clips.len(), 1);
    }
}
