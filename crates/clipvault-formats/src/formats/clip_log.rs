//! Plain-text clip history.
//!
//! Each clip starts with a header line holding its capture date
//! (`EEE MMM dd HH:mm:ss zzz yyyy`), optionally followed by `☆★☆` when the
//! clip was starred. The lines up to the next header are the clip's text.

use chrono::{DateTime, Utc};
use clipvault_core::{Clip, Error, Result, TextType};

use crate::dates::parse_clip_log_header;
use crate::processor::{FormatKind, FormatProcessor, ParsedBackup};
use crate::source::SourceBuffer;

const FAVORITE_MARK: &str = "☆★☆";

/// Header date and favorite flag, if `line` is a header.
fn parse_header(line: &str) -> Option<(DateTime<Utc>, bool)> {
    let (date, favorite) = match line.trim_end().strip_suffix(FAVORITE_MARK) {
        Some(rest) => (rest, true),
        None => (line, false),
    };
    parse_clip_log_header(date).map(|d| (d, favorite))
}

struct PendingClip {
    created: DateTime<Utc>,
    favorite: bool,
    lines: Vec<String>,
}

impl PendingClip {
    fn finish(self) -> Option<Clip> {
        if self.lines.is_empty() {
            return None;
        }
        let text = self.lines.join("\n");
        let text = text.trim_end_matches(['\n', '\r']);
        let mut clip = Clip::new(text);
        clip.text_type = TextType::detect(text);
        clip.favorite = self.favorite;
        clip.create_date = Some(self.created);
        Some(clip)
    }
}

#[derive(Debug, Default, Clone)]
pub struct ClipLogProcessor;

impl ClipLogProcessor {
    pub fn new() -> Self {
        Self
    }
}

impl FormatProcessor for ClipLogProcessor {
    fn kind(&self) -> FormatKind {
        FormatKind::ClipLog
    }

    fn detect(&self, source: &SourceBuffer) -> bool {
        source
            .text()
            .and_then(|text| text.lines().find(|l| !l.trim().is_empty()))
            .is_some_and(|first| parse_header(first).is_some())
    }

    fn parse(&self, source: &SourceBuffer, _now: DateTime<Utc>) -> Result<ParsedBackup> {
        let text = source
            .text()
            .ok_or_else(|| Error::InvalidInput("clip log is not UTF-8 text".into()))?;

        let mut clips = Vec::new();
        let mut pending: Option<PendingClip> = None;
        for line in text.lines() {
            if let Some((created, favorite)) = parse_header(line) {
                if let Some(clip) = pending.take().and_then(PendingClip::finish) {
                    clips.push(clip);
                }
                pending = Some(PendingClip {
                    created,
                    favorite,
                    lines: Vec::new(),
                });
            } else if let Some(current) = pending.as_mut() {
                current.lines.push(line.to_string());
            }
        }
        if let Some(clip) = pending.and_then(PendingClip::finish) {
            clips.push(clip);
        }

        Ok(ParsedBackup {
            clips,
            ..Default::default()
        })
    }
}
