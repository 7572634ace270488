//! First-generation native backup.
//!
//! The file is base64 (standard alphabet, line breaks allowed) of a
//! big-endian record stream:
//!
//! ```text
//! i32 count
//! count × {
//!     i64 created, i64 updated, i64 modified   epoch ms, 0 = absent
//!     i32 text_type, i32 usage_count
//!     u8  has_title_and_tags  [i32 len, UTF-8 "title\ntag" or "tag"]
//!     u8  has_text            [i32 len, UTF-8 text]
//! }
//! ```

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use clipvault_core::{Clip, Error, Result, TextType};

use crate::dates::from_unix_millis;
use crate::labels::LabelBook;
use crate::processor::{FormatKind, FormatProcessor, ParsedBackup};
use crate::source::SourceBuffer;

/// Smallest possible encoded record: three dates, two ints, two flags.
const MIN_RECORD_LEN: usize = 3 * 8 + 2 * 4 + 2;

/// Big-endian reader over the decoded stream.
struct RecordReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> RecordReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.data.len())
            .ok_or_else(|| Error::RecordCorrupt(format!("truncated at byte {}", self.pos)))?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn i32(&mut self) -> Result<i32> {
        let mut buf = [0u8; 4];
        buf.copy_from_slice(self.take(4)?);
        Ok(i32::from_be_bytes(buf))
    }

    fn i64(&mut self) -> Result<i64> {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(self.take(8)?);
        Ok(i64::from_be_bytes(buf))
    }

    fn string(&mut self) -> Result<String> {
        let len = self.i32()?;
        let len = usize::try_from(len)
            .map_err(|_| Error::RecordCorrupt(format!("negative length {}", len)))?;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|e| Error::RecordCorrupt(format!("invalid UTF-8: {}", e)))
    }
}

fn read_record(reader: &mut RecordReader<'_>, labels: &mut LabelBook) -> Result<Clip> {
    let mut clip = Clip::default();
    clip.create_date = from_unix_millis(reader.i64()?);
    clip.update_date = from_unix_millis(reader.i64()?);
    clip.modify_date = from_unix_millis(reader.i64()?);
    clip.text_type = TextType::from_id(reader.i32()?);
    clip.usage_count = reader.i32()?.max(0) as u32;

    if reader.u8()? == 1 {
        let title_and_tag = reader.string()?;
        let (title, tag) = match title_and_tag.split_once('\n') {
            Some((title, rest)) => (Some(title), rest.split('\n').next().unwrap_or_default()),
            None => (None, title_and_tag.as_str()),
        };
        clip.title = title.filter(|t| !t.trim().is_empty()).map(str::to_string);
        if let Some(id) = labels.id_for(tag) {
            clip.tag_ids.insert(id);
        }
    }

    if reader.u8()? == 1 {
        clip.text = reader.string()?;
    }
    Ok(clip)
}

fn decode(source: &SourceBuffer) -> Option<Vec<u8>> {
    let text = source.text()?.trim();
    if text.is_empty() || text.starts_with('{') || text.starts_with('[') {
        return None;
    }
    let compact: String = text.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    STANDARD.decode(compact).ok()
}

/// Record count from the header, if it is consistent with the payload size.
fn plausible_count(data: &[u8]) -> Option<usize> {
    let mut reader = RecordReader::new(data);
    let count = usize::try_from(reader.i32().ok()?).ok()?;
    if count.checked_mul(MIN_RECORD_LEN)? > data.len() - 4 {
        return None;
    }
    Some(count)
}

#[derive(Debug, Default, Clone)]
pub struct LegacyV1Processor;

impl LegacyV1Processor {
    pub fn new() -> Self {
        Self
    }
}

impl FormatProcessor for LegacyV1Processor {
    fn kind(&self) -> FormatKind {
        FormatKind::NativeLegacyV1
    }

    fn detect(&self, source: &SourceBuffer) -> bool {
        let Some(data) = decode(source) else {
            return false;
        };
        match plausible_count(&data) {
            Some(0) => data.len() == 4,
            Some(_) => {
                let mut reader = RecordReader { data: &data, pos: 4 };
                read_record(&mut reader, &mut LabelBook::new()).is_ok()
            }
            None => false,
        }
    }

    fn parse(&self, source: &SourceBuffer, _now: DateTime<Utc>) -> Result<ParsedBackup> {
        let data = decode(source)
            .ok_or_else(|| Error::InvalidInput("legacy backup is not valid base64".into()))?;
        let mut reader = RecordReader::new(&data);
        let count = usize::try_from(reader.i32()?)
            .map_err(|_| Error::InvalidInput("negative record count".into()))?;

        let mut labels = LabelBook::new();
        let mut clips = Vec::with_capacity(count.min(data.len() / MIN_RECORD_LEN));
        for index in 0..count {
            match read_record(&mut reader, &mut labels) {
                Ok(clip) => clips.push(clip),
                Err(e) if !e.is_terminal() => {
                    tracing::debug!(
                        subsystem = "formats",
                        format = "legacy_v1",
                        index,
                        expected = count,
                        error = %e,
                        "Legacy stream ended early, keeping earlier records"
                    );
                    break;
                }
                Err(e) => return Err(e),
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

    /// Encode records the way the legacy app wrote them.
    pub(crate) struct LegacyWriter {
        buf: Vec<u8>,
    }

    impl LegacyWriter {
        pub(crate) fn new(count: i32) -> Self {
            Self {
                buf: count.to_be_bytes().to_vec(),
            }
        }

        pub(crate) fn record(
            mut self,
            created_ms: i64,
            title_and_tag: Option<&str>,
            text: Option<&str>,
        ) -> Self {
            self.buf.extend_from_slice(&created_ms.to_be_bytes());
            self.buf.extend_from_slice(&0i64.to_be_bytes());
            self.buf.extend_from_slice(&created_ms.to_be_bytes());
            self.buf.extend_from_slice(&1i32.to_be_bytes());
            self.buf.extend_from_slice(&3i32.to_be_bytes());
            for part in [title_and_tag, text] {
                match part {
                    Some(s) => {
                        self.buf.push(1);
                        self.buf.extend_from_slice(&(s.len() as i32).to_be_bytes());
                        self.buf.extend_from_slice(s.as_bytes());
                    }
                    None => self.buf.push(0),
                }
            }
            self
        }

        pub(crate) fn raw(mut self, bytes: &[u8]) -> Self {
            self.buf.extend_from_slice(bytes);
            self
        }

        pub(crate) fn encode(self) -> Vec<u8> {
            // Line-wrapped like the original writer.
            let encoded = STANDARD.encode(self.buf);
            encoded
                .as_bytes()
                .chunks(76)
                .map(|c| std::str::from_utf8(c).unwrap())
                .collect::<Vec<_>>()
                .join("\n")
                .into_bytes()
        }
    }

    #[test]
    fn test_detect_and_parse() {
        let bytes = LegacyWriter::new(2)
            .record(1_500_000_000_000, Some("Title\nWork"), Some("first"))
            .record(0, Some("Home"), Some("second"))
            .encode();
        let src = SourceBuffer::new(bytes);
        let p = LegacyV1Processor::new();
        assert!(p.detect(&src));

        let parsed = p.parse(&src, Utc::now()).unwrap();
        assert_eq!(parsed.clips.len(), 2);
        assert_eq!(parsed.labels.len(), 2);

        let first = &parsed.clips[0];
        assert_eq!(first.text, "first");
        assert_eq!(first.title.as_deref(), Some("Title"));
        assert_eq!(first.text_type, TextType::Link);
        assert_eq!(first.usage_count, 3);
        assert_eq!(first.create_date.unwrap().timestamp_millis(), 1_500_000_000_000);
        assert!(first.update_date.is_none());

        let second = &parsed.clips[1];
        assert!(second.title.is_none());
        assert!(second.create_date.is_none());
        assert_eq!(second.tag_ids.len(), 1);
    }

    #[test]
    fn test_truncated_stream_keeps_earlier_records() {
        let bytes = LegacyWriter::new(3)
            .record(1, None, Some("kept"))
            .record(2, None, Some("also kept"))
            .raw(&[0, 0, 0])
            .encode();
        let src = SourceBuffer::new(bytes);
        let parsed = LegacyV1Processor::new().parse(&src, Utc::now()).unwrap();
        let texts: Vec<_> = parsed.clips.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["kept", "also kept"]);
    }

    #[test]
    fn test_detect_rejects_other_content() {
        let p = LegacyV1Processor::new();
        assert!(!p.detect(&SourceBuffer::new(b"{\"clips\": []}".to_vec())));
        assert!(!p.detect(&SourceBuffer::new(b"Tue Mar 05 14:02:11 GMT 2024\nhi".to_vec())));
        // Valid base64 whose header claims far more records than it holds.
        let bogus = STANDARD.encode([0x7f, 0xff, 0xff, 0xff, 1, 2, 3, 4]);
        assert!(!p.detect(&SourceBuffer::new(bogus.into_bytes())));
    }

    #[test]
    fn test_detect_empty_stream() {
        let src = SourceBuffer::new(LegacyWriter::new(0).encode());
        assert!(LegacyV1Processor::new().detect(&src));
        assert!(LegacyV1Processor::new().parse(&src, Utc::now()).unwrap().is_empty());
    }
}
