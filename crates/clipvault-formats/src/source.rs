//! Buffered restore source.
//!
//! A restore source is read into memory once. Processors look at it through
//! lazily computed views (text, JSON, gunzipped bytes) that are cached, so a
//! failed detection never consumes or re-parses the input for the next
//! processor in the chain.

use std::fmt;
use std::io::{Cursor, Read};

use clipvault_core::defaults::MAX_INFLATED_BYTES;
use flate2::read::GzDecoder;
use once_cell::sync::OnceCell;
use serde_json::{Map, Value as JsonValue};

/// gzip magic bytes.
const MAGIC_GZIP: [u8; 2] = [0x1f, 0x8b];

/// zip local file header magic.
const MAGIC_ZIP: [u8; 4] = [b'P', b'K', 0x03, 0x04];

const UTF8_BOM: &str = "\u{feff}";

/// Whole restore source held in memory with cached decoded views.
pub struct SourceBuffer {
    name: Option<String>,
    bytes: Vec<u8>,
    max_inflated: u64,
    text: OnceCell<Option<String>>,
    json: OnceCell<Option<JsonValue>>,
    gunzipped: OnceCell<Option<Vec<u8>>>,
    gunzipped_json: OnceCell<Option<JsonValue>>,
}

impl SourceBuffer {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: None,
            bytes: bytes.into(),
            max_inflated: MAX_INFLATED_BYTES,
            text: OnceCell::new(),
            json: OnceCell::new(),
            gunzipped: OnceCell::new(),
            gunzipped_json: OnceCell::new(),
        }
    }

    /// Attach a display name (file name, URI) used in logs.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Cap on how many bytes a compressed view may inflate to.
    pub fn with_max_inflated(mut self, max_inflated: u64) -> Self {
        self.max_inflated = max_inflated;
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn max_inflated(&self) -> u64 {
        self.max_inflated
    }

    /// UTF-8 text view with a leading BOM stripped. `None` if not valid UTF-8.
    pub fn text(&self) -> Option<&str> {
        self.text
            .get_or_init(|| {
                std::str::from_utf8(&self.bytes).ok().map(|s| {
                    s.strip_prefix(UTF8_BOM).unwrap_or(s).to_string()
                })
            })
            .as_deref()
    }

    /// Parsed JSON view. `None` unless the whole text is one JSON document.
    pub fn json(&self) -> Option<&JsonValue> {
        self.json
            .get_or_init(|| self.text().and_then(parse_json_document))
            .as_ref()
    }

    /// The JSON view when it is an object.
    pub fn json_object(&self) -> Option<&Map<String, JsonValue>> {
        self.json().and_then(JsonValue::as_object)
    }

    pub fn is_gzip(&self) -> bool {
        self.bytes.starts_with(&MAGIC_GZIP)
    }

    pub fn is_zip(&self) -> bool {
        self.bytes.starts_with(&MAGIC_ZIP)
    }

    /// Inflated gzip payload, bounded by `max_inflated`.
    pub fn gunzipped(&self) -> Option<&[u8]> {
        self.gunzipped
            .get_or_init(|| {
                if !self.is_gzip() {
                    return None;
                }
                let mut out = Vec::new();
                let decoder = GzDecoder::new(Cursor::new(&self.bytes));
                // One extra byte lets an oversized payload be told apart from an exact fit.
                match decoder.take(self.max_inflated.saturating_add(1)).read_to_end(&mut out) {
                    Ok(n) if (n as u64) <= self.max_inflated => Some(out),
                    Ok(_) => {
                        tracing::debug!(
                            subsystem = "formats",
                            component = "source",
                            max_inflated = self.max_inflated,
                            "gzip payload exceeds inflate limit"
                        );
                        None
                    }
                    Err(_) => None,
                }
            })
            .as_deref()
    }

    /// JSON object inside a gzip payload.
    pub fn gunzipped_json(&self) -> Option<&JsonValue> {
        self.gunzipped_json
            .get_or_init(|| {
                let inflated = self.gunzipped()?;
                let text = std::str::from_utf8(inflated).ok()?;
                parse_json_document(text.strip_prefix(UTF8_BOM).unwrap_or(text))
            })
            .as_ref()
    }
}

impl fmt::Debug for SourceBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceBuffer")
            .field("name", &self.name)
            .field("len", &self.bytes.len())
            .finish()
    }
}

fn parse_json_document(text: &str) -> Option<JsonValue> {
    let trimmed = text.trim_start();
    if !(trimmed.starts_with('{') || trimmed.starts_with('[')) {
        return None;
    }
    serde_json::from_str(trimmed).ok()
}
