//! One module per supported backup dialect.

use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;

pub mod clip_log;
pub mod clipboard_app;
pub mod legacy_flat;
pub mod legacy_v1;
pub mod native;
pub mod notes_app;
pub mod simple_notes;
pub mod sticky_notes;

pub use clip_log::ClipLogProcessor;
pub use clipboard_app::ClipboardAppProcessor;
pub use legacy_flat::LegacyFlatJsonProcessor;
pub use legacy_v1::LegacyV1Processor;
pub use native::NativeProcessor;
pub use notes_app::NotesAppProcessor;
pub use simple_notes::SimpleNotesProcessor;
pub use sticky_notes::StickyNotesProcessor;

/// Decode every element of a JSON array independently, skipping the ones
/// that do not fit `T`.
pub(crate) fn decode_records<T: DeserializeOwned>(
    array: Option<&JsonValue>,
    format: &'static str,
) -> Vec<T> {
    let Some(items) = array.and_then(JsonValue::as_array) else {
        return Vec::new();
    };
    items
        .iter()
        .enumerate()
        .filter_map(|(idx, item)| match T::deserialize(item) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::trace!(
                    subsystem = "formats",
                    format,
                    index = idx,
                    error = %e,
                    "Skipping corrupt record"
                );
                None
            }
        })
        .collect()
}

/// `None` for absent or whitespace-only strings.
pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}
