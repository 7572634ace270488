//! Integration tests for the detection chain.
//!
//! This test suite validates:
//! - Every supported dialect is routed to its processor
//! - Chain order decides between overlapping detectors
//! - Unrecognized sources fail without a partial result
//! - A native export restores through the same chain

use std::io::{Cursor, Write};

use chrono::{TimeZone, Utc};
use clipvault_core::{BackupItemType, CatalogEntry, CatalogKind, Clip, Error};
use clipvault_formats::{
    ExportSnapshot, FormatKind, FormatLimits, FormatProcessor, LegacyFlatJsonProcessor,
    ProcessorRegistry, SourceBuffer,
};
use flate2::write::GzEncoder;
use flate2::Compression;
use serde_json::json;

fn json_source(value: serde_json::Value) -> SourceBuffer {
    SourceBuffer::new(serde_json::to_vec(&value).unwrap())
}

fn gzip(bytes: &[u8]) -> Vec<u8> {
    let mut enc = GzEncoder::new(Vec::new(), Compression::default());
    enc.write_all(bytes).unwrap();
    enc.finish().unwrap()
}

fn zip_archive(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, data) in entries {
        writer
            .start_file(name.to_string(), zip::write::SimpleFileOptions::default())
            .unwrap();
        writer.write_all(data).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

// ============================================================================
// Routing
// ============================================================================

#[test]
fn test_sticky_notes_routed_after_json_formats() {
    let registry = ProcessorRegistry::default();
    let payload = json!({
        "category": [{"_id": 3, "name": "Recipes"}],
        "note": [{"category_id": 3, "title": "Soup", "body": "water, salt"}]
    });
    let source = SourceBuffer::new(gzip(&serde_json::to_vec(&payload).unwrap()))
        .with_name("notes.backup");

    let (kind, parsed) = registry.restore(source, Utc::now()).unwrap();
    assert_eq!(kind, FormatKind::StickyNotesApp);
    assert_eq!(parsed.clips.len(), 1);
    assert_eq!(parsed.labels[0].name, "Recipes");
}

#[test]
fn test_notes_app_archive() {
    let note = serde_json::to_vec(&json!({
        "title": "Trip",
        "textContent": "passport",
        "labels": [{"name": "Travel"}],
        "userEditedTimestampUsec": 1_700_000_000_000_000i64
    }))
    .unwrap();
    let archive = zip_archive(&[
        ("Takeout/Keep/Trip.json", note.as_slice()),
        ("Takeout/Keep/Trip.html", &b"<p/>"[..]),
    ]);

    let (kind, parsed) = ProcessorRegistry::default()
        .restore(SourceBuffer::new(archive), Utc::now())
        .unwrap();
    assert_eq!(kind, FormatKind::NotesApp);
    assert_eq!(parsed.stats().notes, 1);
}

#[test]
fn test_clip_log_is_not_mistaken_for_legacy_base64() {
    let log = "Mon Jan 01 00:00:00 UTC 2024\nAAAA\n";
    let (kind, parsed) = ProcessorRegistry::default()
        .restore(SourceBuffer::new(log.as_bytes().to_vec()), Utc::now())
        .unwrap();
    assert_eq!(kind, FormatKind::ClipLog);
    assert_eq!(parsed.clips[0].text, "AAAA");
}

#[test]
fn test_flat_json_is_last_resort() {
    let registry = ProcessorRegistry::default();
    let flat = json!({"source": "desktop", "clips": [{"text": "a"}], "tags": []});
    assert_eq!(
        registry.detect(json_source(flat)).unwrap().kind(),
        FormatKind::LegacyFlatJson
    );

    let simple = json!({"activeNotes": [{"content": "x"}], "clips": [{"text": "a"}]});
    assert_eq!(
        registry.detect(json_source(simple)).unwrap().kind(),
        FormatKind::SimpleTextNotesApp
    );
}

#[test]
fn test_unrecognized_source() {
    let registry = ProcessorRegistry::default();
    let result = registry.restore(json_source(json!({"items": [1, 2, 3]})), Utc::now());
    assert!(matches!(result, Err(Error::FormatUnrecognized)));

    let result = registry.restore(SourceBuffer::new(gzip(b"not json")), Utc::now());
    assert!(matches!(result, Err(Error::FormatUnrecognized)));
}

// ============================================================================
// Native export through the chain
// ============================================================================

#[test]
fn test_native_export_restores_through_chain() {
    let registry = ProcessorRegistry::standard(FormatLimits::default());
    let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
    let snapshot = ExportSnapshot {
        clips: vec![
            Clip::new("alpha").with_tag("t1").with_favorite(true),
            Clip::new("beta").with_remote_id("remote-b"),
        ],
        catalog: vec![CatalogEntry::new("t1", "Work", CatalogKind::Tag)],
        settings: None,
    };

    let exporter = registry.exporter().unwrap();
    let out = exporter
        .serialize(&snapshot, &[BackupItemType::Notes, BackupItemType::Tags], now)
        .unwrap();
    assert_eq!(out.stats.notes, 2);
    assert_eq!(out.stats.tags, 1);

    let (kind, parsed) = registry
        .restore(SourceBuffer::new(out.bytes), now)
        .unwrap();
    assert_eq!(kind, FormatKind::NativeCurrent);
    let stats = parsed.stats();
    assert_eq!(stats.notes, 2);
    assert_eq!(stats.tags, 1);
    assert!(!stats.settings);
    assert!(parsed.clips[0].same_content(&snapshot.clips[0]));
    assert_eq!(parsed.clips[1].remote_id.as_deref(), Some("remote-b"));
}

#[test]
fn test_non_native_processors_refuse_export() {
    let registry = ProcessorRegistry::default();
    let flat = registry
        .detect(json_source(json!({"clips": []})))
        .unwrap();
    assert_eq!(flat.kind(), FormatKind::LegacyFlatJson);

    let mut only_flat = ProcessorRegistry::new();
    only_flat.register(Box::new(LegacyFlatJsonProcessor::new()));
    assert!(only_flat.exporter().is_none());

    let result = LegacyFlatJsonProcessor::new().serialize(
        &ExportSnapshot::default(),
        &[BackupItemType::Notes],
        Utc::now(),
    );
    assert!(matches!(result, Err(Error::Unsupported(_))));
}
