//! Merge engine: reconciles incoming clips against the existing collection.
//!
//! Identity is decided by remote id first, then by exact text. A matched
//! clip keeps the existing record and only gains attributes (tag and kit
//! unions, a title when it had none, favorite). Text is never replaced.
//! Every record touched by one call shares the same `now` as its modify date.
//!
//! The engine is pure: it reads snapshots and returns the upserts the
//! coordinator should commit.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::{debug, trace};

use clipvault_core::Clip;

/// One clip to write to the store.
#[derive(Debug, Clone, PartialEq)]
pub struct Upsert {
    /// The stored record being replaced, `None` for a new clip.
    pub previous: Option<Clip>,
    pub next: Clip,
}

impl Upsert {
    pub fn is_new(&self) -> bool {
        self.previous.is_none()
    }
}

/// Result of one merge call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergeOutcome {
    /// In incoming order; duplicates within the batch are folded together.
    pub upserts: Vec<Upsert>,
    /// Incoming records dropped for blank text.
    pub skipped_blank: usize,
}

impl MergeOutcome {
    pub fn new_count(&self) -> usize {
        self.upserts.iter().filter(|u| u.is_new()).count()
    }

    pub fn matched_count(&self) -> usize {
        self.upserts.len() - self.new_count()
    }
}

#[derive(Debug, Clone, Copy)]
enum Slot {
    Existing(usize),
    Upsert(usize),
}

/// Lookup tables for identity resolution.
///
/// Keys first point at stored clips; once a record is reconciled in this
/// batch its keys are redirected to the pending upsert, so later duplicates
/// merge into it instead of the stale stored copy.
#[derive(Default)]
struct IdentityIndex {
    by_remote_id: HashMap<String, Slot>,
    by_text: HashMap<String, Slot>,
}

impl IdentityIndex {
    fn build(existing: &[Clip]) -> Self {
        let mut index = Self::default();
        for (i, clip) in existing.iter().enumerate() {
            if let Some(remote_id) = &clip.remote_id {
                index
                    .by_remote_id
                    .entry(remote_id.clone())
                    .or_insert(Slot::Existing(i));
            }
            index
                .by_text
                .entry(clip.text.clone())
                .or_insert(Slot::Existing(i));
        }
        index
    }

    fn resolve(&self, clip: &Clip) -> Option<Slot> {
        clip.remote_id
            .as_ref()
            .and_then(|r| self.by_remote_id.get(r))
            .or_else(|| self.by_text.get(&clip.text))
            .copied()
    }

    fn point_at(&mut self, clip: &Clip, slot: Slot) {
        if let Some(remote_id) = &clip.remote_id {
            self.by_remote_id.insert(remote_id.clone(), slot);
        }
        self.by_text.insert(clip.text.clone(), slot);
    }
}

/// Fold `incoming` into `base`, which keeps its identity and text.
pub fn reconcile(mut base: Clip, incoming: &Clip, now: DateTime<Utc>) -> Clip {
    base.tag_ids.extend(incoming.tag_ids.iter().cloned());
    base.snippet_kit_ids.extend(incoming.snippet_kit_ids.iter().cloned());
    if base.title.is_none() {
        base.title = incoming.title.clone();
    }
    base.favorite |= incoming.favorite;
    base.modify_date = Some(now);
    base
}

/// Prepare an unmatched incoming clip for insertion.
fn admit(mut clip: Clip, now: DateTime<Utc>) -> Clip {
    let created = *clip.create_date.get_or_insert(now);
    clip.modify_date = Some(created);
    clip.local_id = None;
    clip
}

/// Reconcile `incoming` against `existing` using one transaction timestamp.
pub fn merge(existing: &[Clip], incoming: Vec<Clip>, now: DateTime<Utc>) -> MergeOutcome {
    let mut index = IdentityIndex::build(existing);
    let mut outcome = MergeOutcome::default();

    for clip in incoming {
        if !clip.has_text() {
            trace!(
                subsystem = "merge",
                component = "merge_engine",
                remote_id = ?clip.remote_id,
                "Dropping clip with blank text"
            );
            outcome.skipped_blank += 1;
            continue;
        }

        match index.resolve(&clip) {
            Some(Slot::Existing(i)) => {
                let stored = &existing[i];
                debug!(
                    subsystem = "merge",
                    component = "merge_engine",
                    clip_id = ?stored.local_id,
                    remote_id = ?stored.remote_id,
                    "Incoming clip matches stored clip"
                );
                let next = reconcile(stored.clone(), &clip, now);
                let slot = Slot::Upsert(outcome.upserts.len());
                index.point_at(&next, slot);
                outcome.upserts.push(Upsert {
                    previous: Some(stored.clone()),
                    next,
                });
            }
            Some(Slot::Upsert(i)) => {
                debug!(
                    subsystem = "merge",
                    component = "merge_engine",
                    remote_id = ?clip.remote_id,
                    "Incoming clip duplicates an earlier record in the batch"
                );
                let pending = &mut outcome.upserts[i];
                pending.next = reconcile(pending.next.clone(), &clip, now);
                let next = pending.next.clone();
                index.point_at(&next, Slot::Upsert(i));
            }
            None => {
                let next = admit(clip, now);
                let slot = Slot::Upsert(outcome.upserts.len());
                index.point_at(&next, slot);
                outcome.upserts.push(Upsert {
                    previous: None,
                    next,
                });
            }
        }
    }

    debug!(
        subsystem = "merge",
        component = "merge_engine",
        clip_count = outcome.upserts.len(),
        new_count = outcome.new_count(),
        matched_count = outcome.matched_count(),
        skipped_count = outcome.skipped_blank,
        "Merge computed"
    );
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use uuid::Uuid;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap()
    }

    fn stored(text: &str) -> Clip {
        let created = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        let mut clip = Clip::new(text).with_create_date(created);
        clip.local_id = Some(Uuid::now_v7());
        clip.modify_date = clip.create_date;
        clip
    }

    #[test]
    fn test_matched_by_remote_id_keeps_existing_text() {
        let existing = vec![stored("hello").with_remote_id("r1").with_tag("t1")];
        let incoming = vec![Clip::new("ignored")
            .with_remote_id("r1")
            .with_tag("t2")
            .with_favorite(true)];

        let outcome = merge(&existing, incoming, now());
        assert_eq!(outcome.upserts.len(), 1);
        let upsert = &outcome.upserts[0];
        assert_eq!(upsert.previous.as_ref(), Some(&existing[0]));
        assert_eq!(upsert.next.text, "hello");
        assert_eq!(upsert.next.remote_id.as_deref(), Some("r1"));
        assert!(upsert.next.favorite);
        assert_eq!(
            upsert.next.tag_ids.iter().map(String::as_str).collect::<Vec<_>>(),
            vec!["t1", "t2"]
        );
        assert_eq!(upsert.next.local_id, existing[0].local_id);
        assert_eq!(upsert.next.modify_date, Some(now()));
        assert_eq!(upsert.next.create_date, existing[0].create_date);
    }

    #[test]
    fn test_remote_id_takes_priority_over_text() {
        let existing = vec![stored("a").with_remote_id("r1"), stored("b")];
        let outcome = merge(&existing, vec![Clip::new("b").with_remote_id("r1")], now());
        assert_eq!(outcome.upserts[0].next.local_id, existing[0].local_id);
    }

    #[test]
    fn test_text_match_is_exact() {
        let existing = vec![stored("Hello")];
        let outcome = merge(
            &existing,
            vec![Clip::new("hello"), Clip::new("Hello "), Clip::new("Hello")],
            now(),
        );
        assert_eq!(outcome.new_count(), 2);
        assert_eq!(outcome.matched_count(), 1);
    }

    #[test]
    fn test_blank_clips_are_dropped() {
        let incoming = vec![Clip::new("valid"), Clip::new(""), Clip::new(" \n ")];
        let outcome = merge(&[], incoming, now());
        assert_eq!(outcome.upserts.len(), 1);
        assert_eq!(outcome.skipped_blank, 2);
        assert_eq!(outcome.upserts[0].next.text, "valid");
    }

    #[test]
    fn test_new_clip_dates() {
        let created = Utc.with_ymd_and_hms(2019, 3, 3, 3, 3, 3).unwrap();
        let outcome = merge(
            &[],
            vec![Clip::new("dated").with_create_date(created), Clip::new("undated")],
            now(),
        );
        let dated = &outcome.upserts[0].next;
        assert_eq!(dated.create_date, Some(created));
        assert_eq!(dated.modify_date, Some(created));
        let undated = &outcome.upserts[1].next;
        assert_eq!(undated.create_date, Some(now()));
        assert_eq!(undated.modify_date, Some(now()));
        assert!(outcome.upserts.iter().all(Upsert::is_new));
    }

    #[test]
    fn test_title_and_favorite_rules() {
        let existing = vec![
            stored("titled").with_title("Mine").with_favorite(true),
            stored("untitled"),
        ];
        let incoming = vec![
            Clip::new("titled").with_title("Theirs"),
            Clip::new("untitled").with_title("Theirs"),
        ];
        let outcome = merge(&existing, incoming, now());
        assert_eq!(outcome.upserts[0].next.title.as_deref(), Some("Mine"));
        assert!(outcome.upserts[0].next.favorite);
        assert_eq!(outcome.upserts[1].next.title.as_deref(), Some("Theirs"));
        assert!(!outcome.upserts[1].next.favorite);
    }

    #[test]
    fn test_soft_deleted_clip_still_matches() {
        let mut gone = stored("gone");
        gone.deleted_at = Some(Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap());
        let outcome = merge(&[gone.clone()], vec![Clip::new("gone").with_tag("t")], now());
        assert_eq!(outcome.upserts[0].next.local_id, gone.local_id);
        assert!(outcome.upserts[0].next.deleted());
    }

    #[test]
    fn test_batch_duplicates_fold_into_first_record() {
        let outcome = merge(
            &[],
            vec![
                Clip::new("dup").with_tag("a"),
                Clip::new("dup").with_tag("b").with_favorite(true),
                Clip::new("other").with_remote_id("r9"),
                Clip::new("changed text").with_remote_id("r9").with_title("T"),
            ],
            now(),
        );
        assert_eq!(outcome.upserts.len(), 2);
        let dup = &outcome.upserts[0].next;
        assert_eq!(dup.tag_ids.len(), 2);
        assert!(dup.favorite);
        let other = &outcome.upserts[1].next;
        assert_eq!(other.text, "other");
        assert_eq!(other.title.as_deref(), Some("T"));
    }

    #[test]
    fn test_batch_duplicate_of_stored_clip_keeps_single_previous() {
        let existing = vec![stored("x").with_tag("t0")];
        let outcome = merge(
            &existing,
            vec![Clip::new("x").with_tag("t1"), Clip::new("x").with_tag("t2")],
            now(),
        );
        assert_eq!(outcome.upserts.len(), 1);
        assert_eq!(outcome.upserts[0].previous.as_ref(), Some(&existing[0]));
        assert_eq!(outcome.upserts[0].next.tag_ids.len(), 3);
    }

    #[test]
    fn test_merge_is_idempotent_on_content() {
        let incoming = vec![
            Clip::new("one").with_tag("t1"),
            Clip::new("two").with_remote_id("r2").with_favorite(true),
        ];
        let first = merge(&[], incoming.clone(), now());
        let committed: Vec<Clip> = first
            .upserts
            .into_iter()
            .map(|u| {
                let mut c = u.next;
                c.local_id = Some(Uuid::now_v7());
                c
            })
            .collect();

        let later = Utc.with_ymd_and_hms(2024, 5, 2, 0, 0, 0).unwrap();
        let second = merge(&committed, incoming, later);
        assert_eq!(second.new_count(), 0);
        for (upsert, before) in second.upserts.iter().zip(&committed) {
            assert!(upsert.next.same_content(before));
            assert_eq!(upsert.next.local_id, before.local_id);
            assert_eq!(upsert.next.modify_date, Some(later));
        }
    }
}
