//! Per-parse cache of tags synthesized from label and category names.
//!
//! Third-party exports name their labels instead of referencing ids. While a
//! processor walks a file it hands out one provisional tag id per distinct
//! name; the coordinator later maps each provisional tag onto an existing
//! store tag with the same name, or saves it.

use std::collections::HashMap;

use clipvault_core::CatalogEntry;

/// Owned name → provisional tag cache.
#[derive(Debug, Default)]
pub struct LabelBook {
    by_name: HashMap<String, usize>,
    entries: Vec<CatalogEntry>,
}

impl LabelBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Provisional tag id for `name`, creating the tag on first use.
    /// Blank names yield `None`.
    pub fn id_for(&mut self, name: &str) -> Option<String> {
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        if let Some(&idx) = self.by_name.get(name) {
            return Some(self.entries[idx].id.clone());
        }
        let entry = CatalogEntry::tag(name);
        let id = entry.id.clone();
        self.by_name.insert(name.to_string(), self.entries.len());
        self.entries.push(entry);
        Some(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Forget every cached name.
    pub fn clear(&mut self) {
        self.by_name.clear();
        self.entries.clear();
    }

    /// Hand the synthesized tags over, in first-seen order.
    pub fn into_entries(self) -> Vec<CatalogEntry> {
        self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_name_same_id() {
        let mut book = LabelBook::new();
        let a = book.id_for("Work").unwrap();
        let b = book.id_for(" Work ").unwrap();
        let c = book.id_for("Home").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(book.len(), 2);
    }

    #[test]
    fn test_blank_name_has_no_id() {
        let mut book = LabelBook::new();
        assert!(book.id_for("   ").is_none());
        assert!(book.is_empty());
    }

    #[test]
    fn test_entries_keep_order_and_clear_resets() {
        let mut book = LabelBook::new();
        book.id_for("b");
        book.id_for("a");
        book.clear();
        assert!(book.is_empty());
        book.id_for("z");
        let names: Vec<_> = book.into_entries().into_iter().map(|e| e.name).collect();
        assert_eq!(names, vec!["z"]);
    }
}
