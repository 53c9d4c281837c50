//! Inventory aggregation
//!
//! Entries are keyed by `(value, category_id)`. A scan of an existing pair
//! bumps its count in place; any other scan appends a new entry, so one value
//! can carry independent counters under several categories.

use crate::error::{InventoryError, Result};
use crate::models::{CategoryId, EntryId, InventoryEntry, InventorySnapshot};
use std::collections::HashSet;

/// What a recorded scan did to the collection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    /// An existing `(value, category)` entry was counted again
    Incremented { id: EntryId, count: u32 },
    /// A new entry was appended. `other_categories` is set when the value
    /// already existed under a different category.
    Created {
        id: EntryId,
        other_categories: bool,
    },
}

impl ScanOutcome {
    pub fn entry_id(&self) -> &EntryId {
        match self {
            ScanOutcome::Incremented { id, .. } | ScanOutcome::Created { id, .. } => id,
        }
    }
}

/// Owns the counted entries, in first-seen order
#[derive(Debug, Default, Clone)]
pub struct InventoryAggregator {
    entries: Vec<InventoryEntry>,
}

impl InventoryAggregator {
    /// Rebuild from persisted entries, skipping records that could never have been written
    pub fn from_entries(entries: Vec<InventoryEntry>) -> Self {
        let entries = entries
            .into_iter()
            .filter(|e| {
                let keep = !e.value.trim().is_empty() && e.count > 0;
                if !keep {
                    log::warn!("Skipping invalid loaded entry {} ({:?})", e.id, e.value);
                }
                keep
            })
            .collect();
        Self { entries }
    }

    /// Merge one accepted scan into the collection.
    ///
    /// Blank values are rejected before they reach this point.
    pub fn record_scan(&mut self, value: &str, category_id: Option<&CategoryId>) -> ScanOutcome {
        if let Some(entry) = self
            .entries
            .iter_mut()
            .find(|e| e.matches(value, category_id))
        {
            entry.count = entry.count.saturating_add(1);
            log::debug!(
                "Updated existing entry count: {} ({:?}) -> {}",
                value,
                category_id,
                entry.count
            );
            return ScanOutcome::Incremented {
                id: entry.id.clone(),
                count: entry.count,
            };
        }

        let other_categories = self.entries.iter().any(|e| e.value == value);
        let entry = InventoryEntry::new(value, category_id.cloned());
        let id = entry.id.clone();
        self.entries.push(entry);

        if other_categories {
            log::debug!(
                "Added new category entry for existing value: {} ({:?})",
                value,
                category_id
            );
        } else {
            log::debug!("Added new entry: {} ({:?})", value, category_id);
        }
        ScanOutcome::Created {
            id,
            other_categories,
        }
    }

    pub fn set_count(&mut self, id: &EntryId, new_count: u32) -> Result<()> {
        if new_count < 1 {
            return Err(InventoryError::validation("count must be at least 1"));
        }
        self.entry_mut(id)?.count = new_count;
        Ok(())
    }

    /// Point an entry at another category (or none).
    ///
    /// Unlike [`record_scan`](Self::record_scan) this never merges, even when
    /// the new `(value, category)` pair already exists.
    pub fn set_category(&mut self, id: &EntryId, category_id: Option<CategoryId>) -> Result<()> {
        self.entry_mut(id)?.category_id = category_id;
        Ok(())
    }

    /// Remove an entry. Returns whether anything was removed.
    pub fn remove(&mut self, id: &EntryId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| &e.id != id);
        before != self.entries.len()
    }

    /// Detach every entry from a removed category. Returns how many changed.
    pub fn on_category_removed(&mut self, category_id: &CategoryId) -> usize {
        let mut detached = 0;
        for entry in &mut self.entries {
            if entry.category_id.as_ref() == Some(category_id) {
                entry.category_id = None;
                detached += 1;
            }
        }
        detached
    }

    /// Null out references to categories not in `valid`. Returns how many changed.
    pub fn repair(&mut self, valid: &HashSet<CategoryId>) -> usize {
        let mut repaired = 0;
        for entry in &mut self.entries {
            if let Some(id) = &entry.category_id {
                if !valid.contains(id) {
                    log::warn!(
                        "Entry {} references missing category {}, clearing",
                        entry.value,
                        id
                    );
                    entry.category_id = None;
                    repaired += 1;
                }
            }
        }
        repaired
    }

    pub fn get(&self, id: &EntryId) -> Option<&InventoryEntry> {
        self.entries.iter().find(|e| &e.id == id)
    }

    pub fn entries(&self) -> &[InventoryEntry] {
        &self.entries
    }

    /// Entries under one category (`None` selects uncategorized entries)
    pub fn in_category<'a>(
        &'a self,
        category_id: Option<&'a CategoryId>,
    ) -> impl Iterator<Item = &'a InventoryEntry> + 'a {
        self.entries
            .iter()
            .filter(move |e| e.category_id.as_ref() == category_id)
    }

    pub fn snapshot(&self) -> InventorySnapshot {
        InventorySnapshot {
            entries: self.entries.clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    fn entry_mut(&mut self, id: &EntryId) -> Result<&mut InventoryEntry> {
        self.entries
            .iter_mut()
            .find(|e| &e.id == id)
            .ok_or_else(|| InventoryError::not_found("Entry", id))
    }
}
