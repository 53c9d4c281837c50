//! Data model shared by the registry, the aggregator and the stores.
//!
//! Field names serialize as `id`, `name`, `value`, `count` and `categoryId`;
//! documents written by older versions must keep loading.

use crate::store::Record;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identifier of a [`Category`]
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryId(String);

/// Stable identifier of an [`InventoryEntry`]
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(String);

macro_rules! string_id {
    ($ty:ident) => {
        impl $ty {
            /// Allocate a fresh random identifier
            pub fn generate() -> Self {
                Self(uuid::Uuid::new_v4().to_string())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $ty {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl From<String> for $ty {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id!(CategoryId);
string_id!(EntryId);

/// A user-defined grouping that scanned entries can reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
}

impl Category {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: CategoryId::generate(),
            name: name.into(),
        }
    }
}

impl Record for Category {
    const KIND: &'static str = "category";

    fn rejection(&self) -> Option<&'static str> {
        if self.name.trim().is_empty() {
            Some("empty name")
        } else {
            None
        }
    }
}

/// A counted scan of one symbol value under one (possibly absent) category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryEntry {
    pub id: EntryId,
    pub value: String,
    pub count: u32,
    #[serde(rename = "categoryId", default)]
    pub category_id: Option<CategoryId>,
}

impl InventoryEntry {
    /// First sighting of `value` under `category_id`
    pub fn new(value: impl Into<String>, category_id: Option<CategoryId>) -> Self {
        Self {
            id: EntryId::generate(),
            value: value.into(),
            count: 1,
            category_id,
        }
    }

    /// True when this entry is the `(value, category_id)` pair
    pub fn matches(&self, value: &str, category_id: Option<&CategoryId>) -> bool {
        self.value == value && self.category_id.as_ref() == category_id
    }
}

impl Record for InventoryEntry {
    const KIND: &'static str = "entry";

    fn rejection(&self) -> Option<&'static str> {
        if self.value.trim().is_empty() {
            Some("empty value")
        } else if self.count == 0 {
            Some("zero count")
        } else {
            None
        }
    }
}

/// Read-only view of the entry collection, in first-seen order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InventorySnapshot {
    pub entries: Vec<InventoryEntry>,
}

impl InventorySnapshot {
    /// Sum of all counts
    pub fn total_count(&self) -> u64 {
        self.entries.iter().map(|e| u64::from(e.count)).sum()
    }
}

/// Read-only view of the categories, in insertion order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CategorySnapshot {
    pub categories: Vec<Category>,
}

impl CategorySnapshot {
    /// Display name for a category reference, `None` when uncategorized or unknown
    pub fn name_of(&self, id: Option<&CategoryId>) -> Option<&str> {
        let id = id?;
        self.categories
            .iter()
            .find(|c| &c.id == id)
            .map(|c| c.name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_serializes_with_compatible_field_names() {
        let entry = InventoryEntry {
            id: EntryId::from("e-1"),
            value: "0012345".to_string(),
            count: 3,
            category_id: None,
        };

        let json = serde_json::to_string(&entry).unwrap();
        assert!(json.contains("\"id\":\"e-1\""));
        assert!(json.contains("\"value\":\"0012345\""));
        assert!(json.contains("\"count\":3"));
        // Uncategorized entries keep an explicit null
        assert!(json.contains("\"categoryId\":null"));
    }

    #[test]
    fn entry_without_category_field_loads_as_uncategorized() {
        let json = r#"{"id":"e-1","value":"ABC","count":2}"#;
        let entry: InventoryEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.category_id, None);
        assert_eq!(entry.count, 2);
    }

    #[test]
    fn category_round_trips_through_json() {
        let json = r#"{"id":"c-1","name":"Parts"}"#;
        let category: Category = serde_json::from_str(json).unwrap();
        assert_eq!(category.id.as_str(), "c-1");
        assert_eq!(category.name, "Parts");
    }

    #[test]
    fn generated_ids_are_unique() {
        assert_ne!(CategoryId::generate(), CategoryId::generate());
        assert_ne!(EntryId::generate(), EntryId::generate());
    }

    #[test]
    fn blank_records_are_rejected() {
        assert!(Category::new("   ").rejection().is_some());
        assert!(Category::new("Parts").rejection().is_none());

        let mut entry = InventoryEntry::new("", None);
        assert_eq!(entry.rejection(), Some("empty value"));
        entry.value = "X".to_string();
        entry.count = 0;
        assert_eq!(entry.rejection(), Some("zero count"));
    }

    #[test]
    fn snapshot_resolves_category_names() {
        let parts = Category::new("Parts");
        let snapshot = CategorySnapshot {
            categories: vec![parts.clone()],
        };
        assert_eq!(snapshot.name_of(Some(&parts.id)), Some("Parts"));
        assert_eq!(snapshot.name_of(None), None);
        assert_eq!(snapshot.name_of(Some(&CategoryId::from("gone"))), None);
    }
}
