//! Plain-text reports for sharing and export files
//!
//! Shared reports group entries by category name in order of first appearance;
//! each line is the scanned value, followed by ` xN` when counted more than
//! once. Export files list one entry per line with its category in parentheses.

use crate::models::{Category, CategoryId, CategorySnapshot, InventoryEntry};
use std::collections::HashSet;

/// Heading used for entries without a category
pub const UNCATEGORIZED_LABEL: &str = "No Category";

/// One report line: `value` or `value xN`
pub fn format_entry_line(entry: &InventoryEntry) -> String {
    if entry.count > 1 {
        format!("{} x{}", entry.value, entry.count)
    } else {
        entry.value.clone()
    }
}

/// All entries, grouped under their category names
pub fn format_report(entries: &[InventoryEntry], categories: &CategorySnapshot) -> String {
    let mut groups: Vec<(&str, Vec<&InventoryEntry>)> = Vec::new();
    for entry in entries {
        let name = categories
            .name_of(entry.category_id.as_ref())
            .unwrap_or(UNCATEGORIZED_LABEL);
        match groups.iter_mut().find(|(group, _)| *group == name) {
            Some((_, members)) => members.push(entry),
            None => groups.push((name, vec![entry])),
        }
    }

    let mut output = String::new();
    for (name, members) in groups {
        output.push_str(name);
        output.push('\n');
        for entry in members {
            output.push_str(&format_entry_line(entry));
            output.push('\n');
        }
        output.push('\n');
    }
    output
}

/// Export file body: `value[ xN] (Category)` per entry, in entry order
pub fn format_export(entries: &[InventoryEntry], categories: &CategorySnapshot) -> String {
    entries
        .iter()
        .map(|entry| {
            let name = categories
                .name_of(entry.category_id.as_ref())
                .unwrap_or(UNCATEGORIZED_LABEL);
            format!("{} ({})\n", format_entry_line(entry), name)
        })
        .collect()
}

/// Selected categories with their entries, in the order given.
///
/// Categories with no entries still get a heading.
pub fn format_category_share(selected: &[Category], entries: &[InventoryEntry]) -> String {
    let mut output = String::new();
    let mut seen: HashSet<&CategoryId> = HashSet::new();
    for category in selected {
        if !seen.insert(&category.id) {
            continue;
        }
        output.push_str(&category.name);
        output.push('\n');
        for entry in entries
            .iter()
            .filter(|e| e.category_id.as_ref() == Some(&category.id))
        {
            output.push_str(&format_entry_line(entry));
            output.push('\n');
        }
        output.push('\n');
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(value: &str, count: u32, category: Option<&Category>) -> InventoryEntry {
        let mut entry = InventoryEntry::new(value, category.map(|c| c.id.clone()));
        entry.count = count;
        entry
    }

    #[test]
    fn entry_line_shows_count_only_when_repeated() {
        assert_eq!(format_entry_line(&entry("A", 1, None)), "A");
        assert_eq!(format_entry_line(&entry("A", 3, None)), "A x3");
    }

    #[test]
    fn report_groups_by_category_in_first_seen_order() {
        let parts = Category::new("Parts");
        let tools = Category::new("Tools");
        let snapshot = CategorySnapshot {
            categories: vec![tools.clone(), parts.clone()],
        };
        let entries = vec![
            entry("0012345", 2, Some(&parts)),
            entry("999", 1, None),
            entry("777", 1, Some(&tools)),
            entry("0012346", 1, Some(&parts)),
        ];

        let report = format_report(&entries, &snapshot);
        assert_eq!(
            report,
            "Parts\n0012345 x2\n0012346\n\nNo Category\n999\n\nTools\n777\n\n"
        );
    }

    #[test]
    fn report_treats_unknown_category_as_uncategorized() {
        let ghost = Category::new("Ghost");
        let entries = vec![entry("A", 1, Some(&ghost)), entry("B", 1, None)];

        let report = format_report(&entries, &CategorySnapshot::default());
        assert_eq!(report, "No Category\nA\nB\n\n");
    }

    #[test]
    fn empty_report_is_empty() {
        assert_eq!(format_report(&[], &CategorySnapshot::default()), "");
    }

    #[test]
    fn category_share_lists_selected_categories_only() {
        let parts = Category::new("Parts");
        let tools = Category::new("Tools");
        let empty = Category::new("Empty");
        let entries = vec![
            entry("A", 2, Some(&parts)),
            entry("B", 1, Some(&tools)),
            entry("C", 1, None),
        ];

        let share = format_category_share(&[parts.clone(), empty, parts], &entries);
        assert_eq!(share, "Parts\nA x2\n\nEmpty\n\n");
    }

    #[test]
    fn export_lists_one_line_per_entry_with_category() {
        let parts = Category::new("Parts");
        let snapshot = CategorySnapshot {
            categories: vec![parts.clone()],
        };
        let entries = vec![
            entry("0012345", 2, Some(&parts)),
            entry("999", 1, None),
            entry("0012346", 1, Some(&parts)),
        ];

        assert_eq!(
            format_export(&entries, &snapshot),
            "0012345 x2 (Parts)\n999 (No Category)\n0012346 (Parts)\n"
        );
        assert_eq!(format_export(&[], &snapshot), "");
    }
}
