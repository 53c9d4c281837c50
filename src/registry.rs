//! Category registry
//!
//! Single source of truth for which category ids are valid. Removal hands back
//! a [`CategoryRemoved`] notice that must be forwarded to the aggregator.

use crate::error::{InventoryError, Result};
use crate::models::{Category, CategoryId, CategorySnapshot};
use std::collections::HashSet;

/// Emitted when a category is removed; entries referencing `id` must be detached
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryRemoved {
    pub id: CategoryId,
}

/// Ordered set of categories
#[derive(Debug, Default, Clone)]
pub struct CategoryRegistry {
    categories: Vec<Category>,
}

impl CategoryRegistry {
    /// Rebuild a registry from persisted categories.
    ///
    /// Blank names and repeated ids are skipped, keeping the first occurrence.
    pub fn from_categories(categories: Vec<Category>) -> Self {
        let mut seen = HashSet::new();
        let categories = categories
            .into_iter()
            .filter(|c| {
                if c.name.trim().is_empty() {
                    log::warn!("Skipping loaded category {} with empty name", c.id);
                    return false;
                }
                if !seen.insert(c.id.clone()) {
                    log::warn!("Skipping duplicate category id {}", c.id);
                    return false;
                }
                true
            })
            .collect();
        Self { categories }
    }

    /// Create a category. Fails when `name` is blank after trimming.
    pub fn add(&mut self, name: &str) -> Result<Category> {
        let name = non_blank(name)?;
        let category = Category::new(name);
        log::info!("Added category: {} ({})", category.name, category.id);
        self.categories.push(category.clone());
        Ok(category)
    }

    pub fn rename(&mut self, id: &CategoryId, new_name: &str) -> Result<Category> {
        let position = self.position(id)?;
        let new_name = non_blank(new_name)?;
        let category = &mut self.categories[position];
        log::info!("Renamed category {}: {} -> {}", id, category.name, new_name);
        category.name = new_name.to_string();
        Ok(category.clone())
    }

    /// Remove a category, returning the notice that drives the entry cascade
    pub fn remove(&mut self, id: &CategoryId) -> Result<CategoryRemoved> {
        let position = self.position(id)?;
        let removed = self.categories.remove(position);
        log::info!("Removed category: {} ({})", removed.name, removed.id);
        Ok(CategoryRemoved { id: removed.id })
    }

    pub fn get(&self, id: &CategoryId) -> Option<&Category> {
        self.categories.iter().find(|c| &c.id == id)
    }

    pub fn contains(&self, id: &CategoryId) -> bool {
        self.get(id).is_some()
    }

    /// Categories in insertion order
    pub fn list(&self) -> &[Category] {
        &self.categories
    }

    pub fn ids(&self) -> HashSet<CategoryId> {
        self.categories.iter().map(|c| c.id.clone()).collect()
    }

    pub fn snapshot(&self) -> CategorySnapshot {
        CategorySnapshot {
            categories: self.categories.clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    pub fn clear(&mut self) {
        self.categories.clear();
    }

    fn position(&self, id: &CategoryId) -> Result<usize> {
        self.categories
            .iter()
            .position(|c| &c.id == id)
            .ok_or_else(|| InventoryError::not_found("Category", id))
    }
}

fn non_blank(name: &str) -> Result<&str> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(InventoryError::validation("category name must not be empty"));
    }
    Ok(trimmed)
}
