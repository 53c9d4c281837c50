//! Consistency coordinator
//!
//! Owns the category registry and the inventory aggregator for one process
//! and decides when and in which order they are persisted:
//!
//! - startup loads categories, then entries, then detaches entries whose
//!   category no longer exists;
//! - removing a category saves the categories before the detached entries,
//!   so an interrupted cascade is closed by the next startup repair;
//! - every mutation after startup rewrites the affected document.
//!
//! Callers serialize access (`&mut self`). Snapshots and warnings are pushed
//! to subscribers over unbounded channels.

use crate::aggregator::{InventoryAggregator, ScanOutcome};
use crate::debouncer::AcceptedScan;
use crate::error::{InventoryError, Result};
use crate::export::{format_category_share, format_export, format_report};
use crate::models::{
    Category, CategoryId, CategorySnapshot, EntryId, InventoryEntry, InventorySnapshot,
};
use crate::registry::CategoryRegistry;
use crate::store::{ConsistencyWarning, Document, DualStore};
use std::collections::HashSet;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

/// Pushed to the presentation layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreEvent {
    Inventory(InventorySnapshot),
    Categories(CategorySnapshot),
    Warning(ConsistencyWarning),
}

pub struct ConsistencyCoordinator {
    registry: CategoryRegistry,
    aggregator: InventoryAggregator,
    store: DualStore,
    subscribers: Vec<UnboundedSender<CoreEvent>>,
    startup_warnings: Vec<ConsistencyWarning>,
    /// Documents whose latest state has not reached either backend
    unsaved: HashSet<Document>,
    shut_down: bool,
}

impl ConsistencyCoordinator {
    /// Load persisted state and repair dangling category references
    pub async fn open(store: DualStore) -> Self {
        log::info!("Loading data...");
        let registry = CategoryRegistry::from_categories(store.load(Document::Categories).await);
        let aggregator = InventoryAggregator::from_entries(store.load(Document::Entries).await);
        log::info!(
            "Loaded {} categories and {} entries",
            registry.len(),
            aggregator.len()
        );

        let mut coordinator = Self {
            registry,
            aggregator,
            store,
            subscribers: Vec::new(),
            startup_warnings: Vec::new(),
            unsaved: HashSet::new(),
            shut_down: false,
        };

        let repaired = coordinator.aggregator.repair(&coordinator.registry.ids());
        if repaired > 0 {
            log::warn!("Detached {} entries from missing categories", repaired);
            coordinator
                .startup_warnings
                .push(ConsistencyWarning::RepairedEntries { count: repaired });
            coordinator.persist(Document::Entries).await;
        }
        coordinator
    }

    /// Warnings raised while opening, before anyone could subscribe
    pub fn startup_warnings(&self) -> &[ConsistencyWarning] {
        &self.startup_warnings
    }

    /// Receive snapshots after every mutation and all consistency warnings
    pub fn subscribe(&mut self) -> UnboundedReceiver<CoreEvent> {
        let (tx, rx) = unbounded_channel();
        self.subscribers.push(tx);
        rx
    }

    // ── Categories ────────────────────────────────────────────────────────

    pub async fn add_category(&mut self, name: &str) -> Result<Category> {
        let category = self.registry.add(name)?;
        self.categories_changed().await;
        Ok(category)
    }

    pub async fn rename_category(&mut self, id: &CategoryId, new_name: &str) -> Result<Category> {
        let category = self.registry.rename(id, new_name)?;
        self.categories_changed().await;
        Ok(category)
    }

    /// Remove a category and detach its entries. Returns how many entries were detached.
    pub async fn remove_category(&mut self, id: &CategoryId) -> Result<usize> {
        let removed = self.registry.remove(id)?;
        // Categories reach disk before the cascade does
        self.categories_changed().await;

        let detached = self.aggregator.on_category_removed(&removed.id);
        log::info!(
            "Detached {} entries from removed category {}",
            detached,
            removed.id
        );
        self.entries_changed().await;
        Ok(detached)
    }

    pub fn categories(&self) -> &[Category] {
        self.registry.list()
    }

    pub fn category_snapshot(&self) -> CategorySnapshot {
        self.registry.snapshot()
    }

    // ── Entries ───────────────────────────────────────────────────────────

    /// Record one scan. Blank values are rejected; unknown categories become "none".
    ///
    /// The value is stored exactly as decoded, surrounding whitespace included.
    pub async fn record_scan(
        &mut self,
        value: &str,
        category_id: Option<&CategoryId>,
    ) -> Result<ScanOutcome> {
        if value.trim().is_empty() {
            return Err(InventoryError::validation("scanned value must not be empty"));
        }
        let category_id = self.known_category(category_id.cloned());
        let outcome = self.aggregator.record_scan(value, category_id.as_ref());
        self.entries_changed().await;
        Ok(outcome)
    }

    pub async fn record_accepted(&mut self, scan: &AcceptedScan) -> Result<ScanOutcome> {
        self.record_scan(&scan.value, scan.category_id.as_ref()).await
    }

    pub async fn set_count(&mut self, id: &EntryId, new_count: u32) -> Result<()> {
        self.aggregator.set_count(id, new_count)?;
        self.entries_changed().await;
        Ok(())
    }

    /// Add one to an entry's count. Returns the new count.
    pub async fn increment(&mut self, id: &EntryId) -> Result<u32> {
        let count = self.count_of(id)?.saturating_add(1);
        self.set_count(id, count).await?;
        Ok(count)
    }

    /// Subtract one from an entry's count, stopping at 1. Returns the new count.
    pub async fn decrement(&mut self, id: &EntryId) -> Result<u32> {
        let current = self.count_of(id)?;
        if current <= 1 {
            return Ok(current);
        }
        self.set_count(id, current - 1).await?;
        Ok(current - 1)
    }

    /// Reassign an entry's category. Never merges with an existing pair.
    pub async fn set_category(
        &mut self,
        id: &EntryId,
        category_id: Option<CategoryId>,
    ) -> Result<()> {
        let category_id = self.known_category(category_id);
        self.aggregator.set_category(id, category_id)?;
        self.entries_changed().await;
        Ok(())
    }

    /// Remove an entry; removing an absent entry is not an error
    pub async fn remove_entry(&mut self, id: &EntryId) -> bool {
        let removed = self.aggregator.remove(id);
        if removed {
            self.entries_changed().await;
        }
        removed
    }

    pub fn entries(&self) -> &[InventoryEntry] {
        self.aggregator.entries()
    }

    pub fn entries_in(&self, category_id: Option<&CategoryId>) -> Vec<InventoryEntry> {
        self.aggregator.in_category(category_id).cloned().collect()
    }

    pub fn inventory_snapshot(&self) -> InventorySnapshot {
        self.aggregator.snapshot()
    }

    // ── Reports ───────────────────────────────────────────────────────────

    /// All entries grouped by category
    pub fn report(&self) -> String {
        format_report(self.aggregator.entries(), &self.registry.snapshot())
    }

    /// Body of an export file, one line per entry
    pub fn export_text(&self) -> String {
        format_export(self.aggregator.entries(), &self.registry.snapshot())
    }

    /// Share text for the given categories. Fails if any id is unknown.
    pub fn category_share(&self, ids: &[CategoryId]) -> Result<String> {
        let selected = ids
            .iter()
            .map(|id| {
                self.registry
                    .get(id)
                    .cloned()
                    .ok_or_else(|| InventoryError::not_found("Category", id))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(format_category_share(&selected, self.aggregator.entries()))
    }

    // ── Lifecycle ─────────────────────────────────────────────────────────

    /// Drop all categories and entries, in memory and on both backends
    ///
    /// Both documents are attempted; a document that could not be cleared
    /// stays queued for the drop flush and the first error is returned.
    pub async fn clear_all(&mut self) -> Result<()> {
        self.registry.clear();
        self.aggregator.clear();
        self.unsaved.extend(Document::ALL);

        let mut first_error = None;
        for document in Document::ALL {
            match self.store.clear(document).await {
                Ok(warnings) => {
                    self.unsaved.remove(&document);
                    for warning in warnings {
                        self.warn(warning);
                    }
                }
                Err(e) => {
                    log::error!("Error clearing {}: {}", document, e);
                    first_error.get_or_insert(e);
                }
            }
        }
        self.emit(CoreEvent::Categories(self.registry.snapshot()));
        self.emit(CoreEvent::Inventory(self.aggregator.snapshot()));

        match first_error {
            Some(e) => Err(e),
            None => {
                log::info!("Cleared all data");
                Ok(())
            }
        }
    }

    /// Save both documents now. Both are attempted; the first error is returned.
    pub async fn save_all(&mut self) -> Result<()> {
        self.unsaved.extend(Document::ALL);

        let mut first_error = None;
        for document in Document::ALL {
            let result = match document {
                Document::Categories => self.store.save(document, self.registry.list()).await,
                Document::Entries => self.store.save(document, self.aggregator.entries()).await,
            };
            match result {
                Ok(report) => {
                    self.unsaved.remove(&document);
                    for warning in report.warnings {
                        self.warn(warning);
                    }
                }
                Err(e) => {
                    log::error!("Error saving {}: {}", document, e);
                    first_error.get_or_insert(e);
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Final save of both documents. Consumes the coordinator.
    pub async fn shutdown(mut self) -> Result<()> {
        log::info!("Saving data on shutdown...");
        let result = self.save_all().await;
        match &result {
            Ok(()) => log::info!("Data saved successfully on shutdown"),
            Err(e) => log::error!("Error saving data on shutdown: {}", e),
        }
        // Whatever failed here is left to the drop flush
        self.shut_down = result.is_ok();
        result
    }

    // ── Internals ─────────────────────────────────────────────────────────

    fn count_of(&self, id: &EntryId) -> Result<u32> {
        self.aggregator
            .get(id)
            .map(|e| e.count)
            .ok_or_else(|| InventoryError::not_found("Entry", id))
    }

    fn known_category(&self, category_id: Option<CategoryId>) -> Option<CategoryId> {
        match category_id {
            Some(id) if !self.registry.contains(&id) => {
                log::warn!("Ignoring unknown category {}, storing as uncategorized", id);
                None
            }
            other => other,
        }
    }

    async fn categories_changed(&mut self) {
        self.persist(Document::Categories).await;
        self.emit(CoreEvent::Categories(self.registry.snapshot()));
    }

    async fn entries_changed(&mut self) {
        self.persist(Document::Entries).await;
        self.emit(CoreEvent::Inventory(self.aggregator.snapshot()));
    }

    /// Save one document, surfacing failures as warnings
    async fn persist(&mut self, document: Document) {
        self.unsaved.insert(document);
        let result = match document {
            Document::Categories => self.store.save(document, self.registry.list()).await,
            Document::Entries => self.store.save(document, self.aggregator.entries()).await,
        };
        match result {
            Ok(report) => {
                self.unsaved.remove(&document);
                for warning in report.warnings {
                    self.warn(warning);
                }
                if document == Document::Entries {
                    self.verify_references().await;
                }
            }
            Err(e) => {
                log::error!("Error saving {}: {}", document, e);
                self.warn(ConsistencyWarning::SaveFailed {
                    document,
                    reason: e.to_string(),
                });
            }
        }
    }

    /// Check persisted entries against the persisted categories
    async fn verify_references(&mut self) {
        let persisted: HashSet<CategoryId> = self
            .store
            .load::<Category>(Document::Categories)
            .await
            .into_iter()
            .map(|c| c.id)
            .collect();
        let dangling: Vec<ConsistencyWarning> = self
            .aggregator
            .entries()
            .iter()
            .filter_map(|e| {
                let id = e.category_id.as_ref()?;
                (!persisted.contains(id)).then(|| ConsistencyWarning::DanglingCategory {
                    value: e.value.clone(),
                    category_id: id.clone(),
                })
            })
            .collect();
        for warning in dangling {
            self.warn(warning);
        }
    }

    fn warn(&mut self, warning: ConsistencyWarning) {
        log::warn!("{}", warning);
        self.emit(CoreEvent::Warning(warning));
    }

    fn emit(&mut self, event: CoreEvent) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

impl Drop for ConsistencyCoordinator {
    fn drop(&mut self) {
        if self.shut_down || self.unsaved.is_empty() {
            return;
        }
        log::warn!(
            "Coordinator dropped with {} unsaved document(s), flushing",
            self.unsaved.len()
        );
        for document in Document::ALL {
            if !self.unsaved.contains(&document) {
                continue;
            }
            let result = match document {
                Document::Categories => self.store.save_blocking(document, self.registry.list()),
                Document::Entries => self.store.save_blocking(document, self.aggregator.entries()),
            };
            if let Err(e) = result {
                log::error!("Error flushing {} on drop: {}", document, e);
            }
        }
    }
}
