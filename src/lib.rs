//! Scan Inventory - counted, categorized barcode scans
//!
//! Debounces decoder output into scans, merges scans into per-category
//! counters and keeps categories and entries consistent on disk, redundantly
//! in a SQLite key-value table and in JSON files.

pub mod aggregator;
pub mod config;
pub mod coordinator;
pub mod debouncer;
pub mod error;
pub mod export;
pub mod models;
pub mod registry;
pub mod store;

pub use aggregator::{InventoryAggregator, ScanOutcome};
pub use config::Config;
pub use coordinator::{ConsistencyCoordinator, CoreEvent};
pub use debouncer::{AcceptedScan, DebounceState, DecodeEvent, DisplayExpired, ScanDebouncer};
pub use error::{InventoryError, Result};
pub use models::{
    Category, CategoryId, CategorySnapshot, EntryId, InventoryEntry, InventorySnapshot,
};
pub use registry::{CategoryRegistry, CategoryRemoved};
pub use store::{
    Backend, BackendKind, ConsistencyWarning, Document, DualStore, FileStore, SaveReport,
    SqliteKvStore, Storage,
};
