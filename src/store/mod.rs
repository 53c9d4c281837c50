//! Persistence backends
//!
//! Two independent stores hold the same JSON documents: a SQLite-backed
//! key-value table and plain files under the application data directory.
//! [`DualStore`] writes both and reads the file copy first.

mod dual;
mod file;
mod kv;

pub use dual::{ConsistencyWarning, DualStore, SaveReport};
pub use file::FileStore;
pub use kv::SqliteKvStore;

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

use crate::config::Config;
use crate::error::Result;

/// Logical documents kept by the stores
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Document {
    Categories,
    Entries,
}

impl Document {
    pub const ALL: [Document; 2] = [Document::Categories, Document::Entries];

    /// Key in the key-value store
    pub fn key(self) -> &'static str {
        match self {
            Document::Categories => "categories",
            Document::Entries => "entries",
        }
    }

    /// File name in the data directory
    pub fn file_name(self) -> &'static str {
        match self {
            Document::Categories => "categories.json",
            Document::Entries => "entries.json",
        }
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Which of the two stores an operation touched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    KeyValue,
    File,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::KeyValue => f.write_str("key-value store"),
            BackendKind::File => f.write_str("file store"),
        }
    }
}

/// A store that holds one raw JSON string per document.
///
/// Implementations are blocking; [`DualStore`] moves them onto the blocking pool.
pub trait Backend: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Raw document text, `None` when never written
    fn read(&self, document: Document) -> Result<Option<String>>;

    fn write(&self, document: Document, content: &str) -> Result<()>;
}

/// A record type that can be stored in a document
pub trait Record: Serialize + DeserializeOwned + Send + Sync + 'static {
    const KIND: &'static str;

    /// Why this record must not be persisted, if it must not
    fn rejection(&self) -> Option<&'static str>;
}

/// The opened backends: the redundant document store plus direct file access for exports
pub struct Storage {
    pub store: DualStore,
    pub files: Arc<FileStore>,
}

impl Storage {
    /// Open both backends under the configured data directory
    pub fn open(config: &Config) -> Result<Self> {
        let kv = Arc::new(SqliteKvStore::open(&config.preferences_path())?);
        let files = Arc::new(FileStore::new(config.file_store_root())?);
        let store = DualStore::new(kv, files.clone());
        Ok(Self { store, files })
    }
}
