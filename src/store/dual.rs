//! Dual-backend document persistence
//!
//! Every save writes the key-value store and the file store independently.
//! A failure on one backend is reported but never rolls back the other.
//! After both writes the document is read back and its record count compared
//! with what was written.
//!
//! Loads prefer the file store and fall back to the key-value store when the
//! file is missing or unparseable; if neither yields a document the result is
//! empty.

use super::{Backend, BackendKind, Document, Record};
use crate::error::{InventoryError, Result};
use crate::models::CategoryId;
use std::fmt;
use std::sync::Arc;

const EMPTY_DOCUMENT: &str = "[]";

/// Non-fatal signal that persisted state may not match memory
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsistencyWarning {
    /// Read-back after a save returned a different number of records
    CountMismatch {
        document: Document,
        expected: usize,
        found: usize,
    },
    /// One backend rejected a write; the other one was still written
    BackendWriteFailed {
        document: Document,
        backend: BackendKind,
        reason: String,
    },
    /// A persisted entry points at a category that is not persisted
    DanglingCategory { value: String, category_id: CategoryId },
    /// Entries whose category had vanished were detached during load
    RepairedEntries { count: usize },
    /// Neither backend accepted an automatic save; memory is ahead of disk
    SaveFailed { document: Document, reason: String },
}

impl fmt::Display for ConsistencyWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsistencyWarning::CountMismatch {
                document,
                expected,
                found,
            } => write!(
                f,
                "{} count mismatch after save: expected {}, got {}",
                document, expected, found
            ),
            ConsistencyWarning::BackendWriteFailed {
                document,
                backend,
                reason,
            } => write!(f, "Failed to write {} to {}: {}", document, backend, reason),
            ConsistencyWarning::DanglingCategory { value, category_id } => write!(
                f,
                "Entry {} references non-existent category {}",
                value, category_id
            ),
            ConsistencyWarning::RepairedEntries { count } => {
                write!(f, "Detached {} entries from missing categories", count)
            }
            ConsistencyWarning::SaveFailed { document, reason } => {
                write!(f, "Error saving {}: {}", document, reason)
            }
        }
    }
}

/// Outcome of a verified save
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveReport {
    pub document: Document,
    /// Records written (after filtering)
    pub written: usize,
    /// Records filtered out as invalid
    pub skipped: usize,
    pub warnings: Vec<ConsistencyWarning>,
}

/// Redundant storage over a key-value backend and a file backend
#[derive(Clone)]
pub struct DualStore {
    kv: Arc<dyn Backend>,
    file: Arc<dyn Backend>,
}

impl DualStore {
    pub fn new(kv: Arc<dyn Backend>, file: Arc<dyn Backend>) -> Self {
        Self { kv, file }
    }

    /// Save a document, writing both backends concurrently, then verify it
    pub async fn save<T: Record>(&self, document: Document, records: &[T]) -> Result<SaveReport> {
        let (content, written, skipped) = encode(document, records)?;

        let (kv_result, file_result) = tokio::join!(
            write_on_pool(Arc::clone(&self.kv), document, content.clone()),
            write_on_pool(Arc::clone(&self.file), document, content),
        );
        let mut warnings = settle(document, kv_result, file_result)?;

        let found = self.load::<T>(document).await.len();
        warnings.extend(verify(document, written, found));

        Ok(SaveReport {
            document,
            written,
            skipped,
            warnings,
        })
    }

    /// Blocking variant of [`save`](Self::save), for shutdown paths without a runtime
    pub fn save_blocking<T: Record>(&self, document: Document, records: &[T]) -> Result<SaveReport> {
        let (content, written, skipped) = encode(document, records)?;

        let kv_result = self.kv.write(document, &content);
        let file_result = self.file.write(document, &content);
        let mut warnings = settle(document, kv_result, file_result)?;

        let found = self.load_blocking::<T>(document).len();
        warnings.extend(verify(document, written, found));

        Ok(SaveReport {
            document,
            written,
            skipped,
            warnings,
        })
    }

    /// Load a document, never failing: missing or corrupt data yields an empty list
    pub async fn load<T: Record>(&self, document: Document) -> Vec<T> {
        let store = self.clone();
        match tokio::task::spawn_blocking(move || store.load_blocking::<T>(document)).await {
            Ok(records) => records,
            Err(e) => {
                log::error!("Loading {} was interrupted: {}", document, e);
                Vec::new()
            }
        }
    }

    pub fn load_blocking<T: Record>(&self, document: Document) -> Vec<T> {
        for backend in [&self.file, &self.kv] {
            if let Some(records) = read_from(backend.as_ref(), document) {
                log::debug!(
                    "Loaded {} {} record(s) from {}",
                    records.len(),
                    T::KIND,
                    backend.kind()
                );
                return records;
            }
        }
        log::info!("No stored {} found, starting empty", document);
        Vec::new()
    }

    /// Overwrite a document with an empty list on both backends
    pub async fn clear(&self, document: Document) -> Result<Vec<ConsistencyWarning>> {
        let (kv_result, file_result) = tokio::join!(
            write_on_pool(Arc::clone(&self.kv), document, EMPTY_DOCUMENT.to_string()),
            write_on_pool(Arc::clone(&self.file), document, EMPTY_DOCUMENT.to_string()),
        );
        let warnings = settle(document, kv_result, file_result)?;
        log::info!("Cleared {}", document);
        Ok(warnings)
    }
}

/// Filter out invalid records and serialize the rest
fn encode<T: Record>(document: Document, records: &[T]) -> Result<(String, usize, usize)> {
    let valid: Vec<&T> = records
        .iter()
        .filter(|record| match record.rejection() {
            Some(reason) => {
                log::warn!("Skipping {} with {} while saving {}", T::KIND, reason, document);
                false
            }
            None => true,
        })
        .collect();
    let skipped = records.len() - valid.len();
    let content = serde_json::to_string_pretty(&valid)?;
    log::debug!("Saving {} {} record(s) to {}", valid.len(), T::KIND, document);
    Ok((content, valid.len(), skipped))
}

async fn write_on_pool(backend: Arc<dyn Backend>, document: Document, content: String) -> Result<()> {
    let kind = backend.kind();
    tokio::task::spawn_blocking(move || backend.write(document, &content))
        .await
        .map_err(|e| InventoryError::Persistence {
            document: document.key(),
            reason: format!("{} write task failed: {}", kind, e),
        })?
}

/// Turn per-backend outcomes into warnings, failing only when both failed
fn settle(
    document: Document,
    kv_result: Result<()>,
    file_result: Result<()>,
) -> Result<Vec<ConsistencyWarning>> {
    match (kv_result, file_result) {
        (Ok(()), Ok(())) => Ok(Vec::new()),
        (Err(kv_err), Err(file_err)) => {
            log::error!("Failed to save {} to either backend", document);
            Err(InventoryError::Persistence {
                document: document.key(),
                reason: format!(
                    "{}: {}; {}: {}",
                    BackendKind::KeyValue,
                    kv_err,
                    BackendKind::File,
                    file_err
                ),
            })
        }
        (Err(e), Ok(())) => Ok(vec![write_failed(document, BackendKind::KeyValue, e)]),
        (Ok(()), Err(e)) => Ok(vec![write_failed(document, BackendKind::File, e)]),
    }
}

fn write_failed(document: Document, backend: BackendKind, err: InventoryError) -> ConsistencyWarning {
    log::warn!("Failed to write {} to {}: {}", document, backend, err);
    ConsistencyWarning::BackendWriteFailed {
        document,
        backend,
        reason: err.to_string(),
    }
}

fn verify(document: Document, expected: usize, found: usize) -> Option<ConsistencyWarning> {
    if expected == found {
        log::debug!("Verified saved {}: {} item(s)", document, found);
        return None;
    }
    log::warn!(
        "{} count mismatch after save: expected {}, got {}",
        document,
        expected,
        found
    );
    Some(ConsistencyWarning::CountMismatch {
        document,
        expected,
        found,
    })
}

/// Read and parse from one backend; `None` means "try the next one"
fn read_from<T: Record>(backend: &dyn Backend, document: Document) -> Option<Vec<T>> {
    let content = match backend.read(document) {
        Ok(Some(content)) => content,
        Ok(None) => return None,
        Err(e) => {
            log::warn!("Failed to read {} from {}: {}", document, backend.kind(), e);
            return None;
        }
    };
    match serde_json::from_str(&content) {
        Ok(records) => Some(records),
        Err(e) => {
            log::warn!("Failed to parse {} from {}: {}", document, backend.kind(), e);
            None
        }
    }
}
