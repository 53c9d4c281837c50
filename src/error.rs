//! Error types for scan_inventory

use thiserror::Error;

/// Unified error type for scan_inventory operations
#[derive(Debug, Error)]
pub enum InventoryError {
    /// Input rejected at the boundary (blank name or value, count below 1)
    #[error("Validation error: {0}")]
    Validation(String),
    /// Operation referenced an id that does not exist
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },
    /// File store read or write failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Key-value store operation failed
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
    /// Failed to encode or decode a document
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
    /// Neither backend accepted the write
    #[error("Failed to persist {document}: {reason}")]
    Persistence {
        document: &'static str,
        reason: String,
    },
}

impl InventoryError {
    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        InventoryError::Validation(msg.into())
    }

    pub(crate) fn not_found(kind: &'static str, id: impl ToString) -> Self {
        InventoryError::NotFound {
            kind,
            id: id.to_string(),
        }
    }
}

/// Result alias for scan_inventory operations
pub type Result<T> = std::result::Result<T, InventoryError>;
