//! Export error types.

use thiserror::Error;

use crate::storage::StorageError;

/// Errors while producing or persisting an export file.
#[derive(Debug, Error)]
pub enum FileError {
    /// Writing to the underlying buffer failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV encoding failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// XML encoding failed.
    #[error("XML error: {0}")]
    Xml(String),

    /// Persisting or delivering the file failed.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

pub(crate) fn xml<E: std::fmt::Display>(e: E) -> FileError {
    FileError::Xml(e.to_string())
}
