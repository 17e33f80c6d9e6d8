//! Repository error types.

use sea_orm::DbErr;
use uuid::Uuid;

/// Errors from repository operations.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    /// Row not found.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Entity name.
        entity: &'static str,
        /// Requested id.
        id: Uuid,
    },

    /// A stored value could not be read back into a domain type.
    #[error("Invalid stored value in {column}: {value}")]
    InvalidData {
        /// Column name.
        column: &'static str,
        /// The offending value.
        value: String,
    },

    /// The request conflicts with stored state.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
}

impl RepositoryError {
    pub(crate) fn invalid(column: &'static str, value: impl Into<String>) -> Self {
        Self::InvalidData {
            column,
            value: value.into(),
        }
    }
}
