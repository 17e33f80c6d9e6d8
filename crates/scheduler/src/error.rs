//! Job errors.

use regnskap_core::eksport::FileError;
use regnskap_core::krav::SkattError;
use regnskap_core::storage::StorageError;
use regnskap_db::{LockError, RepositoryError};
use regnskap_shared::AppError;
use thiserror::Error;

/// Errors that end a job pass.
#[derive(Debug, Error)]
pub enum JobError {
    /// Repository error.
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    /// Lease lock error.
    #[error(transparent)]
    Lock(#[from] LockError),

    /// External ledger error.
    #[error(transparent)]
    Skatt(#[from] SkattError),

    /// Export file error.
    #[error(transparent)]
    File(#[from] FileError),

    /// Storage error.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Stored data that cannot be acted on.
    #[error("Invalid data: {0}")]
    Data(String),
}

impl From<JobError> for AppError {
    fn from(err: JobError) -> Self {
        match err {
            JobError::Repository(RepositoryError::NotFound { entity, id }) => {
                Self::NotFound(format!("{entity} {id}"))
            }
            JobError::Repository(RepositoryError::Conflict(msg)) => Self::Conflict(msg),
            JobError::Repository(e) => Self::Database(e.to_string()),
            JobError::Lock(e) => Self::Database(e.to_string()),
            JobError::Skatt(e) => Self::ExternalService(e.to_string()),
            JobError::File(e) => Self::Internal(e.to_string()),
            JobError::Storage(e) => Self::Internal(e.to_string()),
            JobError::Data(msg) => Self::Internal(msg),
        }
    }
}
