//! Delivery of persisted files to the remote SFTP endpoint.

use opendal::{Operator, services};
use tracing::info;

use regnskap_shared::config::SftpConfig;

use super::error::StorageError;
use super::service::{FileStorage, Pipe};

/// Copies persisted files to the SFTP endpoint.
#[derive(Clone)]
pub struct SftpLevering {
    operator: Operator,
    endpoint: String,
}

impl SftpLevering {
    /// Create delivery from endpoint config.
    ///
    /// # Errors
    ///
    /// Returns an error if the operator cannot be built.
    pub fn from_config(config: &SftpConfig) -> Result<Self, StorageError> {
        let builder = services::Sftp::default()
            .endpoint(&config.endpoint)
            .user(&config.user)
            .key(&config.key_path)
            .root(&config.root);

        let operator = Operator::new(builder)
            .map_err(|e| StorageError::configuration(e.to_string()))?
            .finish();

        operator.pipe(|operator| {
            Ok(Self {
                operator,
                endpoint: config.endpoint.clone(),
            })
        })
    }

    /// Reads `key` from storage and writes it under the same name remotely.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or transferred.
    pub async fn lever(&self, storage: &FileStorage, key: &str) -> Result<(), StorageError> {
        let bytes = storage.read(key).await?;
        let size = bytes.len();
        let remote = key.rsplit('/').next().unwrap_or(key);
        self.operator
            .write(remote, bytes)
            .await
            .map_err(|e| StorageError::Levering {
                key: key.to_string(),
                endpoint: self.endpoint.clone(),
                reason: e.to_string(),
            })?;
        info!(key, remote, size, endpoint = %self.endpoint, "File delivered");
        Ok(())
    }
}
