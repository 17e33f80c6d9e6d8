//! Durable storage for export files.

use opendal::{ErrorKind, Operator, Writer, services};
use tracing::debug;

use regnskap_shared::config::StorageProvider;

use super::error::StorageError;

/// Durable storage for export files.
#[derive(Clone)]
pub struct FileStorage {
    operator: Operator,
    provider_name: &'static str,
}

impl FileStorage {
    /// Create storage from provider config.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage provider cannot be initialized.
    pub fn from_provider(provider: &StorageProvider) -> Result<Self, StorageError> {
        let operator = Self::create_operator(provider)?;
        Ok(Self {
            operator,
            provider_name: provider.name(),
        })
    }

    /// Create OpenDAL operator from provider config.
    fn create_operator(provider: &StorageProvider) -> Result<Operator, StorageError> {
        match provider {
            StorageProvider::S3 {
                endpoint,
                bucket,
                access_key_id,
                secret_access_key,
                region,
            } => {
                let builder = services::S3::default()
                    .endpoint(endpoint)
                    .bucket(bucket)
                    .access_key_id(access_key_id)
                    .secret_access_key(secret_access_key)
                    .region(region);

                Operator::new(builder)
                    .map_err(|e| StorageError::configuration(e.to_string()))?
                    .finish()
                    .pipe(Ok)
            }
            StorageProvider::AzureBlob {
                account,
                access_key,
                container,
            } => {
                let builder = services::Azblob::default()
                    .account_name(account)
                    .account_key(access_key)
                    .container(container);

                Operator::new(builder)
                    .map_err(|e| StorageError::configuration(e.to_string()))?
                    .finish()
                    .pipe(Ok)
            }
            StorageProvider::LocalFs { root } => {
                let builder = services::Fs::default().root(
                    root.to_str()
                        .ok_or_else(|| StorageError::configuration("invalid path"))?,
                );

                Operator::new(builder)
                    .map_err(|e| StorageError::configuration(e.to_string()))?
                    .finish()
                    .pipe(Ok)
            }
        }
    }

    /// Writes a whole file.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub async fn write(&self, key: &str, bytes: Vec<u8>) -> Result<(), StorageError> {
        let size = bytes.len();
        self.operator.write(key, bytes).await?;
        debug!(key, size, provider = self.provider_name, "File stored");
        Ok(())
    }

    /// Opens a streaming writer. The file appears when the writer is closed.
    ///
    /// # Errors
    ///
    /// Returns an error if the writer cannot be opened.
    pub async fn writer(&self, key: &str) -> Result<FilSkriver, StorageError> {
        let writer = self.operator.writer(key).await?;
        Ok(FilSkriver {
            key: key.to_string(),
            writer,
            bytes: 0,
        })
    }

    /// Reads a whole file.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the file does not exist.
    pub async fn read(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        match self.operator.read(key).await {
            Ok(buffer) => Ok(buffer.to_vec()),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StorageError::not_found(key)),
            Err(e) => Err(e.into()),
        }
    }

    /// Check if a file exists in storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider cannot be reached.
    pub async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        match self.operator.stat(key).await {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Get the storage provider name.
    #[must_use]
    pub fn provider_name(&self) -> &'static str {
        self.provider_name
    }
}

/// Streaming writer for one stored file.
pub struct FilSkriver {
    key: String,
    writer: Writer,
    bytes: u64,
}

impl FilSkriver {
    /// Appends a chunk.
    ///
    /// # Errors
    ///
    /// Returns an error if the chunk cannot be written.
    pub async fn skriv(&mut self, chunk: Vec<u8>) -> Result<(), StorageError> {
        if chunk.is_empty() {
            return Ok(());
        }
        self.bytes += chunk.len() as u64;
        self.writer.write(chunk).await?;
        Ok(())
    }

    /// Completes the file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be committed.
    pub async fn lukk(mut self) -> Result<u64, StorageError> {
        self.writer.close().await?;
        debug!(key = %self.key, size = self.bytes, "Streamed file stored");
        Ok(self.bytes)
    }
}

/// Extension trait for pipe operator.
pub(super) trait Pipe: Sized {
    fn pipe<F, R>(self, f: F) -> R
    where
        F: FnOnce(Self) -> R,
    {
        f(self)
    }
}

impl<T> Pipe for T {}

#[cfg(test)]
mod tests {
    use super::*;

    fn local(name: &str) -> FileStorage {
        let root = std::env::temp_dir().join(format!("regnskap-{name}-{}", uuid::Uuid::new_v4()));
        FileStorage::from_provider(&StorageProvider::local_fs(root)).expect("should create storage")
    }

    #[test]
    fn test_provider_name() {
        assert_eq!(local("name").provider_name(), "local");
    }

    #[tokio::test]
    async fn test_write_read_exists() {
        let storage = local("rw");
        let key = "avstemming/2024/03/avstemming_detaljer_20240305.csv";

        assert!(!storage.exists(key).await.unwrap());
        storage.write(key, b"B1;1\n".to_vec()).await.unwrap();
        assert!(storage.exists(key).await.unwrap());
        assert_eq!(storage.read(key).await.unwrap(), b"B1;1\n");
    }

    #[tokio::test]
    async fn test_read_missing_file() {
        let err = local("missing").read("nope.csv").await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_streamed_file() {
        let storage = local("stream");
        let mut writer = storage.writer("palop/palop_2023-02_x.xml").await.unwrap();
        writer.skriv(b"<palop>".to_vec()).await.unwrap();
        writer.skriv(Vec::new()).await.unwrap();
        writer.skriv(b"</palop>".to_vec()).await.unwrap();
        assert_eq!(writer.lukk().await.unwrap(), 15);

        assert_eq!(
            storage.read("palop/palop_2023-02_x.xml").await.unwrap(),
            b"<palop></palop>"
        );
    }
}
