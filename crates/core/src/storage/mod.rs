//! Durable file storage and remote delivery using Apache OpenDAL.
//!
//! Export files are persisted first and delivered second. The persisted copy
//! is authoritative; a failed delivery can be repeated from it.
//!
//! Supported providers:
//! - S3-compatible: Cloudflare R2, Supabase Storage, AWS S3, DigitalOcean Spaces
//! - Azure Blob Storage
//! - Local filesystem (development only)
//!
//! Delivery goes to an SFTP endpoint.

mod error;
mod levering;
mod service;

pub use error::StorageError;
pub use levering::SftpLevering;
pub use service::{FilSkriver, FileStorage};
