//! Shared types, errors, and configuration for the regnskap service.
//!
//! This crate provides common types used across all other crates:
//! - The currency of decided amounts
//! - Typed IDs for type-safe entity references
//! - An explicit call context carrying the correlation id
//! - Application-wide error types
//! - Configuration management
//! - Operational alerting over SMTP

pub mod alert;
pub mod config;
pub mod context;
pub mod error;
pub mod types;

pub use alert::{AlertError, AlertService};
pub use config::AppConfig;
pub use context::CallContext;
pub use error::{AppError, AppResult};
