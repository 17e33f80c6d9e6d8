//! Application configuration management.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Deployment environment name (`dev`, `prod`, ...).
    #[serde(default = "default_environment")]
    pub environment: String,
    /// Server configuration.
    pub server: ServerConfig,
    /// Database configuration.
    pub database: DatabaseConfig,
    /// External ledger (Skatt) client configuration.
    pub skatt: SkattConfig,
    /// Durable file storage.
    pub storage: StorageProvider,
    /// Remote delivery endpoint for exported files. Delivery is disabled when absent.
    #[serde(default)]
    pub sftp: Option<SftpConfig>,
    /// SMTP settings used for operational alerts.
    #[serde(default)]
    pub email: EmailConfig,
    /// Scheduled job settings.
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

fn default_environment() -> String {
    "dev".to_string()
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Database connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

/// External ledger client configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SkattConfig {
    /// Base URL of the claim API.
    pub base_url: String,
    /// Request timeout in seconds.
    #[serde(default = "default_skatt_timeout")]
    pub timeout_secs: u64,
    /// Retries after the first attempt for transient failures.
    #[serde(default = "default_skatt_retries")]
    pub max_retries: u32,
    /// First backoff interval in milliseconds.
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,
    /// Upper bound for the backoff interval in milliseconds.
    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,
}

fn default_skatt_timeout() -> u64 {
    30
}

fn default_skatt_retries() -> u32 {
    3
}

fn default_initial_backoff() -> u64 {
    500
}

fn default_max_backoff() -> u64 {
    5_000
}

/// Storage provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StorageProvider {
    /// S3-compatible storage: Cloudflare R2, Supabase, AWS S3, DigitalOcean Spaces
    S3 {
        /// S3 endpoint URL.
        endpoint: String,
        /// S3 bucket name.
        bucket: String,
        /// AWS access key ID.
        access_key_id: String,
        /// AWS secret access key.
        secret_access_key: String,
        /// AWS region.
        region: String,
    },
    /// Azure Blob Storage
    AzureBlob {
        /// Azure storage account name.
        account: String,
        /// Azure storage access key.
        access_key: String,
        /// Azure container name.
        container: String,
    },
    /// Local filesystem (development only)
    LocalFs {
        /// Root directory path.
        root: PathBuf,
    },
}

impl StorageProvider {
    /// Create local filesystem provider (development only).
    #[must_use]
    pub fn local_fs(root: impl Into<PathBuf>) -> Self {
        Self::LocalFs { root: root.into() }
    }

    /// Get the provider name used in logs.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::S3 { .. } => "s3",
            Self::AzureBlob { .. } => "azure_blob",
            Self::LocalFs { .. } => "local",
        }
    }
}

/// Remote SFTP endpoint that receives exported files.
#[derive(Debug, Clone, Deserialize)]
pub struct SftpConfig {
    /// `host:port` of the endpoint.
    pub endpoint: String,
    /// Login user.
    pub user: String,
    /// Path to the private key file.
    pub key_path: String,
    /// Remote directory files are written to.
    #[serde(default = "default_sftp_root")]
    pub root: String,
}

fn default_sftp_root() -> String {
    "/inbound".to_string()
}

/// SMTP configuration for alert emails.
#[derive(Debug, Clone, Deserialize)]
pub struct EmailConfig {
    /// SMTP relay host.
    pub smtp_host: String,
    /// SMTP port.
    pub smtp_port: u16,
    /// SMTP username.
    pub smtp_username: String,
    /// SMTP password.
    pub smtp_password: String,
    /// Sender address.
    pub from_email: String,
    /// Sender display name.
    pub from_name: String,
    /// Addresses receiving operational alerts.
    #[serde(default)]
    pub alert_recipients: Vec<String>,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            smtp_host: "localhost".to_string(),
            smtp_port: 1025,
            smtp_username: String::new(),
            smtp_password: String::new(),
            from_email: "regnskap@localhost".to_string(),
            from_name: "Regnskap".to_string(),
            alert_recipients: Vec::new(),
        }
    }
}

/// Cadence and lease settings for one scheduled job.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
pub struct JobSchedule {
    /// Whether the job runs on this instance at all.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Seconds between passes.
    pub interval_secs: u64,
    /// Lease expiry if the holder crashes.
    pub lock_at_most_secs: u64,
    /// Minimum lease hold, so a fast pass is not repeated by another replica.
    pub lock_at_least_secs: u64,
}

fn default_enabled() -> bool {
    true
}

impl JobSchedule {
    const fn every(interval_secs: u64, lock_at_most_secs: u64, lock_at_least_secs: u64) -> Self {
        Self {
            enabled: true,
            interval_secs,
            lock_at_most_secs,
            lock_at_least_secs,
        }
    }
}

/// Settings for all scheduled jobs.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Krav transmission.
    #[serde(default = "default_send_krav")]
    pub send_krav: JobSchedule,
    /// Behandlingsstatus polling.
    #[serde(default = "default_behandlingsstatus")]
    pub behandlingsstatus: JobSchedule,
    /// Resend of unconfirmed lines.
    #[serde(default = "default_resend_krav")]
    pub resend_krav: JobSchedule,
    /// Daily reconciliation export.
    #[serde(default = "default_avstemming")]
    pub avstemming: JobSchedule,
    /// Accrual run.
    #[serde(default = "default_palop")]
    pub palop: JobSchedule,
}

fn default_send_krav() -> JobSchedule {
    JobSchedule::every(60, 600, 10)
}

fn default_behandlingsstatus() -> JobSchedule {
    JobSchedule::every(300, 600, 30)
}

fn default_resend_krav() -> JobSchedule {
    JobSchedule::every(1_800, 600, 60)
}

fn default_avstemming() -> JobSchedule {
    JobSchedule::every(900, 1_800, 60)
}

fn default_palop() -> JobSchedule {
    JobSchedule::every(600, 7_200, 60)
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            send_krav: default_send_krav(),
            behandlingsstatus: default_behandlingsstatus(),
            resend_krav: default_resend_krav(),
            avstemming: default_avstemming(),
            palop: default_palop(),
        }
    }
}

impl AppConfig {
    /// Loads configuration from environment and config files.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded.
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(config::Environment::with_prefix("REGNSKAP").separator("__"))
            .build()?;

        config.try_deserialize()
    }

    /// Returns true when running in production.
    #[must_use]
    pub fn is_prod(&self) -> bool {
        self.environment.eq_ignore_ascii_case("prod")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_from_environment() {
        temp_env::with_vars(
            [
                ("REGNSKAP__ENVIRONMENT", Some("prod")),
                ("REGNSKAP__SERVER__PORT", Some("9090")),
                ("REGNSKAP__DATABASE__URL", Some("postgres://localhost/regnskap")),
                ("REGNSKAP__SKATT__BASE_URL", Some("http://skatt.local")),
                ("REGNSKAP__STORAGE__TYPE", Some("local_fs")),
                ("REGNSKAP__STORAGE__ROOT", Some("/tmp/regnskap")),
            ],
            || {
                let config = AppConfig::load().unwrap();
                assert!(config.is_prod());
                assert_eq!(config.server.port, 9090);
                assert_eq!(config.server.host, "0.0.0.0");
                assert_eq!(config.skatt.max_retries, 3);
                assert_eq!(config.storage.name(), "local");
                assert!(config.sftp.is_none());
                assert_eq!(config.scheduler, SchedulerConfig::default());
            },
        );
    }

    #[test]
    fn test_scheduler_defaults() {
        let config = SchedulerConfig::default();
        assert_eq!(config.send_krav.interval_secs, 60);
        assert!(config.send_krav.lock_at_least_secs < config.send_krav.lock_at_most_secs);
        assert!(config.palop.enabled);
    }

    #[test]
    fn test_email_config_default() {
        let config = EmailConfig::default();
        assert_eq!(config.smtp_host, "localhost");
        assert_eq!(config.smtp_port, 1025);
        assert!(config.alert_recipients.is_empty());
    }
}
