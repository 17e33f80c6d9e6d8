//! Operational alerting over SMTP.
//!
//! Uses `lettre` for SMTP transport. Alerts are plain text emails to the
//! configured recipients; a missing recipient list turns alerts into log lines.

use lettre::{
    message::header::ContentType, transport::smtp::authentication::Credentials, AsyncSmtpTransport,
    AsyncTransport, Message, Tokio1Executor,
};
use thiserror::Error;

use crate::config::EmailConfig;

/// Alert delivery errors.
#[derive(Debug, Error)]
pub enum AlertError {
    /// Failed to build email message.
    #[error("Failed to build alert email: {0}")]
    BuildError(String),
    /// Failed to send email.
    #[error("Failed to send alert email: {0}")]
    SendError(String),
    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),
}

/// Sends operational alerts to the on-call mailbox.
#[derive(Clone)]
pub struct AlertService {
    config: EmailConfig,
    environment: String,
}

impl AlertService {
    /// Creates a new alert service.
    #[must_use]
    pub fn new(config: EmailConfig, environment: impl Into<String>) -> Self {
        Self {
            config,
            environment: environment.into(),
        }
    }

    /// Creates an SMTP transport.
    fn create_transport(&self) -> Result<AsyncSmtpTransport<Tokio1Executor>, AlertError> {
        let creds = Credentials::new(
            self.config.smtp_username.clone(),
            self.config.smtp_password.clone(),
        );

        AsyncSmtpTransport::<Tokio1Executor>::relay(&self.config.smtp_host)
            .map_err(|e| AlertError::SendError(e.to_string()))?
            .port(self.config.smtp_port)
            .credentials(creds)
            .build()
            .pipe(Ok)
    }

    /// Formats the subject line, tagged with the environment.
    #[must_use]
    pub fn subject(&self, title: &str) -> String {
        format!("[regnskap {}] {title}", self.environment)
    }

    /// Sends an alert to every configured recipient.
    ///
    /// # Errors
    ///
    /// Returns an error if any message cannot be built or sent.
    pub async fn send_alert(&self, title: &str, body: &str) -> Result<(), AlertError> {
        if self.config.alert_recipients.is_empty() {
            tracing::warn!(title, body, "No alert recipients configured, alert only logged");
            return Ok(());
        }

        let subject = self.subject(title);
        let from = format!("{} <{}>", self.config.from_name, self.config.from_email);
        let transport = self.create_transport()?;

        for recipient in &self.config.alert_recipients {
            let email = Message::builder()
                .from(
                    from.parse()
                        .map_err(|e| AlertError::InvalidAddress(format!("{e}")))?,
                )
                .to(recipient
                    .parse()
                    .map_err(|e| AlertError::InvalidAddress(format!("{e}")))?)
                .subject(subject.as_str())
                .header(ContentType::TEXT_PLAIN)
                .body(body.to_string())
                .map_err(|e| AlertError::BuildError(e.to_string()))?;

            transport
                .send(email)
                .await
                .map_err(|e| AlertError::SendError(e.to_string()))?;
        }

        tracing::info!(title, recipients = self.config.alert_recipients.len(), "Alert sent");
        Ok(())
    }
}

/// Pipe trait for fluent API.
trait Pipe: Sized {
    fn pipe<F, R>(self, f: F) -> R
    where
        F: FnOnce(Self) -> R,
    {
        f(self)
    }
}

impl<T> Pipe for T {}
