//! External ledger capabilities.

use std::fmt;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use regnskap_shared::CallContext;

use super::types::{BatchUid, KravKontering, KravRequest};

/// Errors from the external ledger.
#[derive(Debug, Error)]
pub enum SkattError {
    /// Timeout, connection failure or server error. Worth retrying.
    #[error("Transient failure calling Skatt: {0}")]
    Transient(String),

    /// The request was rejected. Retrying it unchanged will not help.
    #[error("Skatt rejected the request with status {status}: {message}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Response body or reason.
        message: String,
    },

    /// The response could not be read.
    #[error("Unexpected response from Skatt: {0}")]
    InvalidResponse(String),
}

impl SkattError {
    /// Whether another attempt may succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// A validation error on one line of a failed batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Linjefeil {
    /// Case id of the rejected line.
    pub sak_id: String,
    /// Transaction code of the rejected line.
    pub transaksjonskode: String,
    /// Accounting month of the rejected line.
    pub periode: String,
    /// Reason given by the ledger.
    pub feilmelding: String,
}

impl fmt::Display for Linjefeil {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {}: {}",
            self.sak_id, self.transaksjonskode, self.periode, self.feilmelding
        )
    }
}

/// Processing status of a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "PascalCase")]
pub enum Behandlingsstatus {
    /// Every line was accepted.
    Ferdig,
    /// At least one line was rejected.
    Feilet {
        /// Rejected lines.
        #[serde(default)]
        feil: Vec<Linjefeil>,
    },
    /// Still being processed.
    Mottatt,
}

/// Outcome of comparing lines against the ledger mirror.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReskontroSammenligning {
    /// Lines found in the ledger despite the failed status.
    pub funnet: usize,
    /// Lines missing from the ledger.
    pub mangler: usize,
    /// Difference between local and ledger totals.
    pub differanse: Decimal,
}

/// The external ledger as seen by the scheduled jobs.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SkattKlient: Send + Sync {
    /// Submits one batch and returns its reference.
    async fn send_krav(
        &self,
        ctx: &CallContext,
        request: &KravRequest,
    ) -> Result<BatchUid, SkattError>;

    /// Fetches the processing status of a batch.
    async fn hent_behandlingsstatus(
        &self,
        ctx: &CallContext,
        batch_uid: &BatchUid,
    ) -> Result<Behandlingsstatus, SkattError>;

    /// Compares lines against the ledger mirror. Diagnostic only.
    async fn sammenlign_med_reskontro(
        &self,
        ctx: &CallContext,
        sak_id: &str,
        konteringer: &[KravKontering],
    ) -> Result<ReskontroSammenligning, SkattError>;

    /// Whether the ledger has announced maintenance.
    async fn er_vedlikeholdsmodus(&self, ctx: &CallContext) -> Result<bool, SkattError>;
}
