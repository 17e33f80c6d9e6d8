//! What the jobs need from storage, locking and alerting.
//!
//! Each trait is implemented by the matching repository or service, so the
//! jobs can be driven against mocks in tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::error;
use uuid::Uuid;

use regnskap_core::behandlingsstatus::FeilrapportLinje;
use regnskap_db::entities::palop;
use regnskap_db::repositories::{FeiletBatch, KonteringRad, NyttDriftsavvik};
use regnskap_db::{
    DriftsavvikRepository, FeilrapportRepository, KonteringRepository, LeaseLock, LockError,
    PalopRepository, RepositoryError,
};
use regnskap_shared::{AlertError, AlertService};

/// Sent batches awaiting a status.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BatchLager: Send + Sync {
    /// Batch references with sent, unconfirmed lines.
    async fn ubekreftede_batcher(&self) -> Result<Vec<String>, RepositoryError>;

    /// Confirms every line of a batch.
    async fn bekreft_batch(&self, batch_uid: &str, now: DateTime<Utc>)
    -> Result<u64, RepositoryError>;

    /// Flags the obligations of a batch as failed.
    async fn marker_batch_feilet(&self, batch_uid: &str) -> Result<FeiletBatch, RepositoryError>;
}

#[async_trait]
impl BatchLager for KonteringRepository {
    async fn ubekreftede_batcher(&self) -> Result<Vec<String>, RepositoryError> {
        Self::ubekreftede_batcher(self).await
    }

    async fn bekreft_batch(
        &self,
        batch_uid: &str,
        now: DateTime<Utc>,
    ) -> Result<u64, RepositoryError> {
        Self::bekreft_batch(self, batch_uid, now).await
    }

    async fn marker_batch_feilet(&self, batch_uid: &str) -> Result<FeiletBatch, RepositoryError> {
        Self::marker_batch_feilet(self, batch_uid).await
    }
}

/// Failed batches waiting for the morning report.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FeilrapportLager: Send + Sync {
    /// Records a failed batch.
    async fn lagre(&self, linje: &FeilrapportLinje) -> Result<Uuid, RepositoryError>;

    /// Entries not yet reported, oldest first.
    async fn urapporterte(&self) -> Result<Vec<(Uuid, FeilrapportLinje)>, RepositoryError>;

    /// Stamps entries as reported.
    async fn marker_rapportert(&self, ids: &[Uuid], now: DateTime<Utc>)
    -> Result<u64, RepositoryError>;
}

#[async_trait]
impl FeilrapportLager for FeilrapportRepository {
    async fn lagre(&self, linje: &FeilrapportLinje) -> Result<Uuid, RepositoryError> {
        Self::lagre(self, linje).await
    }

    async fn urapporterte(&self) -> Result<Vec<(Uuid, FeilrapportLinje)>, RepositoryError> {
        Self::urapporterte(self).await
    }

    async fn marker_rapportert(
        &self,
        ids: &[Uuid],
        now: DateTime<Utc>,
    ) -> Result<u64, RepositoryError> {
        Self::marker_rapportert(self, ids, now).await
    }
}

/// Transmitted lines read by the reconciliation export.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AvstemmingKilde: Send + Sync {
    /// One page of lines transmitted in `[fra, til)` after the key `etter`.
    async fn overfort_side(
        &self,
        fra: DateTime<Utc>,
        til: DateTime<Utc>,
        etter: Option<(DateTime<Utc>, Uuid)>,
        limit: u64,
    ) -> Result<Vec<KonteringRad>, RepositoryError>;
}

#[async_trait]
impl AvstemmingKilde for KonteringRepository {
    async fn overfort_side(
        &self,
        fra: DateTime<Utc>,
        til: DateTime<Utc>,
        etter: Option<(DateTime<Utc>, Uuid)>,
        limit: u64,
    ) -> Result<Vec<KonteringRad>, RepositoryError> {
        self.overfort_mellom(fra, til, etter, limit).await
    }
}

/// Accrual run schedule.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PalopLager: Send + Sync {
    /// The earliest unfinished run that is due.
    async fn neste_ventende(&self, now: DateTime<Utc>)
    -> Result<Option<palop::Model>, RepositoryError>;

    /// The earliest run scheduled after `now`.
    async fn neste_fremtidige(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Option<palop::Model>, RepositoryError>;

    /// Stamps the start time.
    async fn marker_startet(&self, id: Uuid, now: DateTime<Utc>) -> Result<(), RepositoryError>;

    /// Stamps the finish time.
    async fn marker_fullfort(&self, id: Uuid, now: DateTime<Utc>) -> Result<(), RepositoryError>;
}

#[async_trait]
impl PalopLager for PalopRepository {
    async fn neste_ventende(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Option<palop::Model>, RepositoryError> {
        Self::neste_ventende(self, now).await
    }

    async fn neste_fremtidige(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Option<palop::Model>, RepositoryError> {
        Self::neste_fremtidige(self, now).await
    }

    async fn marker_startet(&self, id: Uuid, now: DateTime<Utc>) -> Result<(), RepositoryError> {
        Self::marker_startet(self, id, now).await.map(|_| ())
    }

    async fn marker_fullfort(&self, id: Uuid, now: DateTime<Utc>) -> Result<(), RepositoryError> {
        Self::marker_fullfort(self, id, now).await.map(|_| ())
    }
}

/// Outage declarations made by the accrual run.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DriftsavvikLager: Send + Sync {
    /// Declares an outage and returns its id.
    async fn opprett(&self, nytt: NyttDriftsavvik) -> Result<Uuid, RepositoryError>;

    /// Closes an outage at `now`.
    async fn avslutt(&self, id: Uuid, now: DateTime<Utc>) -> Result<(), RepositoryError>;
}

#[async_trait]
impl DriftsavvikLager for DriftsavvikRepository {
    async fn opprett(&self, nytt: NyttDriftsavvik) -> Result<Uuid, RepositoryError> {
        Self::opprett(self, nytt).await.map(|m| m.id)
    }

    async fn avslutt(&self, id: Uuid, now: DateTime<Utc>) -> Result<(), RepositoryError> {
        Self::avslutt(self, id, now).await.map(|_| ())
    }
}

/// Once-per-window ownership shared by all instances.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Engangslaas: Send + Sync {
    /// Whether this instance won `navn` until `til`.
    async fn vinn_til(&self, navn: &str, til: DateTime<Utc>) -> Result<bool, LockError>;
}

#[async_trait]
impl Engangslaas for LeaseLock {
    async fn vinn_til(&self, navn: &str, til: DateTime<Utc>) -> Result<bool, LockError> {
        self.try_acquire_until(navn, til).await
    }
}

/// Operational alerts.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Varsling: Send + Sync {
    /// Delivers one alert.
    async fn varsle(&self, tittel: &str, tekst: &str) -> Result<(), AlertError>;
}

#[async_trait]
impl Varsling for AlertService {
    async fn varsle(&self, tittel: &str, tekst: &str) -> Result<(), AlertError> {
        self.send_alert(tittel, tekst).await
    }
}

/// Sends an alert and logs instead of failing when delivery does not work.
pub async fn varsle_eller_logg(varsling: &dyn Varsling, tittel: &str, tekst: &str) {
    if let Err(e) = varsling.varsle(tittel, tekst).await {
        error!(error = %e, tittel, tekst, "Could not deliver alert");
    }
}
