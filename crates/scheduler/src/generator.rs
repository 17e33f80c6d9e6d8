//! Line generation entry points.
//!
//! The watermark (latest closed month) is looked up on every call, so a
//! decision stored right after an accrual run sees the new month at once.

use tracing::info;

use regnskap_core::domain::{Overforingsperiode, VedtakHendelse};
use regnskap_db::repositories::LagretVedtak;
use regnskap_db::{OppdragRepository, PalopRepository};
use regnskap_shared::CallContext;

use crate::error::JobError;

/// Turns decisions into lines and tops up open periods.
#[derive(Debug, Clone)]
pub struct KonteringGenerator {
    oppdrag: OppdragRepository,
    palop: PalopRepository,
}

impl KonteringGenerator {
    /// Creates a generator.
    #[must_use]
    pub const fn new(oppdrag: OppdragRepository, palop: PalopRepository) -> Self {
        Self { oppdrag, palop }
    }

    /// Stores a decision and the lines for its closed months.
    ///
    /// Redelivery of the same decision creates nothing.
    pub async fn behandle_hendelse(
        &self,
        ctx: &CallContext,
        hendelse: &VedtakHendelse,
    ) -> Result<LagretVedtak, JobError> {
        let siste_lukkede = self.palop.siste_lukkede().await?;
        let lagret = self.oppdrag.lagre_vedtak(hendelse, siste_lukkede).await?;

        if lagret.er_uendret() {
            info!(
                sak_id = %hendelse.sak_id,
                vedtak_id = hendelse.vedtak_id,
                correlation_id = %ctx,
                "Decision already stored"
            );
        } else {
            info!(
                sak_id = %hendelse.sak_id,
                vedtak_id = hendelse.vedtak_id,
                oppdrag_id = %lagret.oppdrag_id,
                correlation_id = %ctx,
                nytt_oppdrag = lagret.nytt_oppdrag,
                perioder = lagret.nye_perioder,
                konteringer = lagret.nye_konteringer,
                "Decision stored"
            );
        }
        Ok(lagret)
    }

    /// Creates the missing months of every open period up to `til_og_med`.
    pub async fn fyll_opp(
        &self,
        ctx: &CallContext,
        til_og_med: Overforingsperiode,
    ) -> Result<u64, JobError> {
        let antall = self.oppdrag.fyll_opp_perioder(til_og_med).await?;
        info!(
            periode = %til_og_med,
            konteringer = antall,
            correlation_id = %ctx,
            "Open periods topped up"
        );
        Ok(antall)
    }
}
