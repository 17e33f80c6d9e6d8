//! Daily reconciliation export.
//!
//! Each pass exports every day in the last week that has no summary file
//! yet, oldest first. The summary is written last and marks a day done.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, error, info};

use regnskap_core::eksport::{
    AvstemmingWriter, Summering, detaljer_filnavn, skriv_summering, summering_filnavn,
};
use regnskap_core::storage::{FileStorage, SftpLevering};
use regnskap_shared::CallContext;

use super::Job;
use crate::error::JobError;
use crate::lager::{AvstemmingKilde, Varsling, varsle_eller_logg};
use crate::tid::{avstemmingsdatoer, dagsgrenser, oslo_dato};

const SIDE: u64 = 5_000;

/// How many days back a missed export is caught up.
pub const AVSTEMMING_DAGER: u32 = 7;

/// Writes the transmitted lines of each finished day and their per-code totals.
pub struct AvstemmingJob {
    kilde: Arc<dyn AvstemmingKilde>,
    storage: FileStorage,
    levering: Option<SftpLevering>,
    varsling: Arc<dyn Varsling>,
    side: u64,
}

impl AvstemmingJob {
    /// Creates the job.
    #[must_use]
    pub fn new(
        kilde: Arc<dyn AvstemmingKilde>,
        storage: FileStorage,
        levering: Option<SftpLevering>,
        varsling: Arc<dyn Varsling>,
    ) -> Self {
        Self {
            kilde,
            storage,
            levering,
            varsling,
            side: SIDE,
        }
    }

    /// Exports one day.
    async fn eksporter(
        &self,
        ctx: &CallContext,
        dato: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<Summering, JobError> {
        let (fra, til) = dagsgrenser(dato)
            .ok_or_else(|| JobError::Data(format!("no local day bounds for {dato}")))?;

        let mut writer = AvstemmingWriter::new(Vec::new(), oslo_dato(now));
        let mut etter = None;
        loop {
            let side = self.kilde.overfort_side(fra, til, etter, self.side).await?;
            for rad in &side {
                writer.skriv(&rad.til_avstemming()?)?;
            }
            let Some(siste) = side.last() else {
                break;
            };
            if (side.len() as u64) < self.side {
                break;
            }
            let tidspunkt = siste
                .overforingstidspunkt
                .ok_or_else(|| JobError::Data(format!("kontering {} has no transmission time", siste.id)))?;
            etter = Some((tidspunkt.with_timezone(&Utc), siste.id));
        }
        let (detaljer, summering) = writer.ferdig()?;

        let mut oppsummering = Vec::new();
        skriv_summering(&mut oppsummering, &summering)?;

        let detaljer_key = detaljer_filnavn(dato);
        let summering_key = summering_filnavn(dato);
        self.storage.write(&detaljer_key, detaljer).await?;
        self.storage.write(&summering_key, oppsummering).await?;

        if let Some(levering) = &self.levering {
            for key in [&detaljer_key, &summering_key] {
                if let Err(e) = levering.lever(&self.storage, key).await {
                    error!(key = %key, correlation_id = %ctx, error = %e, "Reconciliation delivery failed");
                    varsle_eller_logg(
                        self.varsling.as_ref(),
                        &format!("Overføring av avstemmingsfil feilet {dato}"),
                        &format!("{key}: {e}"),
                    )
                    .await;
                }
            }
        }

        Ok(summering)
    }

    async fn pass(&self, ctx: &CallContext, now: DateTime<Utc>) -> Result<(), JobError> {
        for dato in avstemmingsdatoer(now, AVSTEMMING_DAGER) {
            if self.storage.exists(&summering_filnavn(dato)).await? {
                debug!(%dato, "Reconciliation already exported");
                continue;
            }

            match self.eksporter(ctx, dato, now).await {
                Ok(summering) => info!(
                    %dato,
                    antall = summering.antall,
                    total = %summering.total,
                    correlation_id = %ctx,
                    "Reconciliation exported"
                ),
                Err(e) => {
                    error!(%dato, correlation_id = %ctx, error = %e, "Reconciliation export failed");
                    varsle_eller_logg(
                        self.varsling.as_ref(),
                        &format!("Avstemming feilet {dato}"),
                        &e.to_string(),
                    )
                    .await;
                    return Err(e);
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Job for AvstemmingJob {
    fn name(&self) -> &'static str {
        "avstemming"
    }

    async fn run(&self, ctx: &CallContext) -> Result<(), JobError> {
        self.pass(ctx, Utc::now()).await
    }
}
