//! Krav transmission.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, error};
use uuid::Uuid;

use regnskap_core::krav::{KravKandidat, SkattKlient, er_kvalifisert, group_by_sak, send_grupper};
use regnskap_core::metrics::MetricsReporter;
use regnskap_db::KonteringRepository;
use regnskap_db::repositories::KonteringRad;
use regnskap_shared::CallContext;

use super::Job;
use crate::error::JobError;
use crate::tid::oslo_dato;

/// Sends eligible unsent lines, one request per case.
pub struct SendKravJob {
    konteringer: KonteringRepository,
    klient: Arc<dyn SkattKlient>,
    metrics: Arc<dyn MetricsReporter>,
}

impl SendKravJob {
    /// Creates the job.
    #[must_use]
    pub fn new(
        konteringer: KonteringRepository,
        klient: Arc<dyn SkattKlient>,
        metrics: Arc<dyn MetricsReporter>,
    ) -> Self {
        Self {
            konteringer,
            klient,
            metrics,
        }
    }
}

/// Keeps lines that are past the grace window and not deferred, in input order.
///
/// Lines whose stored codes cannot be read are logged and left behind.
#[must_use]
pub fn velg_kandidater(
    rader: &[KonteringRad],
    now: DateTime<Utc>,
    today: NaiveDate,
) -> Vec<KravKandidat> {
    rader
        .iter()
        .filter(|rad| er_kvalifisert(&rad.kvalifisering(), now, today))
        .filter_map(|rad| match rad.til_kandidat() {
            Ok(kandidat) => Some(kandidat),
            Err(e) => {
                error!(kontering_id = %rad.id, sak_id = %rad.sak_id, error = %e, "Unreadable line skipped");
                None
            }
        })
        .collect()
}

#[async_trait]
impl Job for SendKravJob {
    fn name(&self) -> &'static str {
        "send_krav"
    }

    fn mot_skatt(&self) -> bool {
        true
    }

    async fn run(&self, ctx: &CallContext) -> Result<(), JobError> {
        let now = Utc::now();
        let rader = self.konteringer.usendte().await?;
        let kandidater = velg_kandidater(&rader, now, oslo_dato(now));
        if kandidater.is_empty() {
            debug!(job = self.name(), correlation_id = %ctx, "No eligible lines");
            self.metrics.konteringer_sendt(0);
            return Ok(());
        }

        let grupper = group_by_sak(kandidater);
        let resultater = send_grupper(self.klient.as_ref(), ctx, grupper).await;

        let mut sendt = 0;
        for resultat in resultater {
            let Ok(batch_uid) = &resultat.utfall else {
                continue;
            };
            let ids: Vec<Uuid> = resultat
                .request
                .kontering_ids()
                .map(|id| id.into_inner())
                .collect();
            match self
                .konteringer
                .marker_sendt(&ids, batch_uid.as_str(), Utc::now())
                .await
            {
                Ok(antall) => sendt += antall,
                Err(e) => error!(
                    sak_id = %resultat.request.sak_id,
                    batch_uid = %batch_uid,
                    correlation_id = %ctx,
                    error = %e,
                    "Krav accepted but not recorded"
                ),
            }
        }

        self.metrics.konteringer_sendt(sendt);
        Ok(())
    }
}
