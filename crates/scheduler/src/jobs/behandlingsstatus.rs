//! Batch status polling and the daily failure report.
//!
//! A failed batch is compared with the ledger mirror and recorded as soon as
//! the failure is seen. The morning pass reports every entry not yet sent.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use regnskap_core::behandlingsstatus::{
    FeilrapportLinje, Feilrapport, i_varslingsvindu, varslingsvindu_slutt,
};
use regnskap_core::krav::{BatchUid, Behandlingsstatus, Linjefeil, SkattKlient};
use regnskap_core::metrics::MetricsReporter;
use regnskap_db::repositories::FeiletBatch;
use regnskap_shared::CallContext;

use super::Job;
use crate::error::JobError;
use crate::lager::{BatchLager, Engangslaas, FeilrapportLager, Varsling};
use crate::tid::oslo_dato;

const VARSEL_LOCK: &str = "behandlingsstatus_varsel";

/// Confirms or fails sent batches and reports failures once a day.
pub struct BehandlingsstatusJob {
    batcher: Arc<dyn BatchLager>,
    rapporter: Arc<dyn FeilrapportLager>,
    klient: Arc<dyn SkattKlient>,
    laas: Arc<dyn Engangslaas>,
    varsling: Arc<dyn Varsling>,
    metrics: Arc<dyn MetricsReporter>,
}

impl BehandlingsstatusJob {
    /// Creates the job.
    #[must_use]
    pub fn new(
        batcher: Arc<dyn BatchLager>,
        rapporter: Arc<dyn FeilrapportLager>,
        klient: Arc<dyn SkattKlient>,
        laas: Arc<dyn Engangslaas>,
        varsling: Arc<dyn Varsling>,
        metrics: Arc<dyn MetricsReporter>,
    ) -> Self {
        Self {
            batcher,
            rapporter,
            klient,
            laas,
            varsling,
            metrics,
        }
    }

    async fn poll(&self, ctx: &CallContext, now: DateTime<Utc>) -> Result<(u64, u64), JobError> {
        let mut bekreftet = 0;
        let mut feilet = 0;

        for uid in self.batcher.ubekreftede_batcher().await? {
            let batch_uid = BatchUid(uid);
            let status = match self.klient.hent_behandlingsstatus(ctx, &batch_uid).await {
                Ok(status) => status,
                Err(e) => {
                    warn!(batch_uid = %batch_uid, correlation_id = %ctx, error = %e, "Status unavailable");
                    continue;
                }
            };

            match status {
                Behandlingsstatus::Ferdig => {
                    let antall = self.batcher.bekreft_batch(batch_uid.as_str(), now).await?;
                    info!(batch_uid = %batch_uid, konteringer = antall, "Batch confirmed");
                    bekreftet += 1;
                }
                Behandlingsstatus::Feilet { feil } => {
                    for f in &feil {
                        warn!(
                            batch_uid = %batch_uid,
                            sak_id = %f.sak_id,
                            transaksjonskode = %f.transaksjonskode,
                            periode = %f.periode,
                            feilmelding = %f.feilmelding,
                            "Line rejected"
                        );
                    }
                    let batch = self.batcher.marker_batch_feilet(batch_uid.as_str()).await?;
                    warn!(
                        batch_uid = %batch_uid,
                        oppdrag = batch.oppdrag_ids.len(),
                        konteringer = batch.konteringer.len(),
                        correlation_id = %ctx,
                        "Batch failed"
                    );
                    let linje = self.feilrapport_linje(ctx, batch, &feil, now).await;
                    self.rapporter.lagre(&linje).await?;
                    feilet += 1;
                }
                Behandlingsstatus::Mottatt => {
                    debug!(batch_uid = %batch_uid, "Batch still processing");
                }
            }
        }

        Ok((bekreftet, feilet))
    }

    /// The report entry of a failed batch, with the ledger comparison taken
    /// while the lines are still unconfirmed.
    async fn feilrapport_linje(
        &self,
        ctx: &CallContext,
        batch: FeiletBatch,
        feil: &[Linjefeil],
        now: DateTime<Utc>,
    ) -> FeilrapportLinje {
        let sak_id = batch
            .konteringer
            .first()
            .map(|k| k.sak_id.clone())
            .or_else(|| feil.first().map(|f| f.sak_id.clone()))
            .unwrap_or_default();

        let sammenligning = if batch.konteringer.is_empty() {
            None
        } else {
            match self
                .klient
                .sammenlign_med_reskontro(ctx, &sak_id, &batch.konteringer)
                .await
            {
                Ok(s) => Some(s),
                Err(e) => {
                    warn!(sak_id = %sak_id, correlation_id = %ctx, error = %e, "Ledger comparison failed");
                    None
                }
            }
        };

        FeilrapportLinje {
            sum: batch.konteringer.iter().map(|k| k.belop).sum::<Decimal>(),
            antall_konteringer: batch.konteringer.len(),
            antall_oppdrag: batch.oppdrag_ids.len(),
            batch_uid: batch.batch_uid,
            sak_id,
            feilmeldinger: feil.iter().map(ToString::to_string).collect(),
            sammenligning,
            oppdaget: now,
        }
    }

    async fn send_feilrapport(&self, ctx: &CallContext, now: DateTime<Utc>) -> Result<(), JobError> {
        let urapporterte = self.rapporter.urapporterte().await?;
        if urapporterte.is_empty() {
            debug!(correlation_id = %ctx, "No failed batches to report");
            return Ok(());
        }

        if !self.laas.vinn_til(VARSEL_LOCK, varslingsvindu_slutt(now)).await? {
            return Ok(());
        }

        let mut rapport = Feilrapport::new(oslo_dato(now));
        let mut ids = Vec::with_capacity(urapporterte.len());
        for (id, linje) in urapporterte {
            ids.push(id);
            rapport.legg_til(linje);
        }

        // Entries stay pending and go out with the next report.
        if let Err(e) = self.varsling.varsle(&rapport.tittel(), &rapport.tekst()).await {
            warn!(correlation_id = %ctx, error = %e, batcher = ids.len(), "Failure report not delivered");
            return Ok(());
        }

        let antall = self.rapporter.marker_rapportert(&ids, now).await?;
        info!(batcher = antall, correlation_id = %ctx, "Failure report sent");
        Ok(())
    }

    async fn pass(&self, ctx: &CallContext, now: DateTime<Utc>) -> Result<(), JobError> {
        let (bekreftet, feilet) = self.poll(ctx, now).await?;
        self.metrics.behandlingsstatus(bekreftet, feilet);

        if i_varslingsvindu(now) {
            self.send_feilrapport(ctx, now).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Job for BehandlingsstatusJob {
    fn name(&self) -> &'static str {
        "behandlingsstatus"
    }

    fn mot_skatt(&self) -> bool {
        true
    }

    async fn run(&self, ctx: &CallContext) -> Result<(), JobError> {
        self.pass(ctx, Utc::now()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use regnskap_core::krav::{ReskontroSammenligning, SkattError};
    use regnskap_core::metrics::TracingMetrics;
    use regnskap_db::repositories::KonteringRad;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    use crate::lager::{MockBatchLager, MockEngangslaas, MockFeilrapportLager, MockVarsling};
    use crate::testing::{MockSkatt, rad};

    /// 03:00 in Oslo, outside the report window.
    fn natt() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 15, 2, 0, 0).unwrap()
    }

    /// 07:30 in Oslo.
    fn morgen() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 15, 6, 30, 0).unwrap()
    }

    struct Oppsett {
        batcher: MockBatchLager,
        rapporter: MockFeilrapportLager,
        klient: MockSkatt,
        laas: MockEngangslaas,
        varsling: MockVarsling,
    }

    impl Oppsett {
        fn new(batcher: Vec<&str>) -> Self {
            let batcher: Vec<String> = batcher.into_iter().map(str::to_string).collect();
            let mut lager = MockBatchLager::new();
            lager
                .expect_ubekreftede_batcher()
                .times(1)
                .returning(move || Ok(batcher.clone()));
            Self {
                batcher: lager,
                rapporter: MockFeilrapportLager::new(),
                klient: MockSkatt::new(),
                laas: MockEngangslaas::new(),
                varsling: MockVarsling::new(),
            }
        }

        fn status(&mut self, batch: &'static str, status: Result<Behandlingsstatus, SkattError>) {
            let mut status = Some(status);
            self.klient
                .expect_hent_behandlingsstatus()
                .withf(move |_, uid| uid.as_str() == batch)
                .times(1)
                .returning(move |_, _| status.take().unwrap_or(Ok(Behandlingsstatus::Mottatt)));
        }

        fn job(self) -> BehandlingsstatusJob {
            BehandlingsstatusJob::new(
                Arc::new(self.batcher),
                Arc::new(self.rapporter),
                Arc::new(self.klient),
                Arc::new(self.laas),
                Arc::new(self.varsling),
                Arc::new(TracingMetrics),
            )
        }
    }

    fn feilet_batch(batch_uid: &str) -> FeiletBatch {
        let rader: Vec<KonteringRad> = (0..2)
            .map(|_| rad("123456", Uuid::nil(), chrono::TimeDelta::hours(1), natt()))
            .collect();
        FeiletBatch {
            batch_uid: batch_uid.to_string(),
            oppdrag_ids: vec![Uuid::nil()],
            konteringer: rader.iter().map(|r| r.til_krav().unwrap()).collect(),
        }
    }

    fn linjefeil() -> Linjefeil {
        Linjefeil {
            sak_id: "123456".to_string(),
            transaksjonskode: "B1".to_string(),
            periode: "2023-01".to_string(),
            feilmelding: "ugyldig kravhaver".to_string(),
        }
    }

    fn rapportlinje(batch_uid: &str) -> FeilrapportLinje {
        FeilrapportLinje {
            batch_uid: batch_uid.to_string(),
            sak_id: "123456".to_string(),
            antall_oppdrag: 1,
            antall_konteringer: 2,
            sum: dec!(3000.00),
            feilmeldinger: vec!["ugyldig kravhaver".to_string()],
            sammenligning: None,
            oppdaget: natt(),
        }
    }

    #[tokio::test]
    async fn test_finished_batch_is_confirmed() {
        let mut oppsett = Oppsett::new(vec!["b-1"]);
        oppsett.status("b-1", Ok(Behandlingsstatus::Ferdig));
        oppsett
            .batcher
            .expect_bekreft_batch()
            .withf(|uid, now| uid == "b-1" && *now == natt())
            .times(1)
            .returning(|_, _| Ok(2));
        oppsett.batcher.expect_marker_batch_feilet().never();
        oppsett.rapporter.expect_lagre().never();

        let job = oppsett.job();
        let (bekreftet, feilet) = job.poll(&CallContext::new(), natt()).await.unwrap();
        assert_eq!((bekreftet, feilet), (1, 0));
    }

    #[tokio::test]
    async fn test_failed_batch_is_compared_and_recorded_at_once() {
        let mut oppsett = Oppsett::new(vec!["b-2"]);
        oppsett.status(
            "b-2",
            Ok(Behandlingsstatus::Feilet {
                feil: vec![linjefeil()],
            }),
        );
        oppsett
            .batcher
            .expect_marker_batch_feilet()
            .withf(|uid| uid == "b-2")
            .times(1)
            .returning(|uid| Ok(feilet_batch(uid)));
        oppsett.batcher.expect_bekreft_batch().never();
        oppsett
            .klient
            .expect_sammenlign_med_reskontro()
            .withf(|_, sak_id, konteringer| sak_id == "123456" && konteringer.len() == 2)
            .times(1)
            .returning(|_, _, _| {
                Ok(ReskontroSammenligning {
                    funnet: 0,
                    mangler: 2,
                    differanse: dec!(3000.00),
                })
            });
        oppsett
            .rapporter
            .expect_lagre()
            .withf(|linje| {
                linje.batch_uid == "b-2"
                    && linje.sum == dec!(3000.00)
                    && linje.antall_konteringer == 2
                    && linje.feilmeldinger == vec!["123456 B1 2023-01: ugyldig kravhaver"]
                    && linje.sammenligning.as_ref().is_some_and(|s| s.mangler == 2)
                    && linje.oppdaget == natt()
            })
            .times(1)
            .returning(|_| Ok(Uuid::nil()));

        let job = oppsett.job();
        let (bekreftet, feilet) = job.poll(&CallContext::new(), natt()).await.unwrap();
        assert_eq!((bekreftet, feilet), (0, 1));
    }

    #[tokio::test]
    async fn test_comparison_outage_still_records_failure() {
        let mut oppsett = Oppsett::new(vec!["b-3"]);
        oppsett.status("b-3", Ok(Behandlingsstatus::Feilet { feil: vec![] }));
        oppsett
            .batcher
            .expect_marker_batch_feilet()
            .returning(|uid| Ok(feilet_batch(uid)));
        oppsett
            .klient
            .expect_sammenlign_med_reskontro()
            .returning(|_, _, _| Err(SkattError::Transient("timeout".into())));
        oppsett
            .rapporter
            .expect_lagre()
            .withf(|linje| linje.sammenligning.is_none())
            .times(1)
            .returning(|_| Ok(Uuid::nil()));

        let job = oppsett.job();
        assert_eq!(job.poll(&CallContext::new(), natt()).await.unwrap(), (0, 1));
    }

    #[tokio::test]
    async fn test_received_batch_is_left_alone() {
        let mut oppsett = Oppsett::new(vec!["b-4"]);
        oppsett.status("b-4", Ok(Behandlingsstatus::Mottatt));
        oppsett.batcher.expect_bekreft_batch().never();
        oppsett.batcher.expect_marker_batch_feilet().never();
        oppsett.rapporter.expect_lagre().never();

        let job = oppsett.job();
        assert_eq!(job.poll(&CallContext::new(), natt()).await.unwrap(), (0, 0));
    }

    #[tokio::test]
    async fn test_status_error_skips_only_that_batch() {
        let mut oppsett = Oppsett::new(vec!["b-5", "b-6"]);
        oppsett.status("b-5", Err(SkattError::Transient("timeout".into())));
        oppsett.status("b-6", Ok(Behandlingsstatus::Ferdig));
        oppsett
            .batcher
            .expect_bekreft_batch()
            .withf(|uid, now| uid == "b-6" && *now == natt())
            .times(1)
            .returning(|_, _| Ok(1));
        oppsett.batcher.expect_marker_batch_feilet().never();

        let job = oppsett.job();
        assert_eq!(job.poll(&CallContext::new(), natt()).await.unwrap(), (1, 0));
    }

    #[tokio::test]
    async fn test_nothing_to_report_leaves_window_lease_alone() {
        let mut oppsett = Oppsett::new(vec![]);
        oppsett
            .rapporter
            .expect_urapporterte()
            .times(1)
            .returning(|| Ok(vec![]));
        oppsett.laas.expect_vinn_til().never();
        oppsett.varsling.expect_varsle().never();

        oppsett.job().pass(&CallContext::new(), morgen()).await.unwrap();
    }

    #[tokio::test]
    async fn test_morning_report_sends_and_clears_pending_entries() {
        let ids = [Uuid::new_v4(), Uuid::new_v4()];
        let mut oppsett = Oppsett::new(vec![]);
        oppsett
            .rapporter
            .expect_urapporterte()
            .times(1)
            .returning(move || Ok(vec![(ids[0], rapportlinje("b-1")), (ids[1], rapportlinje("b-2"))]));
        oppsett
            .laas
            .expect_vinn_til()
            .withf(|navn, _| navn == VARSEL_LOCK)
            .times(1)
            .returning(|_, _| Ok(true));
        oppsett
            .varsling
            .expect_varsle()
            .withf(|tittel, tekst| tittel.starts_with("2 batcher") && tekst.contains("batch b-2"))
            .times(1)
            .returning(|_, _| Ok(()));
        oppsett
            .rapporter
            .expect_marker_rapportert()
            .withf(move |rapportert, now| rapportert == ids && *now == morgen())
            .times(1)
            .returning(|_, _| Ok(2));

        oppsett.job().pass(&CallContext::new(), morgen()).await.unwrap();
    }

    #[tokio::test]
    async fn test_report_lost_to_other_instance_is_not_sent() {
        let mut oppsett = Oppsett::new(vec![]);
        oppsett
            .rapporter
            .expect_urapporterte()
            .returning(|| Ok(vec![(Uuid::nil(), rapportlinje("b-1"))]));
        oppsett.laas.expect_vinn_til().times(1).returning(|_, _| Ok(false));
        oppsett.varsling.expect_varsle().never();
        oppsett.rapporter.expect_marker_rapportert().never();

        oppsett.job().pass(&CallContext::new(), morgen()).await.unwrap();
    }

    #[tokio::test]
    async fn test_undelivered_report_keeps_entries_pending() {
        let mut oppsett = Oppsett::new(vec![]);
        oppsett
            .rapporter
            .expect_urapporterte()
            .returning(|| Ok(vec![(Uuid::nil(), rapportlinje("b-1"))]));
        oppsett.laas.expect_vinn_til().returning(|_, _| Ok(true));
        oppsett.varsling.expect_varsle().times(1).returning(|_, _| {
            Err(regnskap_shared::AlertError::SendError("smtp down".into()))
        });
        oppsett.rapporter.expect_marker_rapportert().never();

        oppsett.job().pass(&CallContext::new(), morgen()).await.unwrap();
    }

    #[tokio::test]
    async fn test_report_waits_for_the_window() {
        let mut oppsett = Oppsett::new(vec![]);
        oppsett.rapporter.expect_urapporterte().never();
        oppsett.laas.expect_vinn_til().never();

        oppsett.job().pass(&CallContext::new(), natt()).await.unwrap();
    }
}
