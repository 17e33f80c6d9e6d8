//! Accrual (påløp) run.
//!
//! A run marks itself started, declares an outage for its duration, tops up
//! open periods, streams the accrual file page by page into storage, marks
//! the covered lines transmitted, delivers the file and marks itself finished.

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use tracing::{debug, error, info};
use uuid::Uuid;

use regnskap_core::domain::Overforingsperiode;
use regnskap_core::eksport::{PalopHeader, PalopTotal, PalopWriter, palop_filnavn};
use regnskap_core::metrics::MetricsReporter;
use regnskap_core::storage::{FileStorage, SftpLevering};
use regnskap_db::KonteringRepository;
use regnskap_db::entities::palop;
use regnskap_db::repositories::{NyttDriftsavvik, PalopUtvalg};
use regnskap_shared::CallContext;
use regnskap_shared::types::PalopId;

use super::Job;
use crate::error::JobError;
use crate::generator::KonteringGenerator;
use crate::lager::{DriftsavvikLager, Engangslaas, PalopLager, Varsling, varsle_eller_logg};
use crate::tid::{dagslutt, oslo_dato};

const SIDE: u64 = 5_000;
const MANGLER_PLAN_LOCK: &str = "palop_mangler_plan";

/// Produces and delivers the accrual file of one run.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PalopProdusent: Send + Sync {
    /// Tops up open periods, writes the file, marks the covered lines and
    /// delivers the file. Returns the trailer totals.
    async fn produser(
        &self,
        ctx: &CallContext,
        palop_id: Uuid,
        periode: Overforingsperiode,
    ) -> Result<PalopTotal, JobError>;
}

/// Writes the accrual file to storage and hands it to remote delivery.
pub struct PalopFil {
    konteringer: KonteringRepository,
    generator: KonteringGenerator,
    storage: FileStorage,
    levering: Option<SftpLevering>,
    varsling: Arc<dyn Varsling>,
}

impl PalopFil {
    /// Creates the producer.
    #[must_use]
    pub fn new(
        konteringer: KonteringRepository,
        generator: KonteringGenerator,
        storage: FileStorage,
        levering: Option<SftpLevering>,
        varsling: Arc<dyn Varsling>,
    ) -> Self {
        Self {
            konteringer,
            generator,
            storage,
            levering,
            varsling,
        }
    }

    async fn skriv_fil(
        &self,
        key: &str,
        header: &PalopHeader,
        utvalg: &PalopUtvalg,
    ) -> Result<PalopTotal, JobError> {
        let palop_id = header.palop_id;
        let mut skriver = self.storage.writer(key).await?;
        let mut writer = PalopWriter::new(Vec::new(), header)?.with_progress(move |antall| {
            info!(palop_id = %palop_id, linjer = antall, "Accrual progress");
        });

        let mut etter = None;
        loop {
            let side = self.konteringer.palop_side(utvalg, etter, SIDE).await?;
            for rad in &side {
                writer.skriv(&rad.til_krav()?)?;
            }
            skriver.skriv(std::mem::take(writer.inner_mut())).await?;
            match side.last() {
                Some(siste) if side.len() as u64 == SIDE => {
                    etter = Some((siste.sak_id.clone(), siste.id));
                }
                _ => break,
            }
        }

        let (rest, total) = writer.ferdig()?;
        skriver.skriv(rest).await?;
        let bytes = skriver.lukk().await?;
        info!(key, bytes, antall = total.antall, "Accrual file stored");
        Ok(total)
    }

    async fn lever(&self, ctx: &CallContext, key: &str, periode: Overforingsperiode) {
        let Some(levering) = &self.levering else {
            return;
        };
        if let Err(e) = levering.lever(&self.storage, key).await {
            error!(key, correlation_id = %ctx, error = %e, "Accrual delivery failed");
            varsle_eller_logg(
                self.varsling.as_ref(),
                &format!("Overføring av påløpsfil feilet for {periode}"),
                &format!("{key}: {e}"),
            )
            .await;
        }
    }
}

#[async_trait]
impl PalopProdusent for PalopFil {
    async fn produser(
        &self,
        ctx: &CallContext,
        palop_id: Uuid,
        periode: Overforingsperiode,
    ) -> Result<PalopTotal, JobError> {
        self.generator.fyll_opp(ctx, periode).await?;

        // Lines created from here on belong to the next run.
        let opprettet_for = Utc::now();
        let utvalg = PalopUtvalg {
            til_og_med: periode,
            opprettet_for,
            dato: oslo_dato(opprettet_for),
        };
        let header = PalopHeader {
            palop_id: PalopId::from_uuid(palop_id),
            periode,
            opprettet: opprettet_for,
        };
        let key = palop_filnavn(&header);

        let total = self.skriv_fil(&key, &header, &utvalg).await?;

        let merket = self
            .konteringer
            .marker_palop_overfort(&utvalg, &format!("palop-{palop_id}"), Utc::now())
            .await?;
        if merket != total.antall {
            error!(palop_id = %palop_id, skrevet = total.antall, merket, "Accrual line count mismatch");
        }

        self.lever(ctx, &key, periode).await;
        Ok(total)
    }
}

/// Collaborators of [`PalopJob`].
pub struct PalopJobDeps {
    /// Accrual runs.
    pub palop: Arc<dyn PalopLager>,
    /// Outage declarations.
    pub driftsavvik: Arc<dyn DriftsavvikLager>,
    /// File production for a started run.
    pub produsent: Arc<dyn PalopProdusent>,
    /// Once-a-day ownership of the missing-schedule alert.
    pub laas: Arc<dyn Engangslaas>,
    /// Operational alerts.
    pub varsling: Arc<dyn Varsling>,
    /// Metrics.
    pub metrics: Arc<dyn MetricsReporter>,
}

/// Runs due accrual runs.
pub struct PalopJob {
    deps: PalopJobDeps,
    prod: bool,
    maks_varighet: TimeDelta,
}

impl PalopJob {
    /// Creates the job. `maks_varighet` bounds the outage a run declares.
    #[must_use]
    pub fn new(deps: PalopJobDeps, prod: bool, maks_varighet: TimeDelta) -> Self {
        Self {
            deps,
            prod,
            maks_varighet,
        }
    }

    async fn kjor(
        &self,
        ctx: &CallContext,
        run: palop::Model,
        now: DateTime<Utc>,
    ) -> Result<(), JobError> {
        let periode = Overforingsperiode::from_str(&run.for_periode)
            .map_err(|e| JobError::Data(format!("palop {}: {e}", run.id)))?;

        self.deps.palop.marker_startet(run.id, now).await?;
        let avvik = self
            .deps
            .driftsavvik
            .opprett(NyttDriftsavvik {
                tidspunkt_fra: now,
                tidspunkt_til: Some(now + self.maks_varighet),
                palop_id: Some(run.id),
                arsak: format!("Påløp for {periode}"),
                opprettet_av: self.name().to_string(),
            })
            .await?;
        info!(palop_id = %run.id, %periode, correlation_id = %ctx, "Accrual run started");

        let resultat = self.deps.produsent.produser(ctx, run.id, periode).await;

        if let Err(e) = self.deps.driftsavvik.avslutt(avvik, Utc::now()).await {
            error!(palop_id = %run.id, error = %e, "Could not close accrual outage");
        }

        let total = resultat?;
        self.deps.palop.marker_fullfort(run.id, Utc::now()).await?;
        self.deps.metrics.palop_linjer(total.antall);
        info!(
            palop_id = %run.id,
            %periode,
            antall = total.antall,
            saker = total.saker,
            sum = %total.sum,
            correlation_id = %ctx,
            "Accrual run finished"
        );
        Ok(())
    }

    /// Raises the missing-schedule alert at most once per local day across
    /// all instances.
    async fn varsle_manglende(&self, now: DateTime<Utc>) -> Result<(), JobError> {
        if !self.deps.laas.vinn_til(MANGLER_PLAN_LOCK, dagslutt(now)).await? {
            debug!("Missing-schedule alert already sent today");
            return Ok(());
        }
        varsle_eller_logg(
            self.deps.varsling.as_ref(),
            "Ingen påløp planlagt",
            &format!("Det finnes ingen fremtidig påløpskjøring per {}", now.to_rfc3339()),
        )
        .await;
        Ok(())
    }

    async fn pass(&self, ctx: &CallContext, now: DateTime<Utc>) -> Result<(), JobError> {
        let ventende = self.deps.palop.neste_ventende(now).await?;
        let fremtidig = self.deps.palop.neste_fremtidige(now).await?;
        self.deps
            .metrics
            .neste_palop(fremtidig.as_ref().map(|p| p.kjoredato.with_timezone(&Utc)));

        if mangler_plan(self.prod, ventende.is_some(), fremtidig.is_some()) {
            self.varsle_manglende(now).await?;
        }

        match ventende {
            Some(run) => self.kjor(ctx, run, now).await,
            None => Ok(()),
        }
    }
}

/// Whether a pass with nothing to run should raise the missing-schedule alert.
fn mangler_plan(prod: bool, ventende: bool, fremtidig: bool) -> bool {
    prod && !ventende && !fremtidig
}

#[async_trait]
impl Job for PalopJob {
    fn name(&self) -> &'static str {
        "palop"
    }

    async fn run(&self, ctx: &CallContext) -> Result<(), JobError> {
        self.pass(ctx, Utc::now()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use mockall::Sequence;
    use regnskap_core::metrics::TracingMetrics;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    use crate::lager::{MockDriftsavvikLager, MockEngangslaas, MockPalopLager, MockVarsling};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 4, 1, 4, 0, 0).unwrap()
    }

    fn run(for_periode: &str) -> palop::Model {
        palop::Model {
            id: Uuid::new_v4(),
            kjoredato: (now() - TimeDelta::hours(1)).into(),
            for_periode: for_periode.to_string(),
            startet_tidspunkt: None,
            fullfort_tidspunkt: None,
        }
    }

    struct Oppsett {
        palop: MockPalopLager,
        driftsavvik: MockDriftsavvikLager,
        produsent: MockPalopProdusent,
        laas: MockEngangslaas,
        varsling: MockVarsling,
    }

    impl Oppsett {
        fn new() -> Self {
            Self {
                palop: MockPalopLager::new(),
                driftsavvik: MockDriftsavvikLager::new(),
                produsent: MockPalopProdusent::new(),
                laas: MockEngangslaas::new(),
                varsling: MockVarsling::new(),
            }
        }

        fn plan(&mut self, ventende: Option<palop::Model>, fremtidig: Option<palop::Model>) {
            self.palop
                .expect_neste_ventende()
                .returning(move |_| Ok(ventende.clone()));
            self.palop
                .expect_neste_fremtidige()
                .returning(move |_| Ok(fremtidig.clone()));
        }

        fn job(self, prod: bool) -> PalopJob {
            PalopJob::new(
                PalopJobDeps {
                    palop: Arc::new(self.palop),
                    driftsavvik: Arc::new(self.driftsavvik),
                    produsent: Arc::new(self.produsent),
                    laas: Arc::new(self.laas),
                    varsling: Arc::new(self.varsling),
                    metrics: Arc::new(TracingMetrics),
                },
                prod,
                TimeDelta::hours(4),
            )
        }
    }

    #[rstest]
    #[case(true, false, false, true)]
    #[case(true, true, false, false)]
    #[case(true, false, true, false)]
    #[case(false, false, false, false)]
    fn test_missing_schedule_alert(
        #[case] prod: bool,
        #[case] ventende: bool,
        #[case] fremtidig: bool,
        #[case] varsle: bool,
    ) {
        assert_eq!(mangler_plan(prod, ventende, fremtidig), varsle);
    }

    #[tokio::test]
    async fn test_run_declares_outage_and_finishes_in_order() {
        let ventende = run("2024-03");
        let id = ventende.id;
        let avvik = Uuid::new_v4();
        let mut seq = Sequence::new();
        let mut oppsett = Oppsett::new();
        oppsett.plan(Some(ventende), Some(run("2024-04")));

        oppsett
            .palop
            .expect_marker_startet()
            .withf(move |run_id, at| *run_id == id && *at == now())
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));
        oppsett
            .driftsavvik
            .expect_opprett()
            .withf(move |nytt| {
                nytt.palop_id == Some(id)
                    && nytt.tidspunkt_fra == now()
                    && nytt.tidspunkt_til == Some(now() + TimeDelta::hours(4))
                    && nytt.arsak == "Påløp for 2024-03"
            })
            .times(1)
            .in_sequence(&mut seq)
            .returning(move |_| Ok(avvik));
        oppsett
            .produsent
            .expect_produser()
            .withf(move |_, run_id, periode| *run_id == id && periode.to_string() == "2024-03")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| {
                Ok(PalopTotal {
                    sum: dec!(3000.00),
                    antall: 2,
                    saker: 1,
                })
            });
        oppsett
            .driftsavvik
            .expect_avslutt()
            .withf(move |avvik_id, _| *avvik_id == avvik)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));
        oppsett
            .palop
            .expect_marker_fullfort()
            .withf(move |run_id, _| *run_id == id)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));

        oppsett.job(true).pass(&CallContext::new(), now()).await.unwrap();
    }

    #[tokio::test]
    async fn test_failed_run_closes_outage_and_stays_unfinished() {
        let mut oppsett = Oppsett::new();
        oppsett.plan(Some(run("2024-03")), Some(run("2024-04")));
        oppsett.palop.expect_marker_startet().times(1).returning(|_, _| Ok(()));
        oppsett
            .driftsavvik
            .expect_opprett()
            .times(1)
            .returning(|_| Ok(Uuid::nil()));
        oppsett
            .produsent
            .expect_produser()
            .times(1)
            .returning(|_, _, _| Err(JobError::Data("disk full".to_string())));
        oppsett
            .driftsavvik
            .expect_avslutt()
            .withf(|avvik_id, _| avvik_id.is_nil())
            .times(1)
            .returning(|_, _| Ok(()));
        oppsett.palop.expect_marker_fullfort().never();

        let err = oppsett
            .job(true)
            .pass(&CallContext::new(), now())
            .await
            .unwrap_err();
        assert!(matches!(err, JobError::Data(msg) if msg == "disk full"));
    }

    #[tokio::test]
    async fn test_unreadable_period_starts_nothing() {
        let mut oppsett = Oppsett::new();
        oppsett.plan(Some(run("2024-13")), None);
        oppsett.palop.expect_marker_startet().never();
        oppsett.driftsavvik.expect_opprett().never();
        oppsett.produsent.expect_produser().never();

        let err = oppsett
            .job(false)
            .pass(&CallContext::new(), now())
            .await
            .unwrap_err();
        assert!(matches!(err, JobError::Data(_)));
    }

    #[tokio::test]
    async fn test_missing_schedule_alert_once_per_day() {
        let mut ledig = true;
        let mut oppsett = Oppsett::new();
        oppsett.plan(None, None);
        oppsett
            .laas
            .expect_vinn_til()
            .withf(|navn, til| navn == MANGLER_PLAN_LOCK && *til == dagslutt(now()))
            .times(2)
            .returning(move |_, _| Ok(std::mem::replace(&mut ledig, false)));
        oppsett
            .varsling
            .expect_varsle()
            .withf(|tittel, _| tittel == "Ingen påløp planlagt")
            .times(1)
            .returning(|_, _| Ok(()));

        let job = oppsett.job(true);
        job.pass(&CallContext::new(), now()).await.unwrap();
        job.pass(&CallContext::new(), now() + TimeDelta::minutes(10))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_missing_schedule_outside_prod_is_quiet() {
        let mut oppsett = Oppsett::new();
        oppsett.plan(None, None);
        oppsett.laas.expect_vinn_til().never();
        oppsett.varsling.expect_varsle().never();

        oppsett.job(false).pass(&CallContext::new(), now()).await.unwrap();
    }
}
