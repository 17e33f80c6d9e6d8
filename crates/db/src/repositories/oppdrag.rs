//! Obligation repository: decision events in, transaction lines out.
//!
//! Each decision event is stored in one database transaction. The unique
//! index on (oppdragsperiode, month) backs the planner's in-memory check.

use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use tracing::{debug, info};
use uuid::Uuid;

use regnskap_core::domain::{Oppdragstype, Overforingsperiode, VedtakHendelse, VedtakType};
use regnskap_core::generator::{
    EksisterendePeriode, Periodegrunnlag, PlanlagtKontering, plan_hendelse, plan_periode,
};
use regnskap_shared::types::{OppdragId, OppdragsperiodeId};

use super::error::RepositoryError;
use crate::entities::{konteringer, oppdrag, oppdragsperioder};

/// Outcome of storing a decision event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LagretVedtak {
    /// The obligation the event was stored on.
    pub oppdrag_id: OppdragId,
    /// Whether the obligation was created by this event.
    pub nytt_oppdrag: bool,
    /// Periods created.
    pub nye_perioder: usize,
    /// Lines created.
    pub nye_konteringer: usize,
}

impl LagretVedtak {
    /// True when the event had already been stored in full.
    #[must_use]
    pub fn er_uendret(&self) -> bool {
        !self.nytt_oppdrag && self.nye_perioder == 0 && self.nye_konteringer == 0
    }
}

/// Obligation repository.
#[derive(Debug, Clone)]
pub struct OppdragRepository {
    db: DatabaseConnection,
}

impl OppdragRepository {
    /// Creates a new obligation repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Finds an obligation by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_id(&self, id: OppdragId) -> Result<Option<oppdrag::Model>, RepositoryError> {
        Ok(oppdrag::Entity::find_by_id(id.into_inner())
            .one(&self.db)
            .await?)
    }

    /// Stores a decision event and the lines it gives rise to.
    ///
    /// Months after `siste_lukkede` are left for the accrual run. Storing
    /// the same event again creates nothing.
    ///
    /// # Errors
    ///
    /// Returns an error if the database transaction fails.
    pub async fn lagre_vedtak(
        &self,
        hendelse: &VedtakHendelse,
        siste_lukkede: Option<Overforingsperiode>,
    ) -> Result<LagretVedtak, RepositoryError> {
        let txn = self.db.begin().await?;
        let now = Utc::now();

        let eksisterende_oppdrag = oppdrag::Entity::find()
            .filter(oppdrag::Column::StonadType.eq(hendelse.stonad_type.as_str()))
            .filter(oppdrag::Column::KravhaverIdent.eq(hendelse.kravhaver.as_str()))
            .filter(oppdrag::Column::SkyldnerIdent.eq(hendelse.skyldner.as_str()))
            .filter(oppdrag::Column::SakId.eq(hendelse.sak_id.as_str()))
            .one(&txn)
            .await?;

        let nytt_oppdrag = eksisterende_oppdrag.is_none();
        let oppdrag = match eksisterende_oppdrag {
            Some(o) => o,
            None => {
                oppdrag::ActiveModel {
                    id: Set(Uuid::now_v7()),
                    stonad_type: Set(hendelse.stonad_type.as_str().to_string()),
                    sak_id: Set(hendelse.sak_id.clone()),
                    skyldner_ident: Set(hendelse.skyldner.clone()),
                    kravhaver_ident: Set(hendelse.kravhaver.clone()),
                    mottaker_ident: Set(hendelse.mottaker_eller_ukjent().to_string()),
                    gjelder_ident: Set(hendelse.gjelder.clone()),
                    utsatt_til_dato: Set(None),
                    har_feilet: Set(false),
                    endret_tidspunkt: Set(now.into()),
                    opprettet_tidspunkt: Set(now.into()),
                }
                .insert(&txn)
                .await?
            }
        };

        let (lagrede, eksisterende) = load_perioder(&txn, oppdrag.id).await?;
        let planer = plan_hendelse(hendelse, &eksisterende, siste_lukkede);

        let mut nye_perioder = 0;
        let mut nye_konteringer = Vec::new();
        for plan in planer {
            let periode_id = match plan.eksisterende {
                Some(id) => {
                    let fullfort = lagrede
                        .iter()
                        .any(|p| p.id == id.into_inner() && p.konteringer_fullforte_opprettet);
                    if plan.plan.fullfort && !fullfort {
                        marker_fullfort(&txn, id.into_inner()).await?;
                    }
                    id.into_inner()
                }
                None => {
                    let periode = &hendelse.perioder[plan.indeks];
                    let model = oppdragsperioder::ActiveModel {
                        id: Set(Uuid::now_v7()),
                        oppdrag_id: Set(oppdrag.id),
                        vedtak_id: Set(hendelse.vedtak_id),
                        vedtak_type: Set(hendelse.vedtak_type.as_str().to_string()),
                        belop: Set(periode.belop),
                        valuta: Set(periode.valuta.code().to_string()),
                        periode_fra: Set(periode.periode_fra),
                        periode_til: Set(periode.periode_til),
                        vedtaksdato: Set(hendelse.vedtaksdato),
                        opprettet_av: Set(hendelse.opprettet_av.clone()),
                        ekstern_referanse: Set(periode.ekstern_referanse.clone()),
                        konteringer_fullforte_opprettet: Set(plan.plan.fullfort),
                        opprettet_tidspunkt: Set(now.into()),
                    }
                    .insert(&txn)
                    .await?;
                    nye_perioder += 1;
                    model.id
                }
            };

            nye_konteringer.extend(
                plan.plan
                    .konteringer
                    .iter()
                    .map(|k| ny_kontering(periode_id, hendelse.vedtak_id, k)),
            );
        }

        let antall = nye_konteringer.len();
        if !nye_konteringer.is_empty() {
            konteringer::Entity::insert_many(nye_konteringer)
                .exec(&txn)
                .await?;
        }

        if !nytt_oppdrag && (nye_perioder > 0 || antall > 0) {
            oppdrag::ActiveModel {
                id: Set(oppdrag.id),
                endret_tidspunkt: Set(now.into()),
                ..Default::default()
            }
            .update(&txn)
            .await?;
        }

        txn.commit().await?;

        let lagret = LagretVedtak {
            oppdrag_id: OppdragId::from_uuid(oppdrag.id),
            nytt_oppdrag,
            nye_perioder,
            nye_konteringer: antall,
        };
        debug!(
            vedtak_id = hendelse.vedtak_id,
            sak_id = %hendelse.sak_id,
            oppdrag_id = %lagret.oppdrag_id,
            nye_perioder,
            nye_konteringer = antall,
            "Decision stored"
        );
        Ok(lagret)
    }

    /// Generates lines up to `siste_lukkede` for every period not yet complete.
    ///
    /// Each obligation is topped up in its own transaction. Returns the
    /// number of lines created.
    ///
    /// # Errors
    ///
    /// Returns an error if a database operation fails.
    pub async fn fyll_opp_perioder(
        &self,
        siste_lukkede: Overforingsperiode,
    ) -> Result<u64, RepositoryError> {
        let ufullstendige = oppdragsperioder::Entity::find()
            .filter(oppdragsperioder::Column::KonteringerFullforteOpprettet.eq(false))
            .order_by_asc(oppdragsperioder::Column::OppdragId)
            .all(&self.db)
            .await?;

        let oppdrag_ids: BTreeSet<Uuid> = ufullstendige.iter().map(|p| p.oppdrag_id).collect();
        let mut totalt = 0u64;

        for oppdrag_id in oppdrag_ids {
            totalt += self.fyll_opp_oppdrag(oppdrag_id, siste_lukkede).await?;
        }

        info!(
            siste_lukkede = %siste_lukkede,
            nye_konteringer = totalt,
            "Open periods topped up"
        );
        Ok(totalt)
    }

    async fn fyll_opp_oppdrag(
        &self,
        oppdrag_id: Uuid,
        siste_lukkede: Overforingsperiode,
    ) -> Result<u64, RepositoryError> {
        let txn = self.db.begin().await?;

        let oppdrag = oppdrag::Entity::find_by_id(oppdrag_id)
            .one(&txn)
            .await?
            .ok_or(RepositoryError::NotFound {
                entity: "oppdrag",
                id: oppdrag_id,
            })?;
        let oppdragstype = Oppdragstype::from_str(&oppdrag.stonad_type)
            .map_err(|_| RepositoryError::invalid("stonad_type", &oppdrag.stonad_type))?;

        let (lagrede, mut eksisterende) = load_perioder(&txn, oppdrag_id).await?;
        let mut nye = Vec::new();

        for (i, periode) in lagrede.iter().enumerate() {
            if periode.konteringer_fullforte_opprettet {
                continue;
            }

            let forste_periode = !lagrede.iter().any(|p| {
                p.vedtak_id == periode.vedtak_id
                    && (p.periode_fra, p.id) < (periode.periode_fra, periode.id)
            });
            let grunnlag = Periodegrunnlag {
                oppdragstype,
                vedtak_type: VedtakType::parse(&periode.vedtak_type),
                forste_periode,
                belop: periode.belop,
                periode_fra: periode.periode_fra,
                periode_til: periode.periode_til,
            };
            let sosken: BTreeSet<Overforingsperiode> = eksisterende
                .iter()
                .enumerate()
                .filter(|(j, _)| *j != i)
                .flat_map(|(_, e)| e.maneder.iter().copied())
                .collect();

            let plan = plan_periode(
                &grunnlag,
                &eksisterende[i].maneder,
                &sosken,
                Some(siste_lukkede),
            );

            eksisterende[i]
                .maneder
                .extend(plan.konteringer.iter().map(|k| k.overforingsperiode));
            nye.extend(
                plan.konteringer
                    .iter()
                    .map(|k| ny_kontering(periode.id, periode.vedtak_id, k)),
            );
            if plan.fullfort {
                marker_fullfort(&txn, periode.id).await?;
            }
        }

        let antall = nye.len() as u64;
        if !nye.is_empty() {
            konteringer::Entity::insert_many(nye).exec(&txn).await?;
        }
        txn.commit().await?;
        Ok(antall)
    }

    /// Sets or clears the deferral date of an obligation.
    ///
    /// # Errors
    ///
    /// Returns an error if the obligation does not exist or the update fails.
    pub async fn sett_utsatt_til(
        &self,
        id: OppdragId,
        dato: Option<chrono::NaiveDate>,
    ) -> Result<(), RepositoryError> {
        let result = oppdrag::Entity::update_many()
            .col_expr(
                oppdrag::Column::UtsattTilDato,
                sea_orm::sea_query::Expr::value(dato),
            )
            .col_expr(
                oppdrag::Column::EndretTidspunkt,
                sea_orm::sea_query::Expr::value(Utc::now()),
            )
            .filter(oppdrag::Column::Id.eq(id.into_inner()))
            .exec(&self.db)
            .await?;

        if result.rows_affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "oppdrag",
                id: id.into_inner(),
            });
        }
        Ok(())
    }
}

/// Loads an obligation's periods and, per period, the months it has lines for.
async fn load_perioder<C: ConnectionTrait>(
    db: &C,
    oppdrag_id: Uuid,
) -> Result<(Vec<oppdragsperioder::Model>, Vec<EksisterendePeriode>), RepositoryError> {
    let perioder = oppdragsperioder::Entity::find()
        .filter(oppdragsperioder::Column::OppdragId.eq(oppdrag_id))
        .order_by_asc(oppdragsperioder::Column::PeriodeFra)
        .order_by_asc(oppdragsperioder::Column::Id)
        .all(db)
        .await?;

    let ids: Vec<Uuid> = perioder.iter().map(|p| p.id).collect();
    let mut maneder: BTreeMap<Uuid, BTreeSet<Overforingsperiode>> = BTreeMap::new();
    if !ids.is_empty() {
        let linjer = konteringer::Entity::find()
            .filter(konteringer::Column::OppdragsperiodeId.is_in(ids))
            .all(db)
            .await?;
        for linje in linjer {
            let maned = Overforingsperiode::from_str(&linje.overforingsperiode)
                .map_err(|_| RepositoryError::invalid("overforingsperiode", &linje.overforingsperiode))?;
            maneder
                .entry(linje.oppdragsperiode_id)
                .or_default()
                .insert(maned);
        }
    }

    let eksisterende = perioder
        .iter()
        .map(|p| EksisterendePeriode {
            id: OppdragsperiodeId::from_uuid(p.id),
            vedtak_id: p.vedtak_id,
            periode_fra: p.periode_fra,
            periode_til: p.periode_til,
            maneder: maneder.remove(&p.id).unwrap_or_default(),
        })
        .collect();

    Ok((perioder, eksisterende))
}

async fn marker_fullfort<C: ConnectionTrait>(db: &C, periode_id: Uuid) -> Result<(), RepositoryError> {
    oppdragsperioder::Entity::update_many()
        .col_expr(
            oppdragsperioder::Column::KonteringerFullforteOpprettet,
            sea_orm::sea_query::Expr::value(true),
        )
        .filter(oppdragsperioder::Column::Id.eq(periode_id))
        .exec(db)
        .await?;
    Ok(())
}

fn ny_kontering(
    periode_id: Uuid,
    vedtak_id: i64,
    planlagt: &PlanlagtKontering,
) -> konteringer::ActiveModel {
    konteringer::ActiveModel {
        id: Set(Uuid::now_v7()),
        oppdragsperiode_id: Set(periode_id),
        transaksjonskode: Set(planlagt.transaksjonskode.as_str().to_string()),
        overforingsperiode: Set(planlagt.overforingsperiode.to_string()),
        overforingstidspunkt: Set(None),
        behandlingsstatus_ok_tidspunkt: Set(None),
        siste_batch_uid: Set(None),
        kontering_type: Set(planlagt.kontering_type.as_str().to_string()),
        soknad_type: Set(planlagt.soknadstype.as_str().to_string()),
        vedtak_id: Set(vedtak_id),
        opprettet_tidspunkt: Set(Utc::now().into()),
    }
}
