//! Transaction line repository.
//!
//! Each job selects a disjoint state predicate:
//! - unsent: `overforingstidspunkt IS NULL`
//! - sent, unconfirmed: `overforingstidspunkt IS NOT NULL AND behandlingsstatus_ok_tidspunkt IS NULL`
//! - confirmed: `behandlingsstatus_ok_tidspunkt IS NOT NULL`

use std::collections::BTreeSet;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::{
    ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, DbBackend, EntityTrait,
    FromQueryResult, JoinType, QueryFilter, QueryOrder, QuerySelect, RelationTrait, Select, Statement,
    TransactionTrait,
};
use tracing::debug;
use uuid::Uuid;

use regnskap_core::domain::{
    KonteringType, Overforingsperiode, Soknadstype, Transaksjonskode,
};
use regnskap_core::eksport::AvstemmingLinje;
use regnskap_core::krav::{KravKandidat, KravKontering, Kvalifisering};
use regnskap_shared::types::{Currency, KonteringId, OppdragId};

use super::error::RepositoryError;
use crate::entities::{konteringer, oppdrag, oppdragsperioder};

/// A line joined with its period and obligation.
#[derive(Debug, Clone, FromQueryResult)]
pub struct KonteringRad {
    /// Line id.
    pub id: Uuid,
    /// Transaction code.
    pub transaksjonskode: String,
    /// Accounting month.
    pub overforingsperiode: String,
    /// NY or ENDRING.
    pub kontering_type: String,
    /// Claim subtype.
    pub soknad_type: String,
    /// Decision id.
    pub vedtak_id: i64,
    /// Line creation time.
    pub opprettet_tidspunkt: DateTimeWithTimeZone,
    /// Transmission time.
    pub overforingstidspunkt: Option<DateTimeWithTimeZone>,
    /// Last batch reference.
    pub siste_batch_uid: Option<String>,
    /// Period amount.
    pub belop: Decimal,
    /// Period currency.
    pub valuta: String,
    /// Decision date.
    pub vedtaksdato: NaiveDate,
    /// Decision maker.
    pub opprettet_av: String,
    /// External line reference.
    pub ekstern_referanse: Option<String>,
    /// Owning obligation.
    pub oppdrag_id: Uuid,
    /// Case id.
    pub sak_id: String,
    /// Payer.
    pub skyldner_ident: String,
    /// Payee.
    pub kravhaver_ident: String,
    /// Recipient.
    pub mottaker_ident: String,
    /// Beneficiary.
    pub gjelder_ident: String,
    /// Deferral date on the obligation.
    pub utsatt_til_dato: Option<NaiveDate>,
    /// Failed-flag on the obligation.
    pub har_feilet: bool,
}

impl KonteringRad {
    /// The line as submitted to the external ledger.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::InvalidData` if a stored code cannot be read.
    pub fn til_krav(&self) -> Result<KravKontering, RepositoryError> {
        Ok(KravKontering {
            kontering_id: KonteringId::from_uuid(self.id),
            transaksjonskode: self.kode()?,
            periode: self.periode()?,
            belop: self.belop,
            valuta: Currency::from_str(&self.valuta)
                .map_err(|_| RepositoryError::invalid("valuta", &self.valuta))?,
            sak_id: self.sak_id.clone(),
            skyldner_ident: self.skyldner_ident.clone(),
            kravhaver_ident: self.kravhaver_ident.clone(),
            mottaker_ident: self.mottaker_ident.clone(),
            gjelder_ident: self.gjelder_ident.clone(),
            vedtak_id: self.vedtak_id,
            vedtaksdato: self.vedtaksdato,
            saksbehandler_id: self.opprettet_av.clone(),
            kontering_type: KonteringType::parse(&self.kontering_type)
                .ok_or_else(|| RepositoryError::invalid("type", &self.kontering_type))?,
            soknad_type: Soknadstype::parse(&self.soknad_type)
                .ok_or_else(|| RepositoryError::invalid("soknad_type", &self.soknad_type))?,
            ekstern_referanse: self.ekstern_referanse.clone(),
        })
    }

    /// The line as a transmission candidate.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::InvalidData` if a stored code cannot be read.
    pub fn til_kandidat(&self) -> Result<KravKandidat, RepositoryError> {
        Ok(KravKandidat {
            oppdrag_id: OppdragId::from_uuid(self.oppdrag_id),
            kontering: self.til_krav()?,
        })
    }

    /// The line as a reconciliation record.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::InvalidData` if a stored code cannot be read.
    pub fn til_avstemming(&self) -> Result<AvstemmingLinje, RepositoryError> {
        Ok(AvstemmingLinje {
            transaksjonskode: self.kode()?,
            sak_id: self.sak_id.clone(),
            belop: self.belop,
            overforingsperiode: self.periode()?,
            ekstern_referanse: self.ekstern_referanse.clone(),
            gjelder_ident: self.gjelder_ident.clone(),
            kravhaver_ident: self.kravhaver_ident.clone(),
        })
    }

    /// Obligation state and age used by the eligibility rule.
    #[must_use]
    pub fn kvalifisering(&self) -> Kvalifisering {
        Kvalifisering {
            utsatt_til_dato: self.utsatt_til_dato,
            har_feilet: self.har_feilet,
            opprettet: self.opprettet_tidspunkt.with_timezone(&Utc),
        }
    }

    fn kode(&self) -> Result<Transaksjonskode, RepositoryError> {
        Transaksjonskode::from_str(&self.transaksjonskode)
            .map_err(|_| RepositoryError::invalid("transaksjonskode", &self.transaksjonskode))
    }

    fn periode(&self) -> Result<Overforingsperiode, RepositoryError> {
        Overforingsperiode::from_str(&self.overforingsperiode)
            .map_err(|_| RepositoryError::invalid("overforingsperiode", &self.overforingsperiode))
    }
}

/// Lines of a failed batch and the obligations that were flagged.
#[derive(Debug, Clone)]
pub struct FeiletBatch {
    /// Batch reference.
    pub batch_uid: String,
    /// Obligations flagged by this call.
    pub oppdrag_ids: Vec<Uuid>,
    /// Unconfirmed lines of the batch.
    pub konteringer: Vec<KravKontering>,
}

/// Which unsent lines an accrual run covers.
#[derive(Debug, Clone, Copy)]
pub struct PalopUtvalg {
    /// Last month included.
    pub til_og_med: Overforingsperiode,
    /// Lines created after this are left for the next run.
    pub opprettet_for: DateTime<Utc>,
    /// Deferrals ending on or before this date are over.
    pub dato: NaiveDate,
}

const TILBAKESTILL_OPPDRAG_SQL: &str = r"
UPDATE oppdrag SET har_feilet = FALSE, endret_tidspunkt = now()
WHERE har_feilet
  AND id IN (
    SELECT p.oppdrag_id
    FROM oppdragsperioder p
    JOIN konteringer k ON k.oppdragsperiode_id = p.id
    WHERE k.behandlingsstatus_ok_tidspunkt IS NULL
  )
";

const TILBAKESTILL_KONTERINGER_SQL: &str = r"
UPDATE konteringer SET overforingstidspunkt = NULL, siste_batch_uid = NULL
WHERE behandlingsstatus_ok_tidspunkt IS NULL
";

const MARKER_PALOP_SQL: &str = r"
UPDATE konteringer k
SET overforingstidspunkt = $1, behandlingsstatus_ok_tidspunkt = $1, siste_batch_uid = $2
FROM oppdragsperioder p, oppdrag o
WHERE k.oppdragsperiode_id = p.id
  AND p.oppdrag_id = o.id
  AND k.overforingstidspunkt IS NULL
  AND k.overforingsperiode <= $3
  AND k.opprettet_tidspunkt <= $4
  AND NOT o.har_feilet
  AND (o.utsatt_til_dato IS NULL OR o.utsatt_til_dato <= $5)
";

/// Transaction line repository.
#[derive(Debug, Clone)]
pub struct KonteringRepository {
    db: DatabaseConnection,
}

impl KonteringRepository {
    /// Creates a new line repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    fn rader() -> Select<konteringer::Entity> {
        konteringer::Entity::find()
            .join(
                JoinType::InnerJoin,
                konteringer::Relation::Oppdragsperioder.def(),
            )
            .join(JoinType::InnerJoin, oppdragsperioder::Relation::Oppdrag.def())
            .column_as(konteringer::Column::KonteringType, "kontering_type")
            .column_as(oppdragsperioder::Column::Belop, "belop")
            .column_as(oppdragsperioder::Column::Valuta, "valuta")
            .column_as(oppdragsperioder::Column::Vedtaksdato, "vedtaksdato")
            .column_as(oppdragsperioder::Column::OpprettetAv, "opprettet_av")
            .column_as(oppdragsperioder::Column::EksternReferanse, "ekstern_referanse")
            .column_as(oppdrag::Column::Id, "oppdrag_id")
            .column_as(oppdrag::Column::SakId, "sak_id")
            .column_as(oppdrag::Column::SkyldnerIdent, "skyldner_ident")
            .column_as(oppdrag::Column::KravhaverIdent, "kravhaver_ident")
            .column_as(oppdrag::Column::MottakerIdent, "mottaker_ident")
            .column_as(oppdrag::Column::GjelderIdent, "gjelder_ident")
            .column_as(oppdrag::Column::UtsattTilDato, "utsatt_til_dato")
            .column_as(oppdrag::Column::HarFeilet, "har_feilet")
    }

    /// Unsent lines on obligations that are not failed-flagged, ordered by case.
    ///
    /// Deferral and the grace window are applied by the caller.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn usendte(&self) -> Result<Vec<KonteringRad>, RepositoryError> {
        Ok(Self::rader()
            .filter(konteringer::Column::Overforingstidspunkt.is_null())
            .filter(oppdrag::Column::HarFeilet.eq(false))
            .order_by_asc(oppdrag::Column::SakId)
            .order_by_asc(oppdrag::Column::Id)
            .order_by_asc(konteringer::Column::Overforingsperiode)
            .into_model::<KonteringRad>()
            .all(&self.db)
            .await?)
    }

    /// Records a successful submission on every line of the group.
    ///
    /// Lines that were sent in the meantime are left alone.
    ///
    /// # Errors
    ///
    /// Returns an error if the database transaction fails.
    pub async fn marker_sendt(
        &self,
        ids: &[Uuid],
        batch_uid: &str,
        now: DateTime<Utc>,
    ) -> Result<u64, RepositoryError> {
        let txn = self.db.begin().await?;
        let result = konteringer::Entity::update_many()
            .col_expr(
                konteringer::Column::Overforingstidspunkt,
                sea_orm::sea_query::Expr::value(now),
            )
            .col_expr(
                konteringer::Column::SisteBatchUid,
                sea_orm::sea_query::Expr::value(batch_uid),
            )
            .filter(konteringer::Column::Id.is_in(ids.iter().copied()))
            .filter(konteringer::Column::Overforingstidspunkt.is_null())
            .exec(&txn)
            .await?;
        txn.commit().await?;
        Ok(result.rows_affected)
    }

    /// Distinct batch references of sent, unconfirmed lines.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn ubekreftede_batcher(&self) -> Result<Vec<String>, RepositoryError> {
        Ok(konteringer::Entity::find()
            .select_only()
            .column(konteringer::Column::SisteBatchUid)
            .distinct()
            .filter(konteringer::Column::Overforingstidspunkt.is_not_null())
            .filter(konteringer::Column::BehandlingsstatusOkTidspunkt.is_null())
            .filter(konteringer::Column::SisteBatchUid.is_not_null())
            .order_by_asc(konteringer::Column::SisteBatchUid)
            .into_tuple::<String>()
            .all(&self.db)
            .await?)
    }

    /// Confirms every line of a batch.
    ///
    /// # Errors
    ///
    /// Returns an error if the database update fails.
    pub async fn bekreft_batch(
        &self,
        batch_uid: &str,
        now: DateTime<Utc>,
    ) -> Result<u64, RepositoryError> {
        let result = konteringer::Entity::update_many()
            .col_expr(
                konteringer::Column::BehandlingsstatusOkTidspunkt,
                sea_orm::sea_query::Expr::value(now),
            )
            .filter(konteringer::Column::SisteBatchUid.eq(batch_uid))
            .filter(konteringer::Column::Overforingstidspunkt.is_not_null())
            .filter(konteringer::Column::BehandlingsstatusOkTidspunkt.is_null())
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected)
    }

    /// Flags every obligation with a line in the batch as failed.
    ///
    /// # Errors
    ///
    /// Returns an error if the database transaction fails.
    pub async fn marker_batch_feilet(
        &self,
        batch_uid: &str,
    ) -> Result<FeiletBatch, RepositoryError> {
        let txn = self.db.begin().await?;

        let rader = Self::rader()
            .filter(konteringer::Column::SisteBatchUid.eq(batch_uid))
            .filter(konteringer::Column::BehandlingsstatusOkTidspunkt.is_null())
            .order_by_asc(oppdrag::Column::SakId)
            .order_by_asc(konteringer::Column::Overforingsperiode)
            .into_model::<KonteringRad>()
            .all(&txn)
            .await?;

        let oppdrag_ids: Vec<Uuid> = rader
            .iter()
            .map(|r| r.oppdrag_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        if !oppdrag_ids.is_empty() {
            flag_oppdrag(&txn, &oppdrag_ids, true).await?;
        }
        txn.commit().await?;

        let konteringer = rader
            .iter()
            .map(KonteringRad::til_krav)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(FeiletBatch {
            batch_uid: batch_uid.to_string(),
            oppdrag_ids,
            konteringer,
        })
    }

    /// Moves every unconfirmed line back to unsent and clears the failed-flag
    /// on their obligations.
    ///
    /// Returns the number of lines in the reset set. Running it twice in a
    /// row resets the same set and changes nothing the second time.
    ///
    /// # Errors
    ///
    /// Returns an error if the database transaction fails.
    pub async fn tilbakestill_ubekreftede(&self) -> Result<u64, RepositoryError> {
        let txn = self.db.begin().await?;
        let oppdrag = txn
            .execute(Statement::from_string(
                DbBackend::Postgres,
                TILBAKESTILL_OPPDRAG_SQL,
            ))
            .await?;
        let konteringer = txn
            .execute(Statement::from_string(
                DbBackend::Postgres,
                TILBAKESTILL_KONTERINGER_SQL,
            ))
            .await?;
        txn.commit().await?;

        debug!(
            konteringer = konteringer.rows_affected(),
            oppdrag = oppdrag.rows_affected(),
            "Unconfirmed lines reset"
        );
        Ok(konteringer.rows_affected())
    }

    /// One page of lines transmitted within `[fra, til)`, ordered by
    /// transmission time and id and starting after `etter`.
    ///
    /// Rows that leave the range between two calls never shift later pages.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn overfort_mellom(
        &self,
        fra: DateTime<Utc>,
        til: DateTime<Utc>,
        etter: Option<(DateTime<Utc>, Uuid)>,
        limit: u64,
    ) -> Result<Vec<KonteringRad>, RepositoryError> {
        let mut query = Self::rader()
            .filter(konteringer::Column::Overforingstidspunkt.gte(fra))
            .filter(konteringer::Column::Overforingstidspunkt.lt(til));
        if let Some((tidspunkt, id)) = etter {
            query = query.filter(
                Condition::any()
                    .add(konteringer::Column::Overforingstidspunkt.gt(tidspunkt))
                    .add(
                        Condition::all()
                            .add(konteringer::Column::Overforingstidspunkt.eq(tidspunkt))
                            .add(konteringer::Column::Id.gt(id)),
                    ),
            );
        }

        Ok(query
            .order_by_asc(konteringer::Column::Overforingstidspunkt)
            .order_by_asc(konteringer::Column::Id)
            .limit(limit)
            .into_model::<KonteringRad>()
            .all(&self.db)
            .await?)
    }

    /// One page of lines covered by an accrual run, ordered by case and line
    /// id and starting after `etter`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn palop_side(
        &self,
        utvalg: &PalopUtvalg,
        etter: Option<(String, Uuid)>,
        limit: u64,
    ) -> Result<Vec<KonteringRad>, RepositoryError> {
        let mut query = Self::rader()
            .filter(konteringer::Column::Overforingstidspunkt.is_null())
            .filter(konteringer::Column::Overforingsperiode.lte(utvalg.til_og_med.to_string()))
            .filter(konteringer::Column::OpprettetTidspunkt.lte(utvalg.opprettet_for))
            .filter(oppdrag::Column::HarFeilet.eq(false))
            .filter(
                Condition::any()
                    .add(oppdrag::Column::UtsattTilDato.is_null())
                    .add(oppdrag::Column::UtsattTilDato.lte(utvalg.dato)),
            );
        if let Some((sak_id, id)) = etter {
            query = query.filter(
                Condition::any()
                    .add(oppdrag::Column::SakId.gt(sak_id.clone()))
                    .add(
                        Condition::all()
                            .add(oppdrag::Column::SakId.eq(sak_id))
                            .add(konteringer::Column::Id.gt(id)),
                    ),
            );
        }

        Ok(query
            .order_by_asc(oppdrag::Column::SakId)
            .order_by_asc(konteringer::Column::Id)
            .limit(limit)
            .into_model::<KonteringRad>()
            .all(&self.db)
            .await?)
    }

    /// Marks every line covered by an accrual run as transmitted and confirmed.
    ///
    /// # Errors
    ///
    /// Returns an error if the database update fails.
    pub async fn marker_palop_overfort(
        &self,
        utvalg: &PalopUtvalg,
        batch_uid: &str,
        now: DateTime<Utc>,
    ) -> Result<u64, RepositoryError> {
        let result = self
            .db
            .execute(Statement::from_sql_and_values(
                DbBackend::Postgres,
                MARKER_PALOP_SQL,
                [
                    now.into(),
                    batch_uid.into(),
                    utvalg.til_og_med.to_string().into(),
                    utvalg.opprettet_for.into(),
                    utvalg.dato.into(),
                ],
            ))
            .await?;
        Ok(result.rows_affected())
    }
}

async fn flag_oppdrag<C: ConnectionTrait>(
    db: &C,
    ids: &[Uuid],
    har_feilet: bool,
) -> Result<u64, RepositoryError> {
    let result = oppdrag::Entity::update_many()
        .col_expr(
            oppdrag::Column::HarFeilet,
            sea_orm::sea_query::Expr::value(har_feilet),
        )
        .col_expr(
            oppdrag::Column::EndretTidspunkt,
            sea_orm::sea_query::Expr::value(Utc::now()),
        )
        .filter(oppdrag::Column::Id.is_in(ids.iter().copied()))
        .exec(db)
        .await?;
    Ok(result.rows_affected)
}
