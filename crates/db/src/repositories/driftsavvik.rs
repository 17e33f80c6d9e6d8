//! Outage declaration repository.

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set,
};
use uuid::Uuid;

use regnskap_shared::types::DriftsavvikId;

use super::error::RepositoryError;
use crate::entities::driftsavvik;

/// Input for declaring an outage.
#[derive(Debug, Clone)]
pub struct NyttDriftsavvik {
    /// Start of the outage.
    pub tidspunkt_fra: DateTime<Utc>,
    /// Planned end, open-ended when absent.
    pub tidspunkt_til: Option<DateTime<Utc>>,
    /// Accrual run the outage belongs to.
    pub palop_id: Option<Uuid>,
    /// Free-text reason.
    pub arsak: String,
    /// Who declared it.
    pub opprettet_av: String,
}

/// Outage declaration repository.
#[derive(Debug, Clone)]
pub struct DriftsavvikRepository {
    db: DatabaseConnection,
}

impl DriftsavvikRepository {
    /// Creates a new outage repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Declares an outage.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the end precedes the start.
    pub async fn opprett(
        &self,
        nytt: NyttDriftsavvik,
    ) -> Result<driftsavvik::Model, RepositoryError> {
        if let Some(til) = nytt.tidspunkt_til
            && til < nytt.tidspunkt_fra
        {
            return Err(RepositoryError::Conflict(format!(
                "tidspunkt_til {til} is before tidspunkt_fra {}",
                nytt.tidspunkt_fra
            )));
        }

        let model = driftsavvik::ActiveModel {
            id: Set(DriftsavvikId::new().into_inner()),
            tidspunkt_fra: Set(nytt.tidspunkt_fra.into()),
            tidspunkt_til: Set(nytt.tidspunkt_til.map(Into::into)),
            palop_id: Set(nytt.palop_id),
            arsak: Set(nytt.arsak),
            opprettet_av: Set(nytt.opprettet_av),
            opprettet_tidspunkt: Set(Utc::now().into()),
        };
        Ok(model.insert(&self.db).await?)
    }

    /// Closes an outage at `now`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the outage does not exist.
    pub async fn avslutt(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<driftsavvik::Model, RepositoryError> {
        let model = driftsavvik::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or(RepositoryError::NotFound {
                entity: "driftsavvik",
                id,
            })?;
        let fra = model.tidspunkt_fra;

        let mut active: driftsavvik::ActiveModel = model.into();
        let slutt: sea_orm::prelude::DateTimeWithTimeZone = now.into();
        active.tidspunkt_til = Set(Some(slutt.max(fra)));
        Ok(active.update(&self.db).await?)
    }

    /// Closes the outage linked to an accrual run.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub async fn avslutt_for_palop(
        &self,
        palop_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<u64, RepositoryError> {
        let result = driftsavvik::Entity::update_many()
            .col_expr(
                driftsavvik::Column::TidspunktTil,
                sea_orm::sea_query::Expr::value(now),
            )
            .filter(driftsavvik::Column::PalopId.eq(palop_id))
            .filter(Self::aktiv(now))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected)
    }

    /// Outages in effect at `now`.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn aktive(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<driftsavvik::Model>, RepositoryError> {
        Ok(driftsavvik::Entity::find()
            .filter(Self::aktiv(now))
            .order_by_asc(driftsavvik::Column::TidspunktFra)
            .all(&self.db)
            .await?)
    }

    /// Whether any outage is in effect at `now`.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn er_aktiv(&self, now: DateTime<Utc>) -> Result<bool, RepositoryError> {
        let count = driftsavvik::Entity::find()
            .filter(Self::aktiv(now))
            .count(&self.db)
            .await?;
        Ok(count > 0)
    }

    fn aktiv(now: DateTime<Utc>) -> Condition {
        Condition::all()
            .add(driftsavvik::Column::TidspunktFra.lte(now))
            .add(
                Condition::any()
                    .add(driftsavvik::Column::TidspunktTil.is_null())
                    .add(driftsavvik::Column::TidspunktTil.gt(now)),
            )
    }
}
