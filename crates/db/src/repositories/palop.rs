//! Accrual run repository.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde::Serialize;
use uuid::Uuid;

use regnskap_core::domain::Overforingsperiode;
use regnskap_shared::types::PalopId;

use super::error::RepositoryError;
use crate::entities::palop;

/// Lifecycle state of an accrual run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PalopStatus {
    /// Scheduled, not started.
    Planlagt,
    /// Started, not finished.
    Startet,
    /// Finished.
    Fullfort,
}

impl PalopStatus {
    /// Derives the state from the run's timestamps.
    #[must_use]
    pub const fn fra_modell(model: &palop::Model) -> Self {
        match (&model.startet_tidspunkt, &model.fullfort_tidspunkt) {
            (_, Some(_)) => Self::Fullfort,
            (Some(_), None) => Self::Startet,
            (None, None) => Self::Planlagt,
        }
    }
}

/// Accrual run repository.
#[derive(Debug, Clone)]
pub struct PalopRepository {
    db: DatabaseConnection,
}

impl PalopRepository {
    /// Creates a new accrual run repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Schedules an accrual run.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub async fn opprett(
        &self,
        kjoredato: DateTime<Utc>,
        for_periode: Overforingsperiode,
    ) -> Result<palop::Model, RepositoryError> {
        let model = palop::ActiveModel {
            id: Set(PalopId::new().into_inner()),
            kjoredato: Set(kjoredato.into()),
            for_periode: Set(for_periode.to_string()),
            startet_tidspunkt: Set(None),
            fullfort_tidspunkt: Set(None),
        };
        Ok(model.insert(&self.db).await?)
    }

    /// All runs, latest scheduled first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn list(&self) -> Result<Vec<palop::Model>, RepositoryError> {
        Ok(palop::Entity::find()
            .order_by_desc(palop::Column::Kjoredato)
            .all(&self.db)
            .await?)
    }

    /// Finds a run by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<palop::Model>, RepositoryError> {
        Ok(palop::Entity::find_by_id(id).one(&self.db).await?)
    }

    /// The earliest unfinished run that is due.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn neste_ventende(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Option<palop::Model>, RepositoryError> {
        Ok(palop::Entity::find()
            .filter(palop::Column::FullfortTidspunkt.is_null())
            .filter(palop::Column::Kjoredato.lte(now))
            .order_by_asc(palop::Column::Kjoredato)
            .one(&self.db)
            .await?)
    }

    /// The earliest run scheduled after `now`.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn neste_fremtidige(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Option<palop::Model>, RepositoryError> {
        Ok(palop::Entity::find()
            .filter(palop::Column::FullfortTidspunkt.is_null())
            .filter(palop::Column::Kjoredato.gt(now))
            .order_by_asc(palop::Column::Kjoredato)
            .one(&self.db)
            .await?)
    }

    /// Stamps the start time.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the run does not exist.
    pub async fn marker_startet(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<palop::Model, RepositoryError> {
        let model = self.hent(id).await?;
        let mut active: palop::ActiveModel = model.into();
        active.startet_tidspunkt = Set(Some(now.into()));
        Ok(active.update(&self.db).await?)
    }

    /// Stamps the finish time.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the run does not exist.
    pub async fn marker_fullfort(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<palop::Model, RepositoryError> {
        let model = self.hent(id).await?;
        let mut active: palop::ActiveModel = model.into();
        active.fullfort_tidspunkt = Set(Some(now.into()));
        Ok(active.update(&self.db).await?)
    }

    /// The latest closed accounting month: the highest period among finished
    /// runs. A late or repeated run for an earlier month never moves it back.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or the stored period is malformed.
    pub async fn siste_lukkede(&self) -> Result<Option<Overforingsperiode>, RepositoryError> {
        // "YYYY-MM" sorts chronologically as text.
        let siste = palop::Entity::find()
            .filter(palop::Column::FullfortTidspunkt.is_not_null())
            .order_by_desc(palop::Column::ForPeriode)
            .one(&self.db)
            .await?;

        siste
            .map(|p| {
                Overforingsperiode::from_str(&p.for_periode)
                    .map_err(|_| RepositoryError::invalid("for_periode", &p.for_periode))
            })
            .transpose()
    }

    async fn hent(&self, id: Uuid) -> Result<palop::Model, RepositoryError> {
        self.find_by_id(id)
            .await?
            .ok_or(RepositoryError::NotFound {
                entity: "palop",
                id,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn model(startet: bool, fullfort: bool) -> palop::Model {
        let t = Utc.with_ymd_and_hms(2024, 3, 1, 2, 0, 0).unwrap();
        palop::Model {
            id: Uuid::nil(),
            kjoredato: t.into(),
            for_periode: "2024-02".to_string(),
            startet_tidspunkt: startet.then(|| t.into()),
            fullfort_tidspunkt: fullfort.then(|| t.into()),
        }
    }

    #[test]
    fn test_status_from_timestamps() {
        assert_eq!(PalopStatus::fra_modell(&model(false, false)), PalopStatus::Planlagt);
        assert_eq!(PalopStatus::fra_modell(&model(true, false)), PalopStatus::Startet);
        assert_eq!(PalopStatus::fra_modell(&model(true, true)), PalopStatus::Fullfort);
    }
}
