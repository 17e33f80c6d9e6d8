//! Failure report entries.
//!
//! An entry is written when a batch fails and stays until the morning
//! report that includes it has been sent.

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use uuid::Uuid;

use regnskap_core::behandlingsstatus::FeilrapportLinje;
use regnskap_core::krav::ReskontroSammenligning;

use super::error::RepositoryError;
use crate::entities::feilrapport;

/// Failure report repository.
#[derive(Debug, Clone)]
pub struct FeilrapportRepository {
    db: DatabaseConnection,
}

impl FeilrapportRepository {
    /// Creates a new failure report repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Records a failed batch.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub async fn lagre(&self, linje: &FeilrapportLinje) -> Result<Uuid, RepositoryError> {
        let model = feilrapport::ActiveModel {
            id: Set(Uuid::now_v7()),
            batch_uid: Set(linje.batch_uid.clone()),
            sak_id: Set(linje.sak_id.clone()),
            antall_oppdrag: Set(til_i32(linje.antall_oppdrag)),
            antall_konteringer: Set(til_i32(linje.antall_konteringer)),
            sum: Set(linje.sum),
            feilmeldinger: Set(linje.feilmeldinger.join("\n")),
            reskontro_funnet: Set(linje.sammenligning.as_ref().map(|s| til_i32(s.funnet))),
            reskontro_mangler: Set(linje.sammenligning.as_ref().map(|s| til_i32(s.mangler))),
            reskontro_differanse: Set(linje.sammenligning.as_ref().map(|s| s.differanse)),
            opprettet_tidspunkt: Set(linje.oppdaget.into()),
            rapportert_tidspunkt: Set(None),
        }
        .insert(&self.db)
        .await?;
        Ok(model.id)
    }

    /// Entries not yet included in a sent report, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn urapporterte(&self) -> Result<Vec<(Uuid, FeilrapportLinje)>, RepositoryError> {
        Ok(feilrapport::Entity::find()
            .filter(feilrapport::Column::RapportertTidspunkt.is_null())
            .order_by_asc(feilrapport::Column::OpprettetTidspunkt)
            .order_by_asc(feilrapport::Column::Id)
            .all(&self.db)
            .await?
            .into_iter()
            .map(|m| (m.id, fra_modell(m)))
            .collect())
    }

    /// Stamps entries as reported.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub async fn marker_rapportert(
        &self,
        ids: &[Uuid],
        now: DateTime<Utc>,
    ) -> Result<u64, RepositoryError> {
        let result = feilrapport::Entity::update_many()
            .col_expr(
                feilrapport::Column::RapportertTidspunkt,
                sea_orm::sea_query::Expr::value(now),
            )
            .filter(feilrapport::Column::Id.is_in(ids.iter().copied()))
            .filter(feilrapport::Column::RapportertTidspunkt.is_null())
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected)
    }
}

fn til_i32(n: usize) -> i32 {
    i32::try_from(n).unwrap_or(i32::MAX)
}

fn fra_modell(m: feilrapport::Model) -> FeilrapportLinje {
    let sammenligning = match (m.reskontro_funnet, m.reskontro_mangler, m.reskontro_differanse) {
        (Some(funnet), Some(mangler), Some(differanse)) => Some(ReskontroSammenligning {
            funnet: usize::try_from(funnet).unwrap_or_default(),
            mangler: usize::try_from(mangler).unwrap_or_default(),
            differanse,
        }),
        _ => None,
    };

    FeilrapportLinje {
        batch_uid: m.batch_uid,
        sak_id: m.sak_id,
        antall_oppdrag: usize::try_from(m.antall_oppdrag).unwrap_or_default(),
        antall_konteringer: usize::try_from(m.antall_konteringer).unwrap_or_default(),
        sum: m.sum,
        feilmeldinger: m
            .feilmeldinger
            .lines()
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect(),
        sammenligning,
        oppdaget: m.opprettet_tidspunkt.with_timezone(&Utc),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn model(sammenligning: bool) -> feilrapport::Model {
        let t = Utc.with_ymd_and_hms(2024, 3, 1, 2, 0, 0).unwrap();
        feilrapport::Model {
            id: Uuid::nil(),
            batch_uid: "b-1".to_string(),
            sak_id: "123456".to_string(),
            antall_oppdrag: 2,
            antall_konteringer: 3,
            sum: dec!(4277.00),
            feilmeldinger: "first\nsecond".to_string(),
            reskontro_funnet: sammenligning.then_some(1),
            reskontro_mangler: sammenligning.then_some(2),
            reskontro_differanse: sammenligning.then_some(dec!(1500.00)),
            opprettet_tidspunkt: t.into(),
            rapportert_tidspunkt: None,
        }
    }

    #[test]
    fn test_stored_entry_reads_back() {
        let linje = fra_modell(model(true));
        assert_eq!(linje.feilmeldinger, vec!["first", "second"]);
        assert_eq!(linje.antall_konteringer, 3);
        assert_eq!(
            linje.sammenligning,
            Some(ReskontroSammenligning {
                funnet: 1,
                mangler: 2,
                differanse: dec!(1500.00),
            })
        );
    }

    #[test]
    fn test_missing_comparison_reads_as_none() {
        assert_eq!(fra_modell(model(false)).sammenligning, None);
    }
}
