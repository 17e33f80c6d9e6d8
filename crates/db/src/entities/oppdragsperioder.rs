//! `SeaORM` Entity for oppdragsperioder table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "oppdragsperioder")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub oppdrag_id: Uuid,
    pub vedtak_id: i64,
    pub vedtak_type: String,
    #[sea_orm(column_type = "Decimal(Some((19, 2)))")]
    pub belop: Decimal,
    pub valuta: String,
    pub periode_fra: Date,
    pub periode_til: Option<Date>,
    pub vedtaksdato: Date,
    pub opprettet_av: String,
    pub ekstern_referanse: Option<String>,
    pub konteringer_fullforte_opprettet: bool,
    pub opprettet_tidspunkt: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::oppdrag::Entity",
        from = "Column::OppdragId",
        to = "super::oppdrag::Column::Id"
    )]
    Oppdrag,
    #[sea_orm(has_many = "super::konteringer::Entity")]
    Konteringer,
}

impl Related<super::oppdrag::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Oppdrag.def()
    }
}

impl Related<super::konteringer::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Konteringer.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
