//! `SeaORM` Entity for feilrapport table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "feilrapport")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub batch_uid: String,
    pub sak_id: String,
    pub antall_oppdrag: i32,
    pub antall_konteringer: i32,
    #[sea_orm(column_type = "Decimal(Some((19, 2)))")]
    pub sum: Decimal,
    #[sea_orm(column_type = "Text")]
    pub feilmeldinger: String,
    pub reskontro_funnet: Option<i32>,
    pub reskontro_mangler: Option<i32>,
    #[sea_orm(column_type = "Decimal(Some((19, 2)))", nullable)]
    pub reskontro_differanse: Option<Decimal>,
    pub opprettet_tidspunkt: DateTimeWithTimeZone,
    pub rapportert_tidspunkt: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
