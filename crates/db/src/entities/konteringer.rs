//! `SeaORM` Entity for konteringer table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "konteringer")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub oppdragsperiode_id: Uuid,
    pub transaksjonskode: String,
    pub overforingsperiode: String,
    pub overforingstidspunkt: Option<DateTimeWithTimeZone>,
    pub behandlingsstatus_ok_tidspunkt: Option<DateTimeWithTimeZone>,
    pub siste_batch_uid: Option<String>,
    #[sea_orm(column_name = "type")]
    pub kontering_type: String,
    pub soknad_type: String,
    pub vedtak_id: i64,
    pub opprettet_tidspunkt: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::oppdragsperioder::Entity",
        from = "Column::OppdragsperiodeId",
        to = "super::oppdragsperioder::Column::Id"
    )]
    Oppdragsperioder,
}

impl Related<super::oppdragsperioder::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Oppdragsperioder.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
