//! `SeaORM` Entity for oppdrag table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "oppdrag")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub stonad_type: String,
    pub sak_id: String,
    pub skyldner_ident: String,
    pub kravhaver_ident: String,
    pub mottaker_ident: String,
    pub gjelder_ident: String,
    pub utsatt_til_dato: Option<Date>,
    pub har_feilet: bool,
    pub endret_tidspunkt: DateTimeWithTimeZone,
    pub opprettet_tidspunkt: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::oppdragsperioder::Entity")]
    Oppdragsperioder,
}

impl Related<super::oppdragsperioder::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Oppdragsperioder.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
