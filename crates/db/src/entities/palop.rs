//! `SeaORM` Entity for palop table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "palop")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub kjoredato: DateTimeWithTimeZone,
    pub for_periode: String,
    pub startet_tidspunkt: Option<DateTimeWithTimeZone>,
    pub fullfort_tidspunkt: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::driftsavvik::Entity")]
    Driftsavvik,
}

impl Related<super::driftsavvik::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Driftsavvik.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
