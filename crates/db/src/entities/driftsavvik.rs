//! `SeaORM` Entity for driftsavvik table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "driftsavvik")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub tidspunkt_fra: DateTimeWithTimeZone,
    pub tidspunkt_til: Option<DateTimeWithTimeZone>,
    pub palop_id: Option<Uuid>,
    pub arsak: String,
    pub opprettet_av: String,
    pub opprettet_tidspunkt: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::palop::Entity",
        from = "Column::PalopId",
        to = "super::palop::Column::Id"
    )]
    Palop,
}

impl Related<super::palop::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Palop.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
