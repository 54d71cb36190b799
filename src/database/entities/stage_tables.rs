use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::common_types::EntityStatus;
use crate::errors::StageResult;

/// A source table and the name it is written to on the target side.
///
/// `source_schema` is kept per table because one source database may expose tables
/// from several schemas.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "stage_tables")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub database_id: i32,
    pub original_name: String,
    pub current_name: String,
    pub source_schema: String,
    pub target_name: String,
    pub field_count: i32,
    pub status: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::stage_databases::Entity",
        from = "Column::DatabaseId",
        to = "super::stage_databases::Column::Id",
        on_delete = "Cascade"
    )]
    Databases,
    #[sea_orm(has_many = "super::stage_fields::Entity")]
    Fields,
}

impl Related<super::stage_databases::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Databases.def()
    }
}

impl Related<super::stage_fields::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Fields.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn entity_status(&self) -> StageResult<EntityStatus> {
        self.status.parse()
    }
}
