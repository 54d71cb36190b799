use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::common_types::EntityStatus;
use crate::errors::StageResult;

/// A source database mapped by a service, together with where it lands on the target.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "stage_databases")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub service_id: i32,
    pub original_name: String,
    pub current_name: String,
    pub source_schema: String,
    pub target_db_name: String,
    pub target_schema: String,
    pub source_db_type: String,
    pub table_count: i32,
    pub status: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::stage_services::Entity",
        from = "Column::ServiceId",
        to = "super::stage_services::Column::Id",
        on_delete = "Cascade"
    )]
    Services,
    #[sea_orm(has_many = "super::stage_tables::Entity")]
    Tables,
}

impl Related<super::stage_services::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Services.def()
    }
}

impl Related<super::stage_tables::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Tables.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn entity_status(&self) -> StageResult<EntityStatus> {
        self.status.parse()
    }
}
