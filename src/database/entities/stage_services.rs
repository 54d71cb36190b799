use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::common_types::EntityStatus;
use crate::errors::StageResult;

/// Top level of the staged mapping tree: one ETL service writing into one target
/// database type.
///
/// `original_name` and `original_target_db_type` are the identity last seen on the
/// server and are never touched by local updates; together they identify the record
/// when the change-set is committed.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "stage_services")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub original_name: String,
    pub current_name: String,
    pub original_target_db_type: String,
    pub target_db_type: String,
    pub database_count: i32,
    pub status: String, // 'unchanged', 'added', 'updated', 'deleted'
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::stage_databases::Entity")]
    Databases,
}

impl Related<super::stage_databases::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Databases.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn entity_status(&self) -> StageResult<EntityStatus> {
        self.status.parse()
    }
}
