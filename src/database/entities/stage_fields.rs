use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::common_types::EntityStatus;
use crate::errors::StageResult;

/// Column-level mapping: how one source column is written to the target table.
///
/// Hydrated fields keep the server's id verbatim; it is the only identifier the
/// server hands out before the first commit.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "stage_fields")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub table_id: i32,
    pub source_name: String,
    pub source_type: String,
    pub target_name: String,
    pub target_type: String,
    pub target_default_value: Option<String>,
    pub is_primary_key: bool,
    pub row_order: i32,
    pub status: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::stage_tables::Entity",
        from = "Column::TableId",
        to = "super::stage_tables::Column::Id",
        on_delete = "Cascade"
    )]
    Tables,
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
