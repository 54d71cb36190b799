#![allow(dead_code)]

use std::sync::Mutex;

use async_trait::async_trait;
use etl_stage::database::connection::open_staging_store;
use etl_stage::payload::{ChangeSet, MappingRow};
use etl_stage::remote::MappingServer;
use etl_stage::{StageError, StageResult, StagingEngine};

pub async fn setup_engine() -> StagingEngine {
    let db = open_staging_store("sqlite::memory:")
        .await
        .expect("Failed to open in-memory staging store");
    StagingEngine::new(db)
}

pub fn row(
    id: i32,
    service: &str,
    database: &str,
    table: &str,
    field: &str,
    is_id: bool,
    row_num: i32,
) -> MappingRow {
    MappingRow {
        id,
        service_name: service.to_string(),
        target_db_type: "mysql".to_string(),
        source_db_name: database.to_string(),
        source_db_type: "oracle".to_string(),
        source_schema_name: String::new(),
        target_db_name: format!("{database}_dw"),
        target_schema_name: "dw".to_string(),
        source_table_name: table.to_string(),
        target_table_name: format!("{table}_dw"),
        source_field_name: field.to_string(),
        source_field_type: "VARCHAR2".to_string(),
        target_field_name: field.to_string(),
        target_field_type: "VARCHAR".to_string(),
        target_default_value: None,
        is_id: i32::from(is_id),
        row_num,
    }
}

/// One service, two databases with two tables each, three fields per table
/// (the first one being the primary key).
pub fn wide_rows() -> Vec<MappingRow> {
    let mut rows = Vec::new();
    let mut id = 100;
    for database in ["d1", "d2"] {
        for table in ["t1", "t2"] {
            for (index, field) in ["id", "name", "created"].iter().enumerate() {
                id += 1;
                rows.push(row(id, "svc1", database, table, field, index == 0, index as i32 + 1));
            }
        }
    }
    rows
}

/// A mapping server kept in memory that applies change-sets to its own rows.
#[derive(Default)]
pub struct InMemoryMappingServer {
    rows: Mutex<Vec<MappingRow>>,
    received: Mutex<Vec<ChangeSet>>,
    reject_commits: Mutex<bool>,
}

impl InMemoryMappingServer {
    pub fn with_rows(rows: Vec<MappingRow>) -> Self {
        Self {
            rows: Mutex::new(rows),
            ..Default::default()
        }
    }

    pub fn rows(&self) -> Vec<MappingRow> {
        self.rows.lock().unwrap().clone()
    }

    pub fn received(&self) -> Vec<ChangeSet> {
        self.received.lock().unwrap().clone()
    }

    pub fn reject_commits(&self, reject: bool) {
        *self.reject_commits.lock().unwrap() = reject;
    }
}

#[async_trait]
impl MappingServer for InMemoryMappingServer {
    async fn fetch_rows(&self) -> StageResult<Vec<MappingRow>> {
        Ok(self.rows())
    }

    async fn apply_changes(&self, changes: &ChangeSet) -> StageResult<()> {
        if *self.reject_commits.lock().unwrap() {
            return Err(StageError::Remote("commit rejected".to_string()));
        }
        self.received.lock().unwrap().push(changes.clone());

        let mut rows = self.rows.lock().unwrap();

        // Children first: their keys still carry the pre-rename ancestor names
        rows.retain(|r| !changes.fields.deleted.contains(&r.id));
        for update in &changes.fields.updated {
            for r in rows.iter_mut().filter(|r| r.id == update.id) {
                r.source_field_name = update.source_name.clone();
                r.source_field_type = update.source_type.clone();
                r.target_field_name = update.target_name.clone();
                r.target_field_type = update.target_type.clone();
                r.target_default_value = update.target_default_value.clone();
                r.is_id = update.is_id;
                r.row_num = update.row_num;
            }
        }

        for key in &changes.tables.deleted {
            rows.retain(|r| {
                !(in_service(r, &key.service_name, &key.target_db_type)
                    && r.source_db_name == key.database_name
                    && r.source_table_name == key.table_name)
            });
        }
        for update in &changes.tables.updated {
            let key = &update.key;
            for r in rows.iter_mut().filter(|r| {
                in_service(r, &key.service_name, &key.target_db_type)
                    && r.source_db_name == key.database_name
                    && r.source_table_name == key.table_name
            }) {
                r.source_table_name = update.current_name.clone();
                r.target_table_name = update.target_name.clone();
            }
        }

        for key in &changes.databases.deleted {
            rows.retain(|r| {
                !(in_service(r, &key.service_name, &key.target_db_type)
                    && r.source_db_name == key.database_name)
            });
        }
        for update in &changes.databases.updated {
            let key = &update.key;
            for r in rows.iter_mut().filter(|r| {
                in_service(r, &key.service_name, &key.target_db_type)
                    && r.source_db_name == key.database_name
            }) {
                r.source_db_name = update.current_name.clone();
                r.target_db_name = update.target_db_name.clone();
                r.target_schema_name = update.target_schema.clone();
                r.source_db_type = update.source_db_type.clone();
            }
        }

        for key in &changes.services.deleted {
            rows.retain(|r| !in_service(r, &key.service_name, &key.target_db_type));
        }
        for update in &changes.services.updated {
            let key = &update.key;
            for r in rows
                .iter_mut()
                .filter(|r| in_service(r, &key.service_name, &key.target_db_type))
            {
                r.service_name = update.current_name.clone();
                r.target_db_type = update.target_db_type.clone();
            }
        }

        let mut next_id = rows.iter().map(|r| r.id).max().unwrap_or(0);
        for added in &changes.fields.added {
            next_id += 1;
            rows.push(MappingRow {
                id: next_id,
                service_name: added.service_name.clone(),
                target_db_type: added.target_db_type.clone(),
                source_db_name: added.source_db_name.clone(),
                source_db_type: added.source_db_type.clone(),
                source_schema_name: added.source_schema_name.clone(),
                target_db_name: added.target_db_name.clone(),
                target_schema_name: added.target_schema_name.clone(),
                source_table_name: added.source_table_name.clone(),
                target_table_name: added.target_table_name.clone(),
                source_field_name: added.source_field_name.clone(),
                source_field_type: added.source_field_type.clone(),
                target_field_name: added.target_field_name.clone(),
                target_field_type: added.target_field_type.clone(),
                target_default_value: added.target_default_value.clone(),
                is_id: added.is_id,
                row_num: added.row_num,
            });
        }

        Ok(())
    }
}

fn in_service(row: &MappingRow, service_name: &str, target_db_type: &str) -> bool {
    row.service_name == service_name && row.target_db_type == target_db_type
}
