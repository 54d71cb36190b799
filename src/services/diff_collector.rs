use tracing::debug;

use crate::database::entities::{
    stage_databases, stage_fields, stage_services, stage_tables, EntityStatus,
};
use crate::errors::StageResult;
use crate::payload::{
    ChangeSet, DatabaseKey, DatabaseUpdate, FieldAddition, FieldUpdate, ServiceKey,
    ServiceUpdate, TableKey, TableUpdate,
};
use crate::services::entity_store::EntityStore;

/// Walks the staged tree top-down and gathers the pending changes into one
/// [`ChangeSet`].
///
/// Deleted and updated records are keyed by their original names, including the
/// original service name and target type above them, so the server can find the
/// pre-edit rows.
/// Added services, databases and tables produce no entry of their own; each added
/// field carries the current names of all its ancestors instead.
#[derive(Clone)]
pub struct DiffCollector {
    store: EntityStore,
}

impl DiffCollector {
    pub fn new(store: EntityStore) -> Self {
        Self { store }
    }

    pub async fn collect(&self) -> StageResult<ChangeSet> {
        let mut changes = ChangeSet::default();

        let services = self.store.get_all::<stage_services::Entity>(true).await?;
        for service in &services {
            let key = ServiceKey {
                service_name: service.original_name.clone(),
                target_db_type: service.original_target_db_type.clone(),
            };
            match service.entity_status()? {
                EntityStatus::Deleted => changes.services.deleted.push(key),
                EntityStatus::Updated => changes.services.updated.push(ServiceUpdate {
                    key,
                    current_name: service.current_name.clone(),
                    target_db_type: service.target_db_type.clone(),
                }),
                EntityStatus::Added | EntityStatus::Unchanged => {}
            }

            let databases = self
                .store
                .get_children::<stage_databases::Entity>(service.id, true)
                .await?;
            for database in &databases {
                self.collect_database(service, database, &mut changes).await?;
            }
        }

        let summary = changes.summary();
        debug!(
            "Collected changes: {} deleted, {} updated, {} added",
            summary.deleted, summary.updated, summary.added
        );
        Ok(changes)
    }

    async fn collect_database(
        &self,
        service: &stage_services::Model,
        database: &stage_databases::Model,
        changes: &mut ChangeSet,
    ) -> StageResult<()> {
        let key = DatabaseKey {
            service_name: service.original_name.clone(),
            target_db_type: service.original_target_db_type.clone(),
            database_name: database.original_name.clone(),
        };
        match database.entity_status()? {
            EntityStatus::Deleted => changes.databases.deleted.push(key),
            EntityStatus::Updated => changes.databases.updated.push(DatabaseUpdate {
                key,
                current_name: database.current_name.clone(),
                source_schema: database.source_schema.clone(),
                target_db_name: database.target_db_name.clone(),
                target_schema: database.target_schema.clone(),
                source_db_type: database.source_db_type.clone(),
            }),
            EntityStatus::Added | EntityStatus::Unchanged => {}
        }

        let tables = self
            .store
            .get_children::<stage_tables::Entity>(database.id, true)
            .await?;
        for table in &tables {
            let key = TableKey {
                service_name: service.original_name.clone(),
                target_db_type: service.original_target_db_type.clone(),
                database_name: database.original_name.clone(),
                table_name: table.original_name.clone(),
            };
            match table.entity_status()? {
                EntityStatus::Deleted => changes.tables.deleted.push(key),
                EntityStatus::Updated => changes.tables.updated.push(TableUpdate {
                    key,
                    current_name: table.current_name.clone(),
                    source_schema: table.source_schema.clone(),
                    target_name: table.target_name.clone(),
                }),
                EntityStatus::Added | EntityStatus::Unchanged => {}
            }

            let fields = self
                .store
                .get_children::<stage_fields::Entity>(table.id, true)
                .await?;
            for field in &fields {
                match field.entity_status()? {
                    EntityStatus::Deleted => changes.fields.deleted.push(field.id),
                    EntityStatus::Updated => changes.fields.updated.push(field_update(field)),
                    EntityStatus::Added => changes
                        .fields
                        .added
                        .push(field_addition(service, database, table, field)),
                    EntityStatus::Unchanged => {}
                }
            }
        }

        Ok(())
    }
}

fn field_update(field: &stage_fields::Model) -> FieldUpdate {
    FieldUpdate {
        id: field.id,
        source_name: field.source_name.clone(),
        source_type: field.source_type.clone(),
        target_name: field.target_name.clone(),
        target_type: field.target_type.clone(),
        target_default_value: field.target_default_value.clone(),
        is_id: i32::from(field.is_primary_key),
        row_num: field.row_order,
    }
}

fn field_addition(
    service: &stage_services::Model,
    database: &stage_databases::Model,
    table: &stage_tables::Model,
    field: &stage_fields::Model,
) -> FieldAddition {
    FieldAddition {
        service_name: service.current_name.clone(),
        target_db_type: service.target_db_type.clone(),
        source_db_name: database.current_name.clone(),
        source_db_type: database.source_db_type.clone(),
        source_schema_name: database.source_schema.clone(),
        target_db_name: database.target_db_name.clone(),
        target_schema_name: database.target_schema.clone(),
        source_table_name: table.current_name.clone(),
        target_table_name: table.target_name.clone(),
        source_field_name: field.source_name.clone(),
        source_field_type: field.source_type.clone(),
        target_field_name: field.target_name.clone(),
        target_field_type: field.target_type.clone(),
        target_default_value: field.target_default_value.clone(),
        is_id: i32::from(field.is_primary_key),
        row_num: field.row_order,
    }
}
