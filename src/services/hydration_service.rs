use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use sea_orm::{ActiveModelTrait, ConnectionTrait, Set, TransactionTrait};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::database::entities::{
    stage_databases, stage_fields, stage_services, stage_tables, EntityStatus,
};
use crate::errors::StageResult;
use crate::payload::MappingRow;
use crate::services::entity_store::{clear_collections, EntityStore};

/// Counts of what a hydration created
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HydrationReport {
    pub services: usize,
    pub databases: usize,
    pub tables: usize,
    pub fields: usize,
    /// Rows that could not be resolved to a field under a service/database/table
    pub dropped_rows: usize,
    pub hydrated_at: DateTime<Utc>,
}

/// Rows of one table; `first` supplies the table-level attributes.
struct TableGroup<'a> {
    first: &'a MappingRow,
    fields: Vec<&'a MappingRow>,
}

/// Tables of one source database keyed by `(schema, table name)`.
struct DatabaseGroup<'a> {
    first: &'a MappingRow,
    tables: IndexMap<(&'a str, &'a str), TableGroup<'a>>,
}

type ServiceGroup<'a> = IndexMap<&'a str, DatabaseGroup<'a>>;

/// Rebuilds the local tree from the server's flat row-set
///
/// Hydration is a wholesale replace: the four collections are emptied and refilled
/// inside one transaction, every record starting as `unchanged`.
#[derive(Clone)]
pub struct HydrationService {
    store: EntityStore,
}

impl HydrationService {
    pub fn new(store: EntityStore) -> Self {
        Self { store }
    }

    /// Replace the whole staging store with the tree described by `rows`.
    ///
    /// Rows missing a database, table or field name cannot be placed under a parent
    /// and are dropped with a warning instead of failing the load. They still
    /// contribute the ancestors they do name (a row naming only a service keeps that
    /// service alive). The leniency matches how the server has always been read and is
    /// reported through `dropped_rows`.
    pub async fn hydrate(&self, rows: &[MappingRow]) -> StageResult<HydrationReport> {
        info!("Hydrating staging store from {} rows", rows.len());

        let mut dropped_rows = 0;
        let mut groups: IndexMap<(&str, &str), ServiceGroup<'_>> = IndexMap::new();
        for row in rows {
            let service = groups
                .entry((row.service_name.as_str(), row.target_db_type.as_str()))
                .or_default();

            if row.source_db_name.is_empty() {
                warn!("Dropping row {}: no source database for service '{}'", row.id, row.service_name);
                dropped_rows += 1;
                continue;
            }
            let database = service
                .entry(row.source_db_name.as_str())
                .or_insert_with(|| DatabaseGroup {
                    first: row,
                    tables: IndexMap::new(),
                });

            if row.source_table_name.is_empty() {
                warn!("Dropping row {}: no source table in database '{}'", row.id, row.source_db_name);
                dropped_rows += 1;
                continue;
            }
            let table = database
                .tables
                .entry((row.source_schema_name.as_str(), row.source_table_name.as_str()))
                .or_insert_with(|| TableGroup {
                    first: row,
                    fields: Vec::new(),
                });

            if row.source_field_name.is_empty() {
                warn!("Dropping row {}: no source field in table '{}'", row.id, row.source_table_name);
                dropped_rows += 1;
                continue;
            }
            table.fields.push(row);
        }

        let txn = self.store.connection().begin().await?;
        clear_collections(&txn).await?;

        let mut report = HydrationReport {
            services: 0,
            databases: 0,
            tables: 0,
            fields: 0,
            dropped_rows,
            hydrated_at: Utc::now(),
        };

        for ((service_name, target_db_type), databases) in &groups {
            let service = stage_services::ActiveModel {
                original_name: Set(service_name.to_string()),
                current_name: Set(service_name.to_string()),
                original_target_db_type: Set(target_db_type.to_string()),
                target_db_type: Set(target_db_type.to_string()),
                database_count: Set(databases.len() as i32),
                status: Set(EntityStatus::Unchanged.to_string()),
                ..Default::default()
            }
            .insert(&txn)
            .await?;
            report.services += 1;

            for (database_name, group) in databases {
                let database = insert_database(&txn, service.id, database_name, group).await?;
                report.databases += 1;

                for ((schema, table_name), table_group) in &group.tables {
                    let table = stage_tables::ActiveModel {
                        database_id: Set(database.id),
                        original_name: Set(table_name.to_string()),
                        current_name: Set(table_name.to_string()),
                        source_schema: Set(schema.to_string()),
                        target_name: Set(table_group.first.target_table_name.clone()),
                        field_count: Set(table_group.fields.len() as i32),
                        status: Set(EntityStatus::Unchanged.to_string()),
                        ..Default::default()
                    }
                    .insert(&txn)
                    .await?;
                    report.tables += 1;

                    for row in &table_group.fields {
                        field_from_row(table.id, row).insert(&txn).await?;
                        report.fields += 1;
                    }
                }
            }
        }

        txn.commit().await?;

        info!(
            "Hydration complete: {} services, {} databases, {} tables, {} fields ({} rows dropped)",
            report.services, report.databases, report.tables, report.fields, report.dropped_rows
        );
        Ok(report)
    }
}

async fn insert_database<C: ConnectionTrait>(
    db: &C,
    service_id: i32,
    name: &str,
    group: &DatabaseGroup<'_>,
) -> StageResult<stage_databases::Model> {
    // Database-level attributes repeat on every row of the group
    let first = group.first;
    let database = stage_databases::ActiveModel {
        service_id: Set(service_id),
        original_name: Set(name.to_string()),
        current_name: Set(name.to_string()),
        source_schema: Set(first.source_schema_name.clone()),
        target_db_name: Set(first.target_db_name.clone()),
        target_schema: Set(first.target_schema_name.clone()),
        source_db_type: Set(first.source_db_type.clone()),
        table_count: Set(group.tables.len() as i32),
        status: Set(EntityStatus::Unchanged.to_string()),
        ..Default::default()
    }
    .insert(db)
    .await?;

    debug!("Hydrated database '{}' with {} tables", name, group.tables.len());
    Ok(database)
}

fn field_from_row(table_id: i32, row: &MappingRow) -> stage_fields::ActiveModel {
    stage_fields::ActiveModel {
        // Field ids are server-assigned and kept as-is
        id: Set(row.id),
        table_id: Set(table_id),
        source_name: Set(row.source_field_name.clone()),
        source_type: Set(row.source_field_type.clone()),
        target_name: Set(row.target_field_name.clone()),
        target_type: Set(row.target_field_type.clone()),
        target_default_value: Set(row.target_default_value.clone().filter(|v| !v.is_empty())),
        is_primary_key: Set(row.is_id == 1),
        row_order: Set(row.row_num),
        status: Set(EntityStatus::Unchanged.to_string()),
    }
}

