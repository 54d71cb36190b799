use sea_orm::{Database, DatabaseConnection};
use sea_orm_migration::MigratorTrait;

use crate::database::migrations::Migrator;
use crate::payload::MappingRow;

/// Fresh in-memory staging store with the schema applied
pub async fn setup_test_db() -> DatabaseConnection {
    let db = Database::connect("sqlite::memory:")
        .await
        .expect("Failed to connect to test database");

    Migrator::up(&db, None)
        .await
        .expect("Failed to run migrations");

    db
}

/// One server row for `service/database/table.field` with fixed type columns
pub fn mapping_row(
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
        target_db_type: "postgres".to_string(),
        source_db_name: database.to_string(),
        source_db_type: "mysql".to_string(),
        source_schema_name: "public".to_string(),
        target_db_name: format!("{database}_target"),
        target_schema_name: "staging".to_string(),
        source_table_name: table.to_string(),
        target_table_name: table.to_uppercase(),
        source_field_name: field.to_string(),
        source_field_type: "VARCHAR".to_string(),
        target_field_name: field.to_uppercase(),
        target_field_type: "TEXT".to_string(),
        target_default_value: None,
        is_id: i32::from(is_id),
        row_num,
    }
}

/// `svc1/d1/t1` with fields `a` (primary key) and `b`
pub fn sample_rows() -> Vec<MappingRow> {
    vec![
        mapping_row(1, "svc1", "d1", "t1", "a", true, 1),
        mapping_row(2, "svc1", "d1", "t1", "b", false, 2),
    ]
}
