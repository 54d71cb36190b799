//! Boundary shapes exchanged with the mapping server.
//!
//! Hydration consumes a flat list of [`MappingRow`]s, one per field, each carrying its
//! full service/database/table context. A commit sends one [`ChangeSet`].

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::{StageError, StageResult};

/// One denormalised mapping row as served by the mapping server.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingRow {
    /// Server-assigned field id, kept verbatim by hydration
    pub id: i32,
    pub service_name: String,
    pub target_db_type: String,
    #[serde(default)]
    pub source_db_name: String,
    #[serde(default)]
    pub source_db_type: String,
    #[serde(default)]
    pub source_schema_name: String,
    #[serde(default)]
    pub target_db_name: String,
    #[serde(default)]
    pub target_schema_name: String,
    #[serde(default)]
    pub source_table_name: String,
    #[serde(default)]
    pub target_table_name: String,
    #[serde(default)]
    pub source_field_name: String,
    #[serde(default)]
    pub source_field_type: String,
    #[serde(default)]
    pub target_field_name: String,
    #[serde(default)]
    pub target_field_type: String,
    #[serde(default)]
    pub target_default_value: Option<String>,
    /// 1 when the field is the table's primary key
    #[serde(default)]
    pub is_id: i32,
    #[serde(default)]
    pub row_num: i32,
}

/// Load hydration rows from a `.json` array or a headed `.csv` file.
pub fn load_rows_from_file(path: &Path) -> StageResult<Vec<MappingRow>> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase());

    match extension.as_deref() {
        Some("csv") => {
            let mut reader = csv::Reader::from_path(path)
                .map_err(|e| StageError::Parse(format!("{}: {}", path.display(), e)))?;
            reader
                .deserialize()
                .collect::<Result<Vec<MappingRow>, _>>()
                .map_err(|e| StageError::Parse(format!("{}: {}", path.display(), e)))
        }
        Some("json") => {
            let content = std::fs::read_to_string(path)?;
            serde_json::from_str(&content)
                .map_err(|e| StageError::Parse(format!("{}: {}", path.display(), e)))
        }
        _ => Err(StageError::Parse(format!(
            "{}: expected a .json or .csv file",
            path.display()
        ))),
    }
}

/// Identity of a service as last known to the server.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceKey {
    pub service_name: String,
    pub target_db_type: String,
}

/// Database identity; the service part is the full original service key, since two
/// services may share a name across target types.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseKey {
    pub service_name: String,
    pub target_db_type: String,
    pub database_name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableKey {
    pub service_name: String,
    pub target_db_type: String,
    pub database_name: String,
    pub table_name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceUpdate {
    pub key: ServiceKey,
    pub current_name: String,
    pub target_db_type: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseUpdate {
    pub key: DatabaseKey,
    pub current_name: String,
    pub source_schema: String,
    pub target_db_name: String,
    pub target_schema: String,
    pub source_db_type: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableUpdate {
    pub key: TableKey,
    pub current_name: String,
    pub source_schema: String,
    pub target_name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldUpdate {
    pub id: i32,
    pub source_name: String,
    pub source_type: String,
    pub target_name: String,
    pub target_type: String,
    pub target_default_value: Option<String>,
    pub is_id: i32,
    pub row_num: i32,
}

/// A new field with the current names of every ancestor, so the server can create
/// missing parents from it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldAddition {
    pub service_name: String,
    pub target_db_type: String,
    pub source_db_name: String,
    pub source_db_type: String,
    pub source_schema_name: String,
    pub target_db_name: String,
    pub target_schema_name: String,
    pub source_table_name: String,
    pub target_table_name: String,
    pub source_field_name: String,
    pub source_field_type: String,
    pub target_field_name: String,
    pub target_field_type: String,
    pub target_default_value: Option<String>,
    pub is_id: i32,
    pub row_num: i32,
}

/// Deleted keys and updated records for one level of the tree.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionChanges<K, U> {
    pub deleted: Vec<K>,
    pub updated: Vec<U>,
}

impl<K, U> Default for SectionChanges<K, U> {
    fn default() -> Self {
        Self {
            deleted: Vec::new(),
            updated: Vec::new(),
        }
    }
}

impl<K, U> SectionChanges<K, U> {
    pub fn is_empty(&self) -> bool {
        self.deleted.is_empty() && self.updated.is_empty()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldChanges {
    pub deleted: Vec<i32>,
    pub updated: Vec<FieldUpdate>,
    pub added: Vec<FieldAddition>,
}

impl FieldChanges {
    pub fn is_empty(&self) -> bool {
        self.deleted.is_empty() && self.updated.is_empty() && self.added.is_empty()
    }
}

/// Everything a commit sends to the server in one request.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSet {
    pub services: SectionChanges<ServiceKey, ServiceUpdate>,
    pub databases: SectionChanges<DatabaseKey, DatabaseUpdate>,
    pub tables: SectionChanges<TableKey, TableUpdate>,
    pub fields: FieldChanges,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
            && self.databases.is_empty()
            && self.tables.is_empty()
            && self.fields.is_empty()
    }

    pub fn summary(&self) -> ChangeSummary {
        ChangeSummary {
            deleted: self.services.deleted.len()
                + self.databases.deleted.len()
                + self.tables.deleted.len()
                + self.fields.deleted.len(),
            updated: self.services.updated.len()
                + self.databases.updated.len()
                + self.tables.updated.len()
                + self.fields.updated.len(),
            added: self.fields.added.len(),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSummary {
    pub deleted: usize,
    pub updated: usize,
    pub added: usize,
}
