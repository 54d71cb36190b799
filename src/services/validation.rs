use std::collections::{HashMap, HashSet};

use crate::database::entities::{
    stage_databases, stage_fields, stage_services, stage_tables, EntityKind,
};
use crate::errors::{StageError, StageResult, Violation};
use crate::services::entity_store::EntityStore;

/// Field values a per-edit field check runs against.
#[derive(Clone, Copy, Debug)]
pub struct FieldCandidate<'a> {
    pub source_name: &'a str,
    pub source_type: &'a str,
    pub target_name: &'a str,
    pub target_type: &'a str,
    pub is_primary_key: bool,
}

impl<'a> From<&'a stage_fields::Model> for FieldCandidate<'a> {
    fn from(field: &'a stage_fields::Model) -> Self {
        Self {
            source_name: &field.source_name,
            source_type: &field.source_type,
            target_name: &field.target_name,
            target_type: &field.target_type,
            is_primary_key: field.is_primary_key,
        }
    }
}

/// Structural rule checks for the staged mapping tree
///
/// Per-edit checks look at the candidate values and its live siblings, excluding the
/// record being edited. The pre-commit check walks the whole live tree and reports
/// every problem it finds.
#[derive(Clone)]
pub struct StructureValidator {
    store: EntityStore,
}

impl StructureValidator {
    pub fn new(store: EntityStore) -> Self {
        Self { store }
    }

    pub async fn check_service(
        &self,
        exclude_id: Option<i32>,
        name: &str,
        target_db_type: &str,
    ) -> StageResult<Vec<Violation>> {
        let mut violations = Vec::new();
        require(&mut violations, EntityKind::Service, exclude_id, name, "service name", name);
        require(
            &mut violations,
            EntityKind::Service,
            exclude_id,
            name,
            "target database type",
            target_db_type,
        );

        let siblings = self.store.get_all::<stage_services::Entity>(false).await?;
        let clash = siblings.iter().any(|s| {
            Some(s.id) != exclude_id && s.current_name == name && s.target_db_type == target_db_type
        });
        if clash {
            violations.push(Violation::new(
                EntityKind::Service,
                exclude_id,
                name,
                format!("a service named '{name}' targeting '{target_db_type}' already exists"),
            ));
        }

        Ok(violations)
    }

    pub async fn check_database(
        &self,
        service_id: i32,
        exclude_id: Option<i32>,
        parent_path: &str,
        name: &str,
    ) -> StageResult<Vec<Violation>> {
        let path = join_path(parent_path, name);
        let mut violations = Vec::new();
        require(&mut violations, EntityKind::Database, exclude_id, &path, "database name", name);

        let siblings = self
            .store
            .get_children::<stage_databases::Entity>(service_id, false)
            .await?;
        if siblings
            .iter()
            .any(|d| Some(d.id) != exclude_id && d.current_name == name)
        {
            violations.push(Violation::new(
                EntityKind::Database,
                exclude_id,
                &path,
                format!("database '{name}' already exists in service '{parent_path}'"),
            ));
        }

        Ok(violations)
    }

    pub async fn check_table(
        &self,
        database_id: i32,
        exclude_id: Option<i32>,
        parent_path: &str,
        name: &str,
    ) -> StageResult<Vec<Violation>> {
        let path = join_path(parent_path, name);
        let mut violations = Vec::new();
        require(&mut violations, EntityKind::Table, exclude_id, &path, "table name", name);

        let siblings = self
            .store
            .get_children::<stage_tables::Entity>(database_id, false)
            .await?;
        if siblings
            .iter()
            .any(|t| Some(t.id) != exclude_id && t.current_name == name)
        {
            violations.push(Violation::new(
                EntityKind::Table,
                exclude_id,
                &path,
                format!("table '{name}' already exists in database '{parent_path}'"),
            ));
        }

        Ok(violations)
    }

    pub async fn check_field(
        &self,
        table_id: i32,
        exclude_id: Option<i32>,
        parent_path: &str,
        candidate: FieldCandidate<'_>,
    ) -> StageResult<Vec<Violation>> {
        let path = join_path(parent_path, candidate.source_name);
        let mut violations = Vec::new();
        require_field_values(&mut violations, exclude_id, &path, &candidate);

        let siblings = self
            .store
            .get_children::<stage_fields::Entity>(table_id, false)
            .await?;
        let others: Vec<&stage_fields::Model> = siblings
            .iter()
            .filter(|f| Some(f.id) != exclude_id)
            .collect();

        if others.iter().any(|f| f.source_name == candidate.source_name) {
            violations.push(Violation::new(
                EntityKind::Field,
                exclude_id,
                &path,
                format!(
                    "source field '{}' already exists in table '{parent_path}'",
                    candidate.source_name
                ),
            ));
        }

        if candidate.is_primary_key {
            if let Some(existing) = others.iter().find(|f| f.is_primary_key) {
                violations.push(Violation::new(
                    EntityKind::Field,
                    exclude_id,
                    &path,
                    format!(
                        "table '{parent_path}' already has primary key field '{}'",
                        existing.source_name
                    ),
                ));
            }
        }

        Ok(violations)
    }

    /// An explicit position for a new field must be free and leave no gap.
    pub async fn check_row_order(
        &self,
        table_id: i32,
        path: &str,
        row_order: i32,
    ) -> StageResult<Vec<Violation>> {
        let siblings = self
            .store
            .get_children::<stage_fields::Entity>(table_id, false)
            .await?;
        Ok(row_order_problem(&siblings, row_order)
            .map(|message| Violation::new(EntityKind::Field, None, path, message))
            .into_iter()
            .collect())
    }

    /// Whole-tree check run before every commit. Returns all violations found.
    pub async fn validate_tree(&self) -> StageResult<Vec<Violation>> {
        let mut violations = Vec::new();

        let services = self.store.get_all::<stage_services::Entity>(false).await?;
        let mut seen_services = HashSet::new();
        for service in &services {
            let service_path = service.current_name.clone();
            let service_id = Some(service.id);
            let service_values = [
                ("service name", service.current_name.as_str()),
                ("target database type", service.target_db_type.as_str()),
            ];
            for (label, value) in service_values {
                require(&mut violations, EntityKind::Service, service_id, &service_path, label, value);
            }

            let service_key = (service.current_name.as_str(), service.target_db_type.as_str());
            if !seen_services.insert(service_key) {
                violations.push(Violation::new(
                    EntityKind::Service,
                    service_id,
                    &service_path,
                    format!("duplicate service for target '{}'", service.target_db_type),
                ));
            }

            let databases = self
                .store
                .get_children::<stage_databases::Entity>(service.id, false)
                .await?;
            if databases.is_empty() {
                violations.push(Violation::new(
                    EntityKind::Service,
                    service_id,
                    &service_path,
                    "must contain at least one database",
                ));
            }

            let mut seen_databases = HashSet::new();
            for database in &databases {
                let database_path = join_path(&service_path, &database.current_name);
                self.validate_database(
                    database,
                    &database_path,
                    &mut seen_databases,
                    &mut violations,
                )
                .await?;
            }
        }

        Ok(violations)
    }

    /// Pre-commit gate: `Ok(())` or every violation at once
    pub async fn ensure_valid(&self) -> StageResult<()> {
        let violations = self.validate_tree().await?;
        if violations.is_empty() {
            Ok(())
        } else {
            Err(StageError::Validation(violations))
        }
    }

    async fn validate_database<'a>(
        &self,
        database: &'a stage_databases::Model,
        path: &str,
        seen: &mut HashSet<&'a str>,
        violations: &mut Vec<Violation>,
    ) -> StageResult<()> {
        let id = Some(database.id);
        let name = database.current_name.as_str();
        require(violations, EntityKind::Database, id, path, "database name", name);
        if !seen.insert(name) {
            violations.push(Violation::new(
                EntityKind::Database,
                id,
                path,
                "duplicate database name",
            ));
        }

        let tables = self
            .store
            .get_children::<stage_tables::Entity>(database.id, false)
            .await?;
        if tables.is_empty() {
            violations.push(Violation::new(
                EntityKind::Database,
                id,
                path,
                "must contain at least one table",
            ));
        }

        let mut seen_tables = HashSet::new();
        for table in &tables {
            let table_path = join_path(path, &table.current_name);
            let table_id = Some(table.id);
            let name = table.current_name.as_str();
            require(violations, EntityKind::Table, table_id, &table_path, "table name", name);
            if !seen_tables.insert(table.current_name.as_str()) {
                violations.push(Violation::new(
                    EntityKind::Table,
                    table_id,
                    &table_path,
                    "duplicate table name",
                ));
            }

            let fields = self
                .store
                .get_children::<stage_fields::Entity>(table.id, false)
                .await?;
            check_table_fields(table, &table_path, &fields, violations);
        }

        Ok(())
    }
}

/// Field-level rules for one table: required values, unique source names and
/// exactly one primary key.
fn check_table_fields(
    table: &stage_tables::Model,
    table_path: &str,
    fields: &[stage_fields::Model],
    violations: &mut Vec<Violation>,
) {
    let table_id = Some(table.id);
    if fields.is_empty() {
        violations.push(Violation::new(
            EntityKind::Table,
            table_id,
            table_path,
            "must contain at least one field",
        ));
    }

    let primary_keys = fields.iter().filter(|f| f.is_primary_key).count();
    if primary_keys != 1 {
        violations.push(Violation::new(
            EntityKind::Table,
            table_id,
            table_path,
            format!("must have exactly one primary key field (found {primary_keys})"),
        ));
    }

    let mut by_name: HashMap<&str, usize> = HashMap::new();
    for field in fields {
        let field_path = join_path(table_path, &field.source_name);
        let candidate = FieldCandidate::from(field);
        require_field_values(violations, Some(field.id), &field_path, &candidate);

        let count = by_name.entry(field.source_name.as_str()).or_default();
        *count += 1;
        if *count == 2 {
            violations.push(Violation::new(
                EntityKind::Field,
                Some(field.id),
                &field_path,
                "duplicate source field name",
            ));
        }
    }
}

fn require_field_values(
    violations: &mut Vec<Violation>,
    id: Option<i32>,
    path: &str,
    candidate: &FieldCandidate<'_>,
) {
    require(violations, EntityKind::Field, id, path, "source field name", candidate.source_name);
    require(violations, EntityKind::Field, id, path, "source field type", candidate.source_type);
    require(violations, EntityKind::Field, id, path, "target field name", candidate.target_name);
    require(violations, EntityKind::Field, id, path, "target field type", candidate.target_type);
}

fn require(
    violations: &mut Vec<Violation>,
    kind: EntityKind,
    id: Option<i32>,
    path: &str,
    label: &str,
    value: &str,
) {
    if value.trim().is_empty() {
        violations.push(Violation::new(kind, id, path, format!("{label} is required")));
    }
}

fn row_order_problem(siblings: &[stage_fields::Model], row_order: i32) -> Option<String> {
    let next = siblings.iter().map(|f| f.row_order).max().unwrap_or(0) + 1;
    if row_order < 1 || row_order > next {
        return Some(format!("row order {row_order} must be between 1 and {next}"));
    }
    siblings
        .iter()
        .find(|f| f.row_order == row_order)
        .map(|f| format!("row order {row_order} is already taken by field '{}'", f.source_name))
}

pub(crate) fn join_path(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{parent}/{name}")
    }
}
