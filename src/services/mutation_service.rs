use sea_orm::ActiveValue::Unchanged;
use sea_orm::Set;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::database::entities::{
    stage_databases, stage_fields, stage_services, stage_tables, EntityKind, EntityStatus,
};
use crate::errors::{StageError, StageResult, Violation};
use crate::services::entity_store::{EntityStore, StagedEntity};
use crate::services::loading_gate::LoadingGate;
use crate::services::validation::{join_path, FieldCandidate, StructureValidator};

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct NewService {
    pub name: String,
    pub target_db_type: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ServicePatch {
    pub name: Option<String>,
    pub target_db_type: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct NewDatabase {
    pub name: String,
    pub source_schema: String,
    pub target_db_name: String,
    pub target_schema: String,
    pub source_db_type: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DatabasePatch {
    pub name: Option<String>,
    pub source_schema: Option<String>,
    pub target_db_name: Option<String>,
    pub target_schema: Option<String>,
    pub source_db_type: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct NewTable {
    pub name: String,
    pub source_schema: String,
    pub target_name: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TablePatch {
    pub name: Option<String>,
    pub source_schema: Option<String>,
    pub target_name: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct NewField {
    pub source_name: String,
    pub source_type: String,
    pub target_name: String,
    pub target_type: String,
    pub target_default_value: Option<String>,
    pub is_primary_key: bool,
    /// Defaults to one past the highest live `row_order` in the table. An explicit
    /// value must not be taken by a live sibling nor leave a gap.
    pub row_order: Option<i32>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FieldPatch {
    pub source_name: Option<String>,
    pub source_type: Option<String>,
    pub target_name: Option<String>,
    pub target_type: Option<String>,
    /// `Some(None)` clears the default value
    pub target_default_value: Option<Option<String>>,
    pub is_primary_key: Option<bool>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoveDirection {
    Up,
    Down,
}

/// Records touched by a delete
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CascadeOutcome {
    /// Physically removed (locally added records and fields under a deleted table)
    pub purged: usize,
    /// Kept with `deleted` status for the next commit
    pub tombstoned: usize,
}

impl CascadeOutcome {
    /// Wrap a failure that happened after some writes already landed.
    ///
    /// Cascades are not rolled back; the partial state stays and is reported.
    fn into_error(self, kind: EntityKind, id: i32, err: StageError) -> StageError {
        if self.purged + self.tombstoned == 0 {
            return err;
        }

        error!(
            "Cascade delete of {} {} stopped after {} purged and {} tombstoned records: {}",
            kind, id, self.purged, self.tombstoned, err
        );
        StageError::CascadeIncomplete {
            kind,
            id,
            source: Box::new(err),
        }
    }
}

fn reject(violations: Vec<Violation>) -> StageResult<()> {
    if violations.is_empty() {
        Ok(())
    } else {
        Err(StageError::Validation(violations))
    }
}

fn trimmed(value: &str) -> String {
    value.trim().to_string()
}

/// Patched value if present, the stored one otherwise
fn merged(patch: Option<String>, current: &str) -> String {
    match patch {
        Some(value) => trimmed(&value),
        None => current.to_string(),
    }
}

/// Add, update, delete and reorder operations over the staged tree
///
/// Every add/update is validated against live siblings before anything is written.
/// Status follows the change-tracking rules: new records start `added`, updates turn
/// `unchanged` into `updated`, deletes purge `added` records and tombstone the rest.
#[derive(Clone)]
pub struct MutationService {
    store: EntityStore,
    validator: StructureValidator,
    gate: LoadingGate,
}

impl MutationService {
    pub fn new(store: EntityStore, validator: StructureValidator, gate: LoadingGate) -> Self {
        Self {
            store,
            validator,
            gate,
        }
    }

    // ----- Services ---------------------------------------------------------

    pub async fn add_service(&self, input: NewService) -> StageResult<stage_services::Model> {
        self.gate.ensure_idle()?;
        let name = trimmed(&input.name);
        let target_db_type = trimmed(&input.target_db_type);
        reject(self.validator.check_service(None, &name, &target_db_type).await?)?;

        let service = self
            .store
            .insert(stage_services::ActiveModel {
                original_name: Set(name.clone()),
                current_name: Set(name),
                original_target_db_type: Set(target_db_type.clone()),
                target_db_type: Set(target_db_type),
                database_count: Set(0),
                status: Set(EntityStatus::Added.to_string()),
                ..Default::default()
            })
            .await?;

        debug!("Added service {} '{}'", service.id, service.current_name);
        Ok(service)
    }

    pub async fn update_service(&self, id: i32, patch: ServicePatch) -> StageResult<stage_services::Model> {
        self.gate.ensure_idle()?;
        let current = self.store.require::<stage_services::Entity>(id).await?;
        let name = merged(patch.name, &current.current_name);
        let target_db_type = merged(patch.target_db_type, &current.target_db_type);
        reject(self.validator.check_service(Some(id), &name, &target_db_type).await?)?;

        let status = current.entity_status()?.after_update();
        let mut active: stage_services::ActiveModel = current.into();
        active.current_name = Set(name);
        active.target_db_type = Set(target_db_type);
        active.status = Set(status.to_string());

        let service = self.store.save(active).await?;
        debug!("Updated service {} (now {})", id, status);
        Ok(service)
    }

    /// Delete a service and everything under it, children before parents.
    pub async fn delete_service(&self, id: i32) -> StageResult<CascadeOutcome> {
        self.gate.ensure_idle()?;
        let service = self.store.require::<stage_services::Entity>(id).await?;

        let mut outcome = CascadeOutcome::default();
        match self.cascade_service(&service, &mut outcome).await {
            Ok(()) => {
                info!(
                    "Deleted service '{}': {} purged, {} tombstoned",
                    service.current_name, outcome.purged, outcome.tombstoned
                );
                Ok(outcome)
            }
            Err(err) => Err(outcome.into_error(EntityKind::Service, id, err)),
        }
    }

    // ----- Databases --------------------------------------------------------

    pub async fn add_database(
        &self,
        service_id: i32,
        input: NewDatabase,
    ) -> StageResult<stage_databases::Model> {
        self.gate.ensure_idle()?;
        let service = self.store.require::<stage_services::Entity>(service_id).await?;
        let name = trimmed(&input.name);
        reject(
            self.validator
                .check_database(service.id, None, &service.current_name, &name)
                .await?,
        )?;

        let database = self
            .store
            .insert(stage_databases::ActiveModel {
                service_id: Set(service.id),
                original_name: Set(name.clone()),
                current_name: Set(name),
                source_schema: Set(trimmed(&input.source_schema)),
                target_db_name: Set(trimmed(&input.target_db_name)),
                target_schema: Set(trimmed(&input.target_schema)),
                source_db_type: Set(trimmed(&input.source_db_type)),
                table_count: Set(0),
                status: Set(EntityStatus::Added.to_string()),
                ..Default::default()
            })
            .await?;
        self.refresh_database_count(service.id).await?;

        debug!("Added database {} '{}' to service {}", database.id, database.current_name, service.id);
        Ok(database)
    }

    pub async fn update_database(
        &self,
        id: i32,
        patch: DatabasePatch,
    ) -> StageResult<stage_databases::Model> {
        self.gate.ensure_idle()?;
        let current = self.store.require::<stage_databases::Entity>(id).await?;
        let (service, _) = self.store.database_ancestry(id).await?;
        let name = merged(patch.name, &current.current_name);
        reject(
            self.validator
                .check_database(current.service_id, Some(id), &service.current_name, &name)
                .await?,
        )?;

        let status = current.entity_status()?.after_update();
        let mut active: stage_databases::ActiveModel = current.into();
        active.current_name = Set(name);
        if let Some(value) = patch.source_schema {
            active.source_schema = Set(trimmed(&value));
        }
        if let Some(value) = patch.target_db_name {
            active.target_db_name = Set(trimmed(&value));
        }
        if let Some(value) = patch.target_schema {
            active.target_schema = Set(trimmed(&value));
        }
        if let Some(value) = patch.source_db_type {
            active.source_db_type = Set(trimmed(&value));
        }
        active.status = Set(status.to_string());

        let database = self.store.save(active).await?;
        debug!("Updated database {} (now {})", id, status);
        Ok(database)
    }

    pub async fn delete_database(&self, id: i32) -> StageResult<CascadeOutcome> {
        self.gate.ensure_idle()?;
        let database = self.store.require::<stage_databases::Entity>(id).await?;

        let mut outcome = CascadeOutcome::default();
        if let Err(err) = self.cascade_database(&database, &mut outcome).await {
            return Err(outcome.into_error(EntityKind::Database, id, err));
        }
        self.refresh_database_count(database.service_id).await?;

        info!(
            "Deleted database '{}': {} purged, {} tombstoned",
            database.current_name, outcome.purged, outcome.tombstoned
        );
        Ok(outcome)
    }

    // ----- Tables -----------------------------------------------------------

    pub async fn add_table(&self, database_id: i32, input: NewTable) -> StageResult<stage_tables::Model> {
        self.gate.ensure_idle()?;
        let database = self.store.require::<stage_databases::Entity>(database_id).await?;
        let (service, _) = self.store.database_ancestry(database_id).await?;
        let parent_path = join_path(&service.current_name, &database.current_name);
        let name = trimmed(&input.name);
        reject(
            self.validator
                .check_table(database.id, None, &parent_path, &name)
                .await?,
        )?;

        let table = self
            .store
            .insert(stage_tables::ActiveModel {
                database_id: Set(database.id),
                original_name: Set(name.clone()),
                current_name: Set(name),
                source_schema: Set(trimmed(&input.source_schema)),
                target_name: Set(trimmed(&input.target_name)),
                field_count: Set(0),
                status: Set(EntityStatus::Added.to_string()),
                ..Default::default()
            })
            .await?;
        self.refresh_table_count(database.id).await?;

        debug!("Added table {} '{}' to database {}", table.id, table.current_name, database.id);
        Ok(table)
    }

    pub async fn update_table(&self, id: i32, patch: TablePatch) -> StageResult<stage_tables::Model> {
        self.gate.ensure_idle()?;
        let current = self.store.require::<stage_tables::Entity>(id).await?;
        let (service, database) = self.store.database_ancestry(current.database_id).await?;
        let parent_path = join_path(&service.current_name, &database.current_name);
        let name = merged(patch.name, &current.current_name);
        reject(
            self.validator
                .check_table(current.database_id, Some(id), &parent_path, &name)
                .await?,
        )?;

        let status = current.entity_status()?.after_update();
        let mut active: stage_tables::ActiveModel = current.into();
        active.current_name = Set(name);
        if let Some(value) = patch.source_schema {
            active.source_schema = Set(trimmed(&value));
        }
        if let Some(value) = patch.target_name {
            active.target_name = Set(trimmed(&value));
        }
        active.status = Set(status.to_string());

        let table = self.store.save(active).await?;
        debug!("Updated table {} (now {})", id, status);
        Ok(table)
    }

    pub async fn delete_table(&self, id: i32) -> StageResult<CascadeOutcome> {
        self.gate.ensure_idle()?;
        let table = self.store.require::<stage_tables::Entity>(id).await?;

        let mut outcome = CascadeOutcome::default();
        if let Err(err) = self.cascade_table(&table, &mut outcome).await {
            return Err(outcome.into_error(EntityKind::Table, id, err));
        }
        self.refresh_table_count(table.database_id).await?;

        info!(
            "Deleted table '{}': {} purged, {} tombstoned",
            table.current_name, outcome.purged, outcome.tombstoned
        );
        Ok(outcome)
    }

    // ----- Fields -----------------------------------------------------------

    pub async fn add_field(&self, table_id: i32, input: NewField) -> StageResult<stage_fields::Model> {
        self.gate.ensure_idle()?;
        self.store.require::<stage_tables::Entity>(table_id).await?;
        let ancestry = self.store.table_ancestry(table_id).await?;

        let source_name = trimmed(&input.source_name);
        let source_type = trimmed(&input.source_type);
        let target_name = trimmed(&input.target_name);
        let target_type = trimmed(&input.target_type);
        let candidate = FieldCandidate {
            source_name: &source_name,
            source_type: &source_type,
            target_name: &target_name,
            target_type: &target_type,
            is_primary_key: input.is_primary_key,
        };
        let mut violations = self
            .validator
            .check_field(table_id, None, &ancestry.path(), candidate)
            .await?;
        let row_order = match input.row_order {
            Some(order) => {
                let path = join_path(&ancestry.path(), &source_name);
                violations.extend(self.validator.check_row_order(table_id, &path, order).await?);
                order
            }
            None => self.next_row_order(table_id).await?,
        };
        reject(violations)?;

        let field = self
            .store
            .insert(stage_fields::ActiveModel {
                table_id: Set(table_id),
                source_name: Set(source_name),
                source_type: Set(source_type),
                target_name: Set(target_name),
                target_type: Set(target_type),
                target_default_value: Set(input.target_default_value),
                is_primary_key: Set(input.is_primary_key),
                row_order: Set(row_order),
                status: Set(EntityStatus::Added.to_string()),
                ..Default::default()
            })
            .await?;
        self.refresh_field_count(table_id).await?;

        debug!("Added field {} '{}' to table {}", field.id, field.source_name, table_id);
        Ok(field)
    }

    pub async fn update_field(&self, id: i32, patch: FieldPatch) -> StageResult<stage_fields::Model> {
        self.gate.ensure_idle()?;
        let current = self.store.require::<stage_fields::Entity>(id).await?;
        let ancestry = self.store.table_ancestry(current.table_id).await?;

        let source_name = merged(patch.source_name, &current.source_name);
        let source_type = merged(patch.source_type, &current.source_type);
        let target_name = merged(patch.target_name, &current.target_name);
        let target_type = merged(patch.target_type, &current.target_type);
        let is_primary_key = patch.is_primary_key.unwrap_or(current.is_primary_key);
        let candidate = FieldCandidate {
            source_name: &source_name,
            source_type: &source_type,
            target_name: &target_name,
            target_type: &target_type,
            is_primary_key,
        };
        reject(
            self.validator
                .check_field(current.table_id, Some(id), &ancestry.path(), candidate)
                .await?,
        )?;

        let status = current.entity_status()?.after_update();
        let mut active: stage_fields::ActiveModel = current.into();
        active.source_name = Set(source_name);
        active.source_type = Set(source_type);
        active.target_name = Set(target_name);
        active.target_type = Set(target_type);
        active.is_primary_key = Set(is_primary_key);
        if let Some(value) = patch.target_default_value {
            active.target_default_value = Set(value);
        }
        active.status = Set(status.to_string());

        let field = self.store.save(active).await?;
        debug!("Updated field {} (now {})", id, status);
        Ok(field)
    }

    pub async fn delete_field(&self, id: i32) -> StageResult<CascadeOutcome> {
        self.gate.ensure_idle()?;
        let field = self.store.require::<stage_fields::Entity>(id).await?;

        let mut outcome = CascadeOutcome::default();
        self.retire::<stage_fields::Entity>(field.id, field.entity_status()?, &mut outcome)
            .await?;
        self.refresh_field_count(field.table_id).await?;

        debug!("Deleted field {} '{}'", id, field.source_name);
        Ok(outcome)
    }

    /// Swap a field with its live neighbour and renumber the table's live fields
    /// densely from 1. Each changed field is written straight away.
    ///
    /// Returns `false` when the field is already first (up) or last (down).
    pub async fn move_field(&self, id: i32, direction: MoveDirection) -> StageResult<bool> {
        self.gate.ensure_idle()?;
        let field = self.store.require::<stage_fields::Entity>(id).await?;
        let mut siblings = self
            .store
            .get_children::<stage_fields::Entity>(field.table_id, false)
            .await?;

        let position = siblings
            .iter()
            .position(|f| f.id == id)
            .ok_or_else(|| StageError::not_found(EntityKind::Field, id))?;
        let neighbour = match direction {
            MoveDirection::Up => position.checked_sub(1),
            MoveDirection::Down => Some(position + 1).filter(|next| *next < siblings.len()),
        };
        let Some(neighbour) = neighbour else {
            debug!("Field {} is already at the {:?} edge", id, direction);
            return Ok(false);
        };
        siblings.swap(position, neighbour);

        for (index, sibling) in siblings.into_iter().enumerate() {
            let row_order = index as i32 + 1;
            if sibling.row_order == row_order {
                continue;
            }

            let status = sibling.entity_status()?.after_update();
            self.store
                .save(stage_fields::ActiveModel {
                    id: Unchanged(sibling.id),
                    row_order: Set(row_order),
                    status: Set(status.to_string()),
                    ..Default::default()
                })
                .await?;
            debug!("Field {} moved to row {} ({})", sibling.id, row_order, status);
        }

        Ok(true)
    }

    // ----- Cascade helpers --------------------------------------------------

    async fn cascade_service(
        &self,
        service: &stage_services::Model,
        outcome: &mut CascadeOutcome,
    ) -> StageResult<()> {
        // Tombstoned children are revisited so a retry finishes an earlier partial cascade
        let databases = self
            .store
            .get_children::<stage_databases::Entity>(service.id, true)
            .await?;
        for database in &databases {
            self.cascade_database(database, outcome).await?;
        }
        self.retire::<stage_services::Entity>(service.id, service.entity_status()?, outcome)
            .await
    }

    async fn cascade_database(
        &self,
        database: &stage_databases::Model,
        outcome: &mut CascadeOutcome,
    ) -> StageResult<()> {
        let tables = self
            .store
            .get_children::<stage_tables::Entity>(database.id, true)
            .await?;
        for table in &tables {
            self.cascade_table(table, outcome).await?;
        }
        self.retire::<stage_databases::Entity>(database.id, database.entity_status()?, outcome)
            .await
    }

    /// Fields go away physically; the table's own tombstone tells the server.
    async fn cascade_table(
        &self,
        table: &stage_tables::Model,
        outcome: &mut CascadeOutcome,
    ) -> StageResult<()> {
        let fields = self
            .store
            .get_children::<stage_fields::Entity>(table.id, true)
            .await?;
        for field in &fields {
            self.store.hard_delete::<stage_fields::Entity>(field.id).await?;
            outcome.purged += 1;
        }
        self.retire::<stage_tables::Entity>(table.id, table.entity_status()?, outcome)
            .await
    }

    /// Purge a locally added record, tombstone anything the server knows about.
    async fn retire<E: StagedEntity>(
        &self,
        id: i32,
        status: EntityStatus,
        outcome: &mut CascadeOutcome,
    ) -> StageResult<()> {
        if !status.keeps_tombstone() {
            self.store.hard_delete::<E>(id).await?;
            outcome.purged += 1;
        } else if !status.is_tombstone() {
            self.store.set_status::<E>(id, EntityStatus::Deleted).await?;
            outcome.tombstoned += 1;
        }
        Ok(())
    }

    async fn next_row_order(&self, table_id: i32) -> StageResult<i32> {
        let fields = self
            .store
            .get_children::<stage_fields::Entity>(table_id, false)
            .await?;
        Ok(fields.iter().map(|f| f.row_order).max().unwrap_or(0) + 1)
    }

    // Derived counts never touch the parent's status

    async fn refresh_database_count(&self, service_id: i32) -> StageResult<()> {
        let count = self.store.count_children::<stage_databases::Entity>(service_id).await?;
        self.store
            .save(stage_services::ActiveModel {
                id: Unchanged(service_id),
                database_count: Set(count),
                ..Default::default()
            })
            .await?;
        Ok(())
    }

    async fn refresh_table_count(&self, database_id: i32) -> StageResult<()> {
        let count = self.store.count_children::<stage_tables::Entity>(database_id).await?;
        self.store
            .save(stage_databases::ActiveModel {
                id: Unchanged(database_id),
                table_count: Set(count),
                ..Default::default()
            })
            .await?;
        Ok(())
    }

    async fn refresh_field_count(&self, table_id: i32) -> StageResult<()> {
        let count = self.store.count_children::<stage_fields::Entity>(table_id).await?;
        self.store
            .save(stage_tables::ActiveModel {
                id: Unchanged(table_id),
                field_count: Set(count),
                ..Default::default()
            })
            .await?;
        Ok(())
    }
}
