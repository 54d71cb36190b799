use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelBehavior, ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection,
    EntityTrait, IntoActiveModel, QueryFilter, QueryOrder,
};
use tracing::debug;

use crate::database::entities::{
    stage_databases, stage_fields, stage_services, stage_tables, EntityKind, EntityStatus,
};
use crate::errors::{StageError, StageResult};

/// Column wiring shared by the four staging tables.
///
/// Lets the store read, filter and tombstone any level of the tree without knowing
/// which one it is handling.
pub trait StagedEntity: EntityTrait {
    const KIND: EntityKind;

    fn id_column() -> Self::Column;
    fn status_column() -> Self::Column;
    /// Column holding the parent id; `None` for the root level
    fn parent_column() -> Option<Self::Column>;

    fn order_column() -> Self::Column {
        Self::id_column()
    }
}

impl StagedEntity for stage_services::Entity {
    const KIND: EntityKind = EntityKind::Service;

    fn id_column() -> Self::Column {
        stage_services::Column::Id
    }

    fn status_column() -> Self::Column {
        stage_services::Column::Status
    }

    fn parent_column() -> Option<Self::Column> {
        None
    }
}

impl StagedEntity for stage_databases::Entity {
    const KIND: EntityKind = EntityKind::Database;

    fn id_column() -> Self::Column {
        stage_databases::Column::Id
    }

    fn status_column() -> Self::Column {
        stage_databases::Column::Status
    }

    fn parent_column() -> Option<Self::Column> {
        Some(stage_databases::Column::ServiceId)
    }
}

impl StagedEntity for stage_tables::Entity {
    const KIND: EntityKind = EntityKind::Table;

    fn id_column() -> Self::Column {
        stage_tables::Column::Id
    }

    fn status_column() -> Self::Column {
        stage_tables::Column::Status
    }

    fn parent_column() -> Option<Self::Column> {
        Some(stage_tables::Column::DatabaseId)
    }
}

impl StagedEntity for stage_fields::Entity {
    const KIND: EntityKind = EntityKind::Field;

    fn id_column() -> Self::Column {
        stage_fields::Column::Id
    }

    fn status_column() -> Self::Column {
        stage_fields::Column::Status
    }

    fn parent_column() -> Option<Self::Column> {
        Some(stage_fields::Column::TableId)
    }

    fn order_column() -> Self::Column {
        stage_fields::Column::RowOrder
    }
}

/// Persistent keyed store for the staged mapping tree
///
/// Every read hides tombstoned (`deleted`) records unless the caller asks for them.
/// Writes are single-record operations, each atomic on its own; callers issue one at
/// a time.
#[derive(Clone)]
pub struct EntityStore {
    db: DatabaseConnection,
}

impl EntityStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    /// Fetch a live record by id
    pub async fn get<E: StagedEntity>(&self, id: i32) -> StageResult<Option<E::Model>> {
        let record = E::find()
            .filter(E::id_column().eq(id))
            .filter(E::status_column().ne(EntityStatus::Deleted.as_str()))
            .one(&self.db)
            .await?;
        Ok(record)
    }

    /// Fetch a record by id, tombstones included
    pub async fn get_including_deleted<E: StagedEntity>(
        &self,
        id: i32,
    ) -> StageResult<Option<E::Model>> {
        let record = E::find()
            .filter(E::id_column().eq(id))
            .one(&self.db)
            .await?;
        Ok(record)
    }

    /// Fetch a live record or fail with `NotFound`
    pub async fn require<E: StagedEntity>(&self, id: i32) -> StageResult<E::Model> {
        self.get::<E>(id)
            .await?
            .ok_or_else(|| StageError::not_found(E::KIND, id))
    }

    pub async fn get_all<E: StagedEntity>(&self, include_deleted: bool) -> StageResult<Vec<E::Model>> {
        let mut query = E::find();
        if !include_deleted {
            query = query.filter(E::status_column().ne(EntityStatus::Deleted.as_str()));
        }

        let records = query.order_by_asc(E::id_column()).all(&self.db).await?;
        Ok(records)
    }

    /// Children of `parent_id` through the parent index, ordered by the level's
    /// natural order (`row_order` for fields, id otherwise).
    pub async fn get_children<E: StagedEntity>(
        &self,
        parent_id: i32,
        include_deleted: bool,
    ) -> StageResult<Vec<E::Model>> {
        let Some(parent_column) = E::parent_column() else {
            return self.get_all::<E>(include_deleted).await;
        };

        let mut query = E::find().filter(parent_column.eq(parent_id));
        if !include_deleted {
            query = query.filter(E::status_column().ne(EntityStatus::Deleted.as_str()));
        }

        let records = query
            .order_by_asc(E::order_column())
            .order_by_asc(E::id_column())
            .all(&self.db)
            .await?;
        Ok(records)
    }

    /// Number of live children under `parent_id`
    pub async fn count_children<E: StagedEntity>(&self, parent_id: i32) -> StageResult<i32> {
        let children = self.get_children::<E>(parent_id, false).await?;
        Ok(children.len() as i32)
    }

    /// Insert a new record, returning it with its store-assigned id
    pub async fn insert<A>(&self, model: A) -> StageResult<<A::Entity as EntityTrait>::Model>
    where
        A: ActiveModelTrait + ActiveModelBehavior + Send + 'static,
        <A::Entity as EntityTrait>::Model: IntoActiveModel<A>,
    {
        let record = model.insert(&self.db).await?;
        Ok(record)
    }

    /// Write the `Set` columns of a partial active model onto its record
    pub async fn save<A>(&self, model: A) -> StageResult<<A::Entity as EntityTrait>::Model>
    where
        A: ActiveModelTrait + ActiveModelBehavior + Send + 'static,
        <A::Entity as EntityTrait>::Model: IntoActiveModel<A>,
    {
        let record = model.update(&self.db).await?;
        Ok(record)
    }

    pub async fn set_status<E: StagedEntity>(&self, id: i32, status: EntityStatus) -> StageResult<()> {
        let result = E::update_many()
            .col_expr(E::status_column(), Expr::value(status.as_str()))
            .filter(E::id_column().eq(id))
            .exec(&self.db)
            .await?;

        if result.rows_affected == 0 {
            return Err(StageError::not_found(E::KIND, id));
        }

        debug!("Marked {} {} as {}", E::KIND, id, status);
        Ok(())
    }

    /// Physically remove a record
    pub async fn hard_delete<E: StagedEntity>(&self, id: i32) -> StageResult<()> {
        let result = E::delete_many()
            .filter(E::id_column().eq(id))
            .exec(&self.db)
            .await?;

        if result.rows_affected == 0 {
            return Err(StageError::not_found(E::KIND, id));
        }

        debug!("Purged {} {}", E::KIND, id);
        Ok(())
    }

    /// Remove every record of every level
    pub async fn clear_all(&self) -> StageResult<()> {
        clear_collections(&self.db).await
    }
}

/// Empty all four collections, children first. Generic so hydration can run it
/// inside its transaction.
pub(crate) async fn clear_collections<C: ConnectionTrait>(db: &C) -> StageResult<()> {
    stage_fields::Entity::delete_many().exec(db).await?;
    stage_tables::Entity::delete_many().exec(db).await?;
    stage_databases::Entity::delete_many().exec(db).await?;
    stage_services::Entity::delete_many().exec(db).await?;
    Ok(())
}

/// A table together with every ancestor, resolved through the parent ids.
#[derive(Clone, Debug)]
pub struct TableAncestry {
    pub service: stage_services::Model,
    pub database: stage_databases::Model,
    pub table: stage_tables::Model,
}

impl TableAncestry {
    pub fn path(&self) -> String {
        format!(
            "{}/{}/{}",
            self.service.current_name, self.database.current_name, self.table.current_name
        )
    }
}

impl EntityStore {
    /// Resolve a database and its service, tombstones included
    pub async fn database_ancestry(
        &self,
        database_id: i32,
    ) -> StageResult<(stage_services::Model, stage_databases::Model)> {
        let database = self
            .get_including_deleted::<stage_databases::Entity>(database_id)
            .await?
            .ok_or_else(|| StageError::not_found(EntityKind::Database, database_id))?;
        let service = self
            .get_including_deleted::<stage_services::Entity>(database.service_id)
            .await?
            .ok_or_else(|| StageError::not_found(EntityKind::Service, database.service_id))?;
        Ok((service, database))
    }

    /// Resolve a table, its database and its service, tombstones included
    pub async fn table_ancestry(&self, table_id: i32) -> StageResult<TableAncestry> {
        let table = self
            .get_including_deleted::<stage_tables::Entity>(table_id)
            .await?
            .ok_or_else(|| StageError::not_found(EntityKind::Table, table_id))?;
        let (service, database) = self.database_ancestry(table.database_id).await?;
        Ok(TableAncestry {
            service,
            database,
            table,
        })
    }
}
