use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(StageServices::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(StageServices::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(StageServices::OriginalName).string().not_null())
                    .col(ColumnDef::new(StageServices::CurrentName).string().not_null())
                    .col(
                        ColumnDef::new(StageServices::OriginalTargetDbType)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(StageServices::TargetDbType).string().not_null())
                    .col(
                        ColumnDef::new(StageServices::DatabaseCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(StageServices::Status)
                            .string()
                            .not_null()
                            .default("unchanged"),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(StageDatabases::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(StageDatabases::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(StageDatabases::ServiceId).integer().not_null())
                    .col(ColumnDef::new(StageDatabases::OriginalName).string().not_null())
                    .col(ColumnDef::new(StageDatabases::CurrentName).string().not_null())
                    .col(
                        ColumnDef::new(StageDatabases::SourceSchema)
                            .string()
                            .not_null()
                            .default(""),
                    )
                    .col(
                        ColumnDef::new(StageDatabases::TargetDbName)
                            .string()
                            .not_null()
                            .default(""),
                    )
                    .col(
                        ColumnDef::new(StageDatabases::TargetSchema)
                            .string()
                            .not_null()
                            .default(""),
                    )
                    .col(
                        ColumnDef::new(StageDatabases::SourceDbType)
                            .string()
                            .not_null()
                            .default(""),
                    )
                    .col(
                        ColumnDef::new(StageDatabases::TableCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(StageDatabases::Status)
                            .string()
                            .not_null()
                            .default("unchanged"),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_stage_databases_service_id")
                            .from(StageDatabases::Table, StageDatabases::ServiceId)
                            .to(StageServices::Table, StageServices::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_stage_databases_service_id")
                    .table(StageDatabases::Table)
                    .col(StageDatabases::ServiceId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(StageTables::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(StageTables::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(StageTables::DatabaseId).integer().not_null())
                    .col(ColumnDef::new(StageTables::OriginalName).string().not_null())
                    .col(ColumnDef::new(StageTables::CurrentName).string().not_null())
                    .col(
                        ColumnDef::new(StageTables::SourceSchema)
                            .string()
                            .not_null()
                            .default(""),
                    )
                    .col(
                        ColumnDef::new(StageTables::TargetName)
                            .string()
                            .not_null()
                            .default(""),
                    )
                    .col(
                        ColumnDef::new(StageTables::FieldCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(StageTables::Status)
                            .string()
                            .not_null()
                            .default("unchanged"),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_stage_tables_database_id")
                            .from(StageTables::Table, StageTables::DatabaseId)
                            .to(StageDatabases::Table, StageDatabases::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_stage_tables_database_id")
                    .table(StageTables::Table)
                    .col(StageTables::DatabaseId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(StageFields::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(StageFields::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(StageFields::TableId).integer().not_null())
                    .col(ColumnDef::new(StageFields::SourceName).string().not_null())
                    .col(
                        ColumnDef::new(StageFields::SourceType)
                            .string()
                            .not_null()
                            .default(""),
                    )
                    .col(
                        ColumnDef::new(StageFields::TargetName)
                            .string()
                            .not_null()
                            .default(""),
                    )
                    .col(
                        ColumnDef::new(StageFields::TargetType)
                            .string()
                            .not_null()
                            .default(""),
                    )
                    .col(ColumnDef::new(StageFields::TargetDefaultValue).string())
                    .col(
                        ColumnDef::new(StageFields::IsPrimaryKey)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(StageFields::RowOrder).integer().not_null())
                    .col(
                        ColumnDef::new(StageFields::Status)
                            .string()
                            .not_null()
                            .default("unchanged"),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_stage_fields_table_id")
                            .from(StageFields::Table, StageFields::TableId)
                            .to(StageTables::Table, StageTables::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_stage_fields_table_id")
                    .table(StageFields::Table)
                    .col(StageFields::TableId)
                    .to_owned(),
            )
            .await?;

        // Field ordering within a table
        manager
            .create_index(
                Index::create()
                    .name("idx_stage_fields_row_order")
                    .table(StageFields::Table)
                    .col(StageFields::TableId)
                    .col(StageFields::RowOrder)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(StageFields::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(StageTables::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(StageDatabases::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(StageServices::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum StageServices {
    Table,
    Id,
    OriginalName,
    CurrentName,
    OriginalTargetDbType,
    TargetDbType,
    DatabaseCount,
    Status,
}

#[derive(DeriveIden)]
enum StageDatabases {
    Table,
    Id,
    ServiceId,
    OriginalName,
    CurrentName,
    SourceSchema,
    TargetDbName,
    TargetSchema,
    SourceDbType,
    TableCount,
    Status,
}

#[derive(DeriveIden)]
enum StageTables {
    Table,
    Id,
    DatabaseId,
    OriginalName,
    CurrentName,
    SourceSchema,
    TargetName,
    FieldCount,
    Status,
}

#[derive(DeriveIden)]
enum StageFields {
    Table,
    Id,
    TableId,
    SourceName,
    SourceType,
    TargetName,
    TargetType,
    TargetDefaultValue,
    IsPrimaryKey,
    RowOrder,
    Status,
}
