use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Jobs::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Jobs::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Jobs::JobType).string().not_null())
                    .col(ColumnDef::new(Jobs::Status).string().not_null())
                    .col(ColumnDef::new(Jobs::Provider).string())
                    .col(ColumnDef::new(Jobs::Config).json().not_null())
                    .col(ColumnDef::new(Jobs::Progress).integer().not_null().default(0))
                    .col(ColumnDef::new(Jobs::TotalItems).integer().not_null().default(0))
                    .col(
                        ColumnDef::new(Jobs::ProcessedItems)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Jobs::FailedItems).integer().not_null().default(0))
                    .col(ColumnDef::new(Jobs::Error).text())
                    .col(
                        ColumnDef::new(Jobs::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(Jobs::StartedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(Jobs::CompletedAt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(Jobs::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // Claim path: oldest pending job of a type
        manager
            .create_index(
                Index::create()
                    .name("idx_jobs_type_status_created")
                    .table(Jobs::Table)
                    .col(Jobs::JobType)
                    .col(Jobs::Status)
                    .col(Jobs::CreatedAt)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Jobs::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Jobs {
    Table,
    Id,
    JobType,
    Status,
    Provider,
    Config,
    Progress,
    TotalItems,
    ProcessedItems,
    FailedItems,
    Error,
    CreatedAt,
    StartedAt,
    CompletedAt,
    UpdatedAt,
}
