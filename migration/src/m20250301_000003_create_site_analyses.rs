use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(SiteAnalyses::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SiteAnalyses::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(SiteAnalyses::SiteId).uuid().not_null())
                    .col(ColumnDef::new(SiteAnalyses::AnalysisJobId).uuid().not_null())
                    .col(ColumnDef::new(SiteAnalyses::Status).string().not_null())
                    // Raw probe captures
                    .col(ColumnDef::new(SiteAnalyses::Pagespeed).json())
                    .col(ColumnDef::new(SiteAnalyses::Tls).json())
                    .col(ColumnDef::new(SiteAnalyses::Wordpress).json())
                    .col(ColumnDef::new(SiteAnalyses::Vulnerabilities).json())
                    .col(ColumnDef::new(SiteAnalyses::SecurityHeaders).json())
                    .col(ColumnDef::new(SiteAnalyses::Availability).json())
                    // Derived scores
                    .col(ColumnDef::new(SiteAnalyses::HealthScore).integer())
                    .col(ColumnDef::new(SiteAnalyses::SecurityScore).integer())
                    .col(ColumnDef::new(SiteAnalyses::PerformanceScore).integer())
                    .col(ColumnDef::new(SiteAnalyses::SeoScore).integer())
                    .col(ColumnDef::new(SiteAnalyses::AvailabilityScore).integer())
                    .col(ColumnDef::new(SiteAnalyses::PriorityClassification).string())
                    .col(ColumnDef::new(SiteAnalyses::ActionClassification).string())
                    .col(ColumnDef::new(SiteAnalyses::Deductions).json())
                    .col(ColumnDef::new(SiteAnalyses::Error).text())
                    .col(
                        ColumnDef::new(SiteAnalyses::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(SiteAnalyses::AnalyzedAt).timestamp_with_time_zone())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_site_analyses_site_created")
                    .table(SiteAnalyses::Table)
                    .col(SiteAnalyses::SiteId)
                    .col(SiteAnalyses::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_site_analyses_job")
                    .table(SiteAnalyses::Table)
                    .col(SiteAnalyses::AnalysisJobId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(SiteAnalyses::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum SiteAnalyses {
    Table,
    Id,
    SiteId,
    AnalysisJobId,
    Status,
    Pagespeed,
    Tls,
    Wordpress,
    Vulnerabilities,
    SecurityHeaders,
    Availability,
    HealthScore,
    SecurityScore,
    PerformanceScore,
    SeoScore,
    AvailabilityScore,
    PriorityClassification,
    ActionClassification,
    Deductions,
    Error,
    CreatedAt,
    AnalyzedAt,
}
