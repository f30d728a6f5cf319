use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        self.create_scheduled_jobs_table(manager).await?;
        self.create_job_execution_logs_table(manager).await?;
        self.create_indexes(manager).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(JobExecutionLogs::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ScheduledJobs::Table).to_owned())
            .await?;
        Ok(())
    }
}

impl Migration {
    async fn create_scheduled_jobs_table(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ScheduledJobs::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ScheduledJobs::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ScheduledJobs::Name).string().not_null())
                    .col(
                        ColumnDef::new(ScheduledJobs::GenerationSettings)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ScheduledJobs::ScheduleConfig)
                            .text()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ScheduledJobs::CreatedBy).string().not_null())
                    .col(
                        ColumnDef::new(ScheduledJobs::NextRunAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ScheduledJobs::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(ColumnDef::new(ScheduledJobs::LastRunAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(ScheduledJobs::LastResult).text())
                    .col(
                        ColumnDef::new(ScheduledJobs::TotalRuns)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(ScheduledJobs::SuccessfulRuns)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(ScheduledJobs::FailedRuns)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(ScheduledJobs::TotalItemsGenerated)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(ScheduledJobs::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ScheduledJobs::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn create_job_execution_logs_table(
        &self,
        manager: &SchemaManager<'_>,
    ) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(JobExecutionLogs::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(JobExecutionLogs::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(JobExecutionLogs::JobId).string().not_null())
                    .col(ColumnDef::new(JobExecutionLogs::Status).string().not_null())
                    .col(
                        ColumnDef::new(JobExecutionLogs::StartedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(JobExecutionLogs::CompletedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(JobExecutionLogs::ExecutionTimeMs).big_integer())
                    .col(
                        ColumnDef::new(JobExecutionLogs::ContentGenerated)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(JobExecutionLogs::TopicsCreated)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(JobExecutionLogs::QuestionsCreated)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(JobExecutionLogs::ErrorMessage).text())
                    .col(ColumnDef::new(JobExecutionLogs::ErrorDetails).text())
                    .col(
                        ColumnDef::new(JobExecutionLogs::ExecutionMetadata)
                            .text()
                            .not_null(),
                    )
                    .col(ColumnDef::new(JobExecutionLogs::WorkerId).string().not_null())
                    .to_owned(),
            )
            .await
    }

    async fn create_indexes(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        // Due-job discovery
        manager
            .create_index(
                Index::create()
                    .name("idx_scheduled_jobs_active_next_run")
                    .table(ScheduledJobs::Table)
                    .col(ScheduledJobs::IsActive)
                    .col(ScheduledJobs::NextRunAt)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_job_execution_logs_job_id")
                    .table(JobExecutionLogs::Table)
                    .col(JobExecutionLogs::JobId)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;
        // Retention purge and stale-entry reconciliation
        manager
            .create_index(
                Index::create()
                    .name("idx_job_execution_logs_status_started_at")
                    .table(JobExecutionLogs::Table)
                    .col(JobExecutionLogs::Status)
                    .col(JobExecutionLogs::StartedAt)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_job_execution_logs_worker_id")
                    .table(JobExecutionLogs::Table)
                    .col(JobExecutionLogs::WorkerId)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum ScheduledJobs {
    Table,
    Id,
    Name,
    GenerationSettings,
    ScheduleConfig,
    CreatedBy,
    NextRunAt,
    IsActive,
    LastRunAt,
    LastResult,
    TotalRuns,
    SuccessfulRuns,
    FailedRuns,
    TotalItemsGenerated,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum JobExecutionLogs {
    Table,
    Id,
    JobId,
    Status,
    StartedAt,
    CompletedAt,
    ExecutionTimeMs,
    ContentGenerated,
    TopicsCreated,
    QuestionsCreated,
    ErrorMessage,
    ErrorDetails,
    ExecutionMetadata,
    WorkerId,
}
