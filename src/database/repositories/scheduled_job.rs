//! SeaORM scheduled job repository
//!
//! Owns the scheduling state of every job: due-job discovery, advancing
//! `next_run_at` after a run and retention purges.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error};
use uuid::Uuid;

use crate::entities::{job_execution_logs, prelude::*, scheduled_jobs};
use crate::errors::{StoreError, StoreResult};
use crate::models::{
    ExecutionStatus, GenerationSettings, Job, JobRecord, PurgeReport, ScheduleConfig,
};
use crate::repositories::JobStore;
use crate::utils::cron_helper::{next_run_after, validate_schedule};

/// Fields needed to register a new scheduled job
#[derive(Debug, Clone)]
pub struct ScheduledJobCreateRequest {
    pub name: String,
    pub generation_settings: GenerationSettings,
    pub created_by: String,
    pub next_run_at: DateTime<Utc>,
    pub schedule_config: ScheduleConfig,
}

/// SeaORM-based job store
#[derive(Clone)]
pub struct ScheduledJobSeaOrmRepository {
    connection: Arc<DatabaseConnection>,
    /// Age after which completed log entries and finished one-shot jobs are purged
    retention: Duration,
}

impl ScheduledJobSeaOrmRepository {
    pub fn new(connection: Arc<DatabaseConnection>, retention: Duration) -> Self {
        Self {
            connection,
            retention,
        }
    }

    /// Create a new active job
    pub async fn create(&self, request: ScheduledJobCreateRequest) -> StoreResult<Job> {
        let id = Uuid::new_v4();
        validate_schedule(&request.schedule_config).map_err(|message| {
            StoreError::InvalidSchedule {
                job_id: id.to_string(),
                message,
            }
        })?;
        let now = Utc::now();

        let active_model = scheduled_jobs::ActiveModel {
            id: Set(id.to_string()),
            name: Set(request.name.clone()),
            generation_settings: Set(serde_json::to_string(&request.generation_settings)?),
            schedule_config: Set(serde_json::to_string(&request.schedule_config)?),
            created_by: Set(request.created_by.clone()),
            next_run_at: Set(request.next_run_at),
            is_active: Set(true),
            last_run_at: Set(None),
            last_result: Set(None),
            total_runs: Set(0),
            successful_runs: Set(0),
            failed_runs: Set(0),
            total_items_generated: Set(0),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let model = active_model.insert(&*self.connection).await?;
        model_to_job(&model)
    }

    /// Find a job and its scheduling state by ID
    pub async fn find_by_id(&self, id: &Uuid) -> StoreResult<Option<JobRecord>> {
        let model = ScheduledJobs::find_by_id(id.to_string())
            .one(&*self.connection)
            .await?;
        model.as_ref().map(model_to_record).transpose()
    }

    fn retention_cutoff(&self) -> StoreResult<DateTime<Utc>> {
        let retention = chrono::Duration::from_std(self.retention)
            .map_err(|e| StoreError::unavailable(format!("Invalid retention: {e}")))?;
        Ok(Utc::now() - retention)
    }
}

#[async_trait]
impl JobStore for ScheduledJobSeaOrmRepository {
    async fn fetch_due_jobs(&self, now: DateTime<Utc>) -> StoreResult<Vec<Job>> {
        let models = ScheduledJobs::find()
            .filter(scheduled_jobs::Column::IsActive.eq(true))
            .filter(scheduled_jobs::Column::NextRunAt.lte(now))
            .order_by_asc(scheduled_jobs::Column::NextRunAt)
            .order_by_asc(scheduled_jobs::Column::CreatedAt)
            .all(&*self.connection)
            .await?;

        // A row that no longer maps to a job must not hold back the others
        let jobs: Vec<Job> = models
            .iter()
            .filter_map(|model| match model_to_job(model) {
                Ok(job) => Some(job),
                Err(e) => {
                    error!("Skipping due job {} with unreadable definition: {}", model.id, e);
                    None
                }
            })
            .collect();
        Ok(jobs)
    }

    async fn commit_execution(
        &self,
        job_id: Uuid,
        success: bool,
        result: &Value,
        produced_count: u32,
    ) -> StoreResult<()> {
        let txn = self.connection.begin().await?;

        let model = ScheduledJobs::find_by_id(job_id.to_string())
            .one(&txn)
            .await?
            .ok_or_else(|| StoreError::not_found("job", job_id))?;

        let now = Utc::now();
        let next_run = serde_json::from_str::<ScheduleConfig>(&model.schedule_config)
            .map_err(|e| e.to_string())
            .and_then(|schedule_config| next_run_after(&schedule_config, now))
            .unwrap_or_else(|message| {
                error!("Deactivating job {} with invalid schedule: {}", job_id, message);
                None
            });

        let total_runs = model.total_runs + 1;
        let successful_runs = model.successful_runs + i64::from(success);
        let failed_runs = model.failed_runs + i64::from(!success);
        let total_items_generated = if success {
            model.total_items_generated + i64::from(produced_count)
        } else {
            model.total_items_generated
        };

        let mut active_model: scheduled_jobs::ActiveModel = model.into();
        match next_run {
            Some(next_run_at) => active_model.next_run_at = Set(next_run_at),
            None => active_model.is_active = Set(false),
        }
        active_model.last_run_at = Set(Some(now));
        active_model.last_result = Set(Some(serde_json::to_string(result)?));
        active_model.total_runs = Set(total_runs);
        active_model.successful_runs = Set(successful_runs);
        active_model.failed_runs = Set(failed_runs);
        active_model.total_items_generated = Set(total_items_generated);
        active_model.updated_at = Set(now);
        active_model.update(&txn).await?;

        txn.commit().await?;

        debug!(
            "Committed job {} (success: {}, next run: {})",
            job_id,
            success,
            next_run
                .map(|at| at.format("%Y-%m-%d %H:%M:%S UTC").to_string())
                .unwrap_or_else(|| "none, deactivated".to_string())
        );
        Ok(())
    }

    async fn purge_old_data(&self) -> StoreResult<PurgeReport> {
        let cutoff = self.retention_cutoff()?;

        let logs = JobExecutionLogs::delete_many()
            .filter(job_execution_logs::Column::Status.ne(ExecutionStatus::Running.to_string()))
            .filter(job_execution_logs::Column::CompletedAt.lt(cutoff))
            .exec(&*self.connection)
            .await?;

        let jobs = ScheduledJobs::delete_many()
            .filter(scheduled_jobs::Column::IsActive.eq(false))
            .filter(scheduled_jobs::Column::LastRunAt.lt(cutoff))
            .exec(&*self.connection)
            .await?;

        Ok(PurgeReport {
            execution_logs_deleted: logs.rows_affected,
            inactive_jobs_deleted: jobs.rows_affected,
        })
    }
}

fn model_to_job(model: &scheduled_jobs::Model) -> StoreResult<Job> {
    Ok(Job {
        id: StoreError::parse_id(&model.id)?,
        name: model.name.clone(),
        generation_settings: serde_json::from_str(&model.generation_settings)?,
        created_by: model.created_by.clone(),
        next_run_at: model.next_run_at,
        schedule_config: serde_json::from_str(&model.schedule_config)?,
    })
}

fn model_to_record(model: &scheduled_jobs::Model) -> StoreResult<JobRecord> {
    Ok(JobRecord {
        job: model_to_job(model)?,
        is_active: model.is_active,
        last_run_at: model.last_run_at,
        last_result: model
            .last_result
            .as_deref()
            .map(serde_json::from_str)
            .transpose()?,
        total_runs: counter(model.total_runs),
        successful_runs: counter(model.successful_runs),
        failed_runs: counter(model.failed_runs),
        total_items_generated: counter(model.total_items_generated),
    })
}

fn counter(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}
