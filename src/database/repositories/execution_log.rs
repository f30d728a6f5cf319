//! SeaORM execution log repository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde_json::json;
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

use crate::entities::{job_execution_logs, prelude::*};
use crate::errors::{StoreError, StoreResult};
use crate::models::{
    ABANDONED_MESSAGE, EntryCompletion, ExecutionLogEntry, ExecutionMetadata, ExecutionStatus,
};
use crate::repositories::ExecutionLogStore;

/// SeaORM-based execution log store
#[derive(Clone)]
pub struct ExecutionLogSeaOrmRepository {
    connection: Arc<DatabaseConnection>,
}

impl ExecutionLogSeaOrmRepository {
    pub fn new(connection: Arc<DatabaseConnection>) -> Self {
        Self { connection }
    }

    /// Entries for one job, newest first
    pub async fn find_by_job(&self, job_id: &Uuid) -> StoreResult<Vec<ExecutionLogEntry>> {
        let models = JobExecutionLogs::find()
            .filter(job_execution_logs::Column::JobId.eq(job_id.to_string()))
            .order_by_desc(job_execution_logs::Column::StartedAt)
            .all(&*self.connection)
            .await?;
        models.iter().map(model_to_entry).collect()
    }

    pub async fn find_by_id(&self, id: &Uuid) -> StoreResult<Option<ExecutionLogEntry>> {
        let model = JobExecutionLogs::find_by_id(id.to_string())
            .one(&*self.connection)
            .await?;
        model.as_ref().map(model_to_entry).transpose()
    }

    /// Complete `model`, only if it is still `running` when the write lands
    async fn apply_completion(
        &self,
        model: job_execution_logs::Model,
        completion: &EntryCompletion,
    ) -> StoreResult<()> {
        let mut entry = model_to_entry(&model)?;
        entry.complete(completion)?;

        let changes = job_execution_logs::ActiveModel {
            status: Set(entry.status.to_string()),
            completed_at: Set(entry.completed_at),
            execution_time_ms: Set(entry
                .execution_time_ms
                .map(|ms| i64::try_from(ms).unwrap_or(i64::MAX))),
            content_generated: Set(to_column(entry.content_generated)),
            topics_created: Set(to_column(entry.topics_created)),
            questions_created: Set(to_column(entry.questions_created)),
            error_message: Set(entry.error_message),
            error_details: Set(entry
                .error_details
                .as_ref()
                .map(serde_json::to_string)
                .transpose()?),
            execution_metadata: Set(serde_json::to_string(&entry.execution_metadata)?),
            ..Default::default()
        };

        let result = JobExecutionLogs::update_many()
            .set(changes)
            .filter(job_execution_logs::Column::Id.eq(model.id.clone()))
            .filter(job_execution_logs::Column::Status.eq(ExecutionStatus::Running.to_string()))
            .exec(&*self.connection)
            .await?;
        if result.rows_affected == 0 {
            return Err(StoreError::entry_completed(model.id));
        }
        Ok(())
    }
}

#[async_trait]
impl ExecutionLogStore for ExecutionLogSeaOrmRepository {
    async fn create_running_entry(
        &self,
        job_id: Uuid,
        metadata: &ExecutionMetadata,
    ) -> StoreResult<Uuid> {
        let entry = ExecutionLogEntry::running(job_id, metadata)?;

        let active_model = job_execution_logs::ActiveModel {
            id: Set(entry.id.to_string()),
            job_id: Set(job_id.to_string()),
            status: Set(entry.status.to_string()),
            started_at: Set(entry.started_at),
            completed_at: Set(None),
            execution_time_ms: Set(None),
            content_generated: Set(0),
            topics_created: Set(0),
            questions_created: Set(0),
            error_message: Set(None),
            error_details: Set(None),
            execution_metadata: Set(serde_json::to_string(&entry.execution_metadata)?),
            worker_id: Set(entry.worker_id.clone()),
        };
        active_model.insert(&*self.connection).await?;
        Ok(entry.id)
    }

    async fn update_entry(&self, entry_id: Uuid, completion: &EntryCompletion) -> StoreResult<()> {
        let model = JobExecutionLogs::find_by_id(entry_id.to_string())
            .one(&*self.connection)
            .await?
            .ok_or_else(|| StoreError::not_found("execution log entry", entry_id))?;
        self.apply_completion(model, completion).await
    }

    async fn fail_stale_running(&self, started_before: DateTime<Utc>) -> StoreResult<u64> {
        let stale = JobExecutionLogs::find()
            .filter(job_execution_logs::Column::Status.eq(ExecutionStatus::Running.to_string()))
            .filter(job_execution_logs::Column::StartedAt.lt(started_before))
            .all(&*self.connection)
            .await?;

        let mut reconciled = 0;
        for model in stale {
            let elapsed_ms = (Utc::now() - model.started_at).num_milliseconds().max(0) as u64;
            let completion = EntryCompletion::failure(
                elapsed_ms,
                ABANDONED_MESSAGE,
                json!({ "kind": "abandoned", "started_before": started_before }),
                None,
            );
            match self.apply_completion(model, &completion).await {
                Ok(()) => reconciled += 1,
                // Completed by its executor since the scan
                Err(StoreError::EntryCompleted { .. }) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(reconciled)
    }
}

fn to_column(count: u32) -> i32 {
    i32::try_from(count).unwrap_or(i32::MAX)
}

fn from_column(count: i32) -> u32 {
    u32::try_from(count).unwrap_or(0)
}

fn model_to_entry(model: &job_execution_logs::Model) -> StoreResult<ExecutionLogEntry> {
    Ok(ExecutionLogEntry {
        id: StoreError::parse_id(&model.id)?,
        job_id: StoreError::parse_id(&model.job_id)?,
        status: ExecutionStatus::from_str(&model.status).map_err(|_| {
            StoreError::invalid_record(
                "execution log entry",
                format!("unknown status '{}'", model.status),
            )
        })?,
        started_at: model.started_at,
        completed_at: model.completed_at,
        execution_time_ms: model
            .execution_time_ms
            .map(|ms| u64::try_from(ms).unwrap_or(0)),
        content_generated: from_column(model.content_generated),
        topics_created: from_column(model.topics_created),
        questions_created: from_column(model.questions_created),
        error_message: model.error_message.clone(),
        error_details: model
            .error_details
            .as_deref()
            .map(serde_json::from_str)
            .transpose()?,
        execution_metadata: serde_json::from_str(&model.execution_metadata)?,
        worker_id: model.worker_id.clone(),
    })
}
