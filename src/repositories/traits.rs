//! Store trait definitions
//!
//! The processor depends only on these traits. The SeaORM implementations in
//! [`crate::database::repositories`] and the in-memory implementations in
//! [`super::memory`] are interchangeable behind `Arc<dyn ...>`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use crate::errors::StoreResult;
use crate::models::{EntryCompletion, ExecutionMetadata, Job, PurgeReport};

/// Job definitions and their scheduling state
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Fetch every active job whose `next_run_at` is at or before `now`
    ///
    /// # Returns
    ///
    /// Due jobs in the order they should be dispatched. Callers take the
    /// first N, so implementations decide the tie-break.
    async fn fetch_due_jobs(&self, now: DateTime<Utc>) -> StoreResult<Vec<Job>>;

    /// Commit the post-execution state of a job
    ///
    /// # Arguments
    ///
    /// * `job_id` - The job that just ran
    /// * `success` - Whether the run succeeded
    /// * `result` - Generator result (or error summary) for the job's record
    /// * `produced_count` - Items produced by the run, zero on failure
    ///
    /// Implementations advance `next_run_at` by their own scheduling rules
    /// regardless of `success`.
    async fn commit_execution(
        &self,
        job_id: Uuid,
        success: bool,
        result: &Value,
        produced_count: u32,
    ) -> StoreResult<()>;

    /// Delete old execution logs and other stale artifacts per store-owned retention
    async fn purge_old_data(&self) -> StoreResult<PurgeReport>;
}

/// Append/update store for execution audit records
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ExecutionLogStore: Send + Sync {
    /// Insert a `running` entry and return its identifier
    async fn create_running_entry(
        &self,
        job_id: Uuid,
        metadata: &ExecutionMetadata,
    ) -> StoreResult<Uuid>;

    /// Move a `running` entry to its terminal state
    async fn update_entry(&self, entry_id: Uuid, completion: &EntryCompletion) -> StoreResult<()>;

    /// Mark entries still `running` that started before `started_before` as failed
    ///
    /// # Returns
    ///
    /// The number of entries reconciled.
    async fn fail_stale_running(&self, started_before: DateTime<Utc>) -> StoreResult<u64>;
}
