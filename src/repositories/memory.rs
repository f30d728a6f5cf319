//! In-memory store implementations
//!
//! Useful when embedding the processor without a database and as the backing
//! store for integration tests. Scheduling rules match the SeaORM store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, error};
use uuid::Uuid;

use super::traits::{ExecutionLogStore, JobStore};
use crate::config::defaults::DEFAULT_EXECUTION_LOG_RETENTION;
use crate::errors::{StoreError, StoreResult};
use crate::models::{
    ABANDONED_MESSAGE, EntryCompletion, ExecutionLogEntry, ExecutionMetadata, ExecutionStatus,
    Job, JobRecord, PurgeReport,
};
use crate::utils::cron_helper::{next_run_after, validate_schedule};

/// Job store kept in process memory
#[derive(Debug)]
pub struct InMemoryJobStore {
    /// Insertion order is the tie-break for equal `next_run_at`
    jobs: RwLock<Vec<JobRecord>>,
    log_store: Option<Arc<InMemoryExecutionLogStore>>,
    retention: Duration,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self {
            jobs: RwLock::new(Vec::new()),
            log_store: None,
            retention: DEFAULT_EXECUTION_LOG_RETENTION,
        }
    }

    /// Purge entries from `log_store` as part of `purge_old_data`
    pub fn with_log_store(mut self, log_store: Arc<InMemoryExecutionLogStore>) -> Self {
        self.log_store = Some(log_store);
        self
    }

    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    /// Add an active job, rejecting schedules that cannot be interpreted
    pub async fn insert(&self, job: Job) -> StoreResult<()> {
        validate_schedule(&job.schedule_config).map_err(|message| StoreError::InvalidSchedule {
            job_id: job.id.to_string(),
            message,
        })?;
        self.jobs.write().await.push(JobRecord::new(job));
        Ok(())
    }

    pub async fn get(&self, job_id: Uuid) -> Option<JobRecord> {
        self.jobs
            .read()
            .await
            .iter()
            .find(|stored| stored.job.id == job_id)
            .cloned()
    }

    pub async fn all(&self) -> Vec<JobRecord> {
        self.jobs.read().await.clone()
    }
}

impl Default for InMemoryJobStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn fetch_due_jobs(&self, now: DateTime<Utc>) -> StoreResult<Vec<Job>> {
        let jobs = self.jobs.read().await;
        let mut due: Vec<Job> = jobs
            .iter()
            .filter(|stored| stored.is_active && stored.job.is_due(now))
            .map(|stored| stored.job.clone())
            .collect();
        // Stable sort keeps insertion order for equal times
        due.sort_by_key(|job| job.next_run_at);
        Ok(due)
    }

    async fn commit_execution(
        &self,
        job_id: Uuid,
        success: bool,
        result: &Value,
        produced_count: u32,
    ) -> StoreResult<()> {
        let mut jobs = self.jobs.write().await;
        let stored = jobs
            .iter_mut()
            .find(|stored| stored.job.id == job_id)
            .ok_or_else(|| StoreError::not_found("job", job_id))?;

        let now = Utc::now();
        let next_run = next_run_after(&stored.job.schedule_config, now).unwrap_or_else(|message| {
            error!("Deactivating job {} with invalid schedule: {}", job_id, message);
            None
        });

        match next_run {
            Some(next_run_at) => stored.job.next_run_at = next_run_at,
            None => stored.is_active = false,
        }
        stored.last_run_at = Some(now);
        stored.last_result = Some(result.clone());
        stored.total_runs += 1;
        if success {
            stored.successful_runs += 1;
            stored.total_items_generated += u64::from(produced_count);
        } else {
            stored.failed_runs += 1;
        }

        debug!(
            "Committed job {} (success: {}, next run: {}, active: {})",
            job_id,
            success,
            stored.job.next_run_at.format("%Y-%m-%d %H:%M:%S UTC"),
            stored.is_active
        );
        Ok(())
    }

    async fn purge_old_data(&self) -> StoreResult<PurgeReport> {
        let retention = chrono::Duration::from_std(self.retention)
            .map_err(|e| StoreError::unavailable(format!("Invalid retention: {e}")))?;
        let cutoff = Utc::now() - retention;

        let execution_logs_deleted = match &self.log_store {
            Some(log_store) => log_store.purge_completed_before(cutoff).await,
            None => 0,
        };

        let mut jobs = self.jobs.write().await;
        let before = jobs.len();
        jobs.retain(|stored| {
            stored.is_active || stored.last_run_at.is_none_or(|last_run| last_run >= cutoff)
        });

        Ok(PurgeReport {
            execution_logs_deleted,
            inactive_jobs_deleted: (before - jobs.len()) as u64,
        })
    }
}

/// Execution log store kept in process memory
#[derive(Debug, Default)]
pub struct InMemoryExecutionLogStore {
    entries: RwLock<Vec<ExecutionLogEntry>>,
}

impl InMemoryExecutionLogStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn entries(&self) -> Vec<ExecutionLogEntry> {
        self.entries.read().await.clone()
    }

    pub async fn entries_for_job(&self, job_id: Uuid) -> Vec<ExecutionLogEntry> {
        self.entries
            .read()
            .await
            .iter()
            .filter(|entry| entry.job_id == job_id)
            .cloned()
            .collect()
    }

    /// Insert an entry as-is, e.g. to seed an abandoned run
    pub async fn insert(&self, entry: ExecutionLogEntry) {
        self.entries.write().await.push(entry);
    }

    /// Remove terminal entries completed before `cutoff`
    pub async fn purge_completed_before(&self, cutoff: DateTime<Utc>) -> u64 {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|entry| {
            !entry.status.is_terminal() || entry.completed_at.is_none_or(|done| done >= cutoff)
        });
        (before - entries.len()) as u64
    }
}

#[async_trait]
impl ExecutionLogStore for InMemoryExecutionLogStore {
    async fn create_running_entry(
        &self,
        job_id: Uuid,
        metadata: &ExecutionMetadata,
    ) -> StoreResult<Uuid> {
        let entry = ExecutionLogEntry::running(job_id, metadata)?;
        let id = entry.id;
        self.entries.write().await.push(entry);
        Ok(id)
    }

    async fn update_entry(&self, entry_id: Uuid, completion: &EntryCompletion) -> StoreResult<()> {
        let mut entries = self.entries.write().await;
        let entry = entries
            .iter_mut()
            .find(|entry| entry.id == entry_id)
            .ok_or_else(|| StoreError::not_found("execution log entry", entry_id))?;
        entry.complete(completion)
    }

    async fn fail_stale_running(&self, started_before: DateTime<Utc>) -> StoreResult<u64> {
        let mut entries = self.entries.write().await;
        let mut reconciled = 0;
        for entry in entries
            .iter_mut()
            .filter(|entry| entry.status == ExecutionStatus::Running && entry.started_at < started_before)
        {
            let elapsed_ms = (Utc::now() - entry.started_at).num_milliseconds().max(0) as u64;
            entry.complete(&EntryCompletion::failure(
                elapsed_ms,
                ABANDONED_MESSAGE,
                serde_json::json!({ "kind": "abandoned", "started_before": started_before }),
                None,
            ))?;
            reconciled += 1;
        }
        Ok(reconciled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{GenerationSettings, ScheduleConfig};
    use chrono::Duration as ChronoDuration;
    use serde_json::json;

    fn job(name: &str, next_run_at: DateTime<Utc>, schedule_config: ScheduleConfig) -> Job {
        Job {
            id: Uuid::new_v4(),
            name: name.to_string(),
            generation_settings: GenerationSettings::default(),
            created_by: "admin".to_string(),
            next_run_at,
            schedule_config,
        }
    }

    fn metadata() -> ExecutionMetadata {
        ExecutionMetadata {
            worker_id: "worker-test".to_string(),
            principal: "admin".to_string(),
            job_name: "job".to_string(),
            settings: GenerationSettings::default(),
            triggered_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_fetch_due_orders_by_next_run() {
        let store = InMemoryJobStore::new();
        let now = Utc::now();
        let hourly = ScheduleConfig::Interval {
            every: Duration::from_secs(3600),
        };

        let later = job("later", now - ChronoDuration::minutes(1), hourly.clone());
        let earlier = job("earlier", now - ChronoDuration::minutes(10), hourly.clone());
        let future = job("future", now + ChronoDuration::minutes(10), hourly);
        store.insert(later.clone()).await.unwrap();
        store.insert(earlier.clone()).await.unwrap();
        store.insert(future).await.unwrap();

        let due = store.fetch_due_jobs(now).await.unwrap();
        let names: Vec<&str> = due.iter().map(|job| job.name.as_str()).collect();
        assert_eq!(names, vec!["earlier", "later"]);
    }

    #[tokio::test]
    async fn test_commit_advances_schedule_on_failure() {
        let store = InMemoryJobStore::new();
        let now = Utc::now();
        let due = job(
            "hourly",
            now - ChronoDuration::minutes(1),
            ScheduleConfig::Interval {
                every: Duration::from_secs(3600),
            },
        );
        store.insert(due.clone()).await.unwrap();

        store
            .commit_execution(due.id, false, &json!({"error": "boom"}), 0)
            .await
            .unwrap();

        let stored = store.get(due.id).await.unwrap();
        assert!(stored.job.next_run_at > now + ChronoDuration::minutes(59));
        assert_eq!(stored.failed_runs, 1);
        assert_eq!(stored.successful_runs, 0);
        assert_eq!(stored.total_items_generated, 0);
        assert!(store.fetch_due_jobs(Utc::now()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_commit_once_deactivates() {
        let store = InMemoryJobStore::new();
        let once = job("once", Utc::now(), ScheduleConfig::Once);
        store.insert(once.clone()).await.unwrap();

        store.commit_execution(once.id, true, &json!({}), 5).await.unwrap();

        let stored = store.get(once.id).await.unwrap();
        assert!(!stored.is_active);
        assert_eq!(stored.total_items_generated, 5);
        assert!(store.fetch_due_jobs(Utc::now()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_commit_unknown_job_is_not_found() {
        let store = InMemoryJobStore::new();
        let result = store.commit_execution(Uuid::new_v4(), true, &json!({}), 1).await;
        assert!(matches!(result, Err(StoreError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_purge_removes_old_terminal_entries_only() {
        let logs = Arc::new(InMemoryExecutionLogStore::new());
        let store = InMemoryJobStore::new()
            .with_log_store(logs.clone())
            .with_retention(Duration::from_secs(3600));

        let mut old = ExecutionLogEntry::running(Uuid::new_v4(), &metadata()).unwrap();
        let mut completion = EntryCompletion::success(10, 1, 1, json!({}));
        completion.completed_at = Utc::now() - ChronoDuration::hours(2);
        old.complete(&completion).unwrap();
        logs.insert(old).await;

        let recent_id = logs.create_running_entry(Uuid::new_v4(), &metadata()).await.unwrap();
        let mut stale_running = ExecutionLogEntry::running(Uuid::new_v4(), &metadata()).unwrap();
        stale_running.started_at = Utc::now() - ChronoDuration::hours(3);
        logs.insert(stale_running).await;

        let report = store.purge_old_data().await.unwrap();
        assert_eq!(report.execution_logs_deleted, 1);

        let remaining = logs.entries().await;
        assert_eq!(remaining.len(), 2);
        assert!(remaining.iter().any(|entry| entry.id == recent_id));
    }

    #[tokio::test]
    async fn test_fail_stale_running() {
        let logs = InMemoryExecutionLogStore::new();
        let mut stale = ExecutionLogEntry::running(Uuid::new_v4(), &metadata()).unwrap();
        stale.started_at = Utc::now() - ChronoDuration::hours(7);
        let stale_id = stale.id;
        logs.insert(stale).await;
        logs.create_running_entry(Uuid::new_v4(), &metadata()).await.unwrap();

        let reconciled = logs
            .fail_stale_running(Utc::now() - ChronoDuration::hours(6))
            .await
            .unwrap();
        assert_eq!(reconciled, 1);

        let entries = logs.entries().await;
        let stale = entries.iter().find(|entry| entry.id == stale_id).unwrap();
        assert_eq!(stale.status, ExecutionStatus::Failed);
        assert_eq!(stale.error_message.as_deref(), Some(ABANDONED_MESSAGE));
        assert_eq!(
            entries.iter().filter(|entry| entry.status == ExecutionStatus::Running).count(),
            1
        );
    }

    #[tokio::test]
    async fn test_insert_rejects_uninterpretable_schedule() {
        let store = InMemoryJobStore::new();
        let broken = job(
            "broken",
            Utc::now(),
            ScheduleConfig::Cron {
                expression: "every tuesday".to_string(),
            },
        );

        let result = store.insert(broken.clone()).await;
        assert!(matches!(result, Err(StoreError::InvalidSchedule { .. })));
        assert!(store.get(broken.id).await.is_none());
    }

    #[tokio::test]
    async fn test_late_update_does_not_overwrite_abandoned_entry() {
        let logs = InMemoryExecutionLogStore::new();
        let entry_id = logs.create_running_entry(Uuid::new_v4(), &metadata()).await.unwrap();

        let reconciled = logs
            .fail_stale_running(Utc::now() + ChronoDuration::seconds(1))
            .await
            .unwrap();
        assert_eq!(reconciled, 1);

        let late = logs
            .update_entry(entry_id, &EntryCompletion::success(5000, 1, 6, json!({"success": true})))
            .await;
        assert!(matches!(late, Err(StoreError::EntryCompleted { .. })));

        let entries = logs.entries().await;
        assert_eq!(entries[0].status, ExecutionStatus::Failed);
        assert_eq!(entries[0].error_message.as_deref(), Some(ABANDONED_MESSAGE));
    }
}
