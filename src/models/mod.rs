use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

pub mod execution_log;
pub mod generation;

pub use execution_log::*;
pub use generation::*;

/// A scheduled content-generation job
///
/// Owned by the job store; the processor only reads it and reports the
/// outcome of each run back through `JobStore::commit_execution`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    /// Human label, used in logs only
    pub name: String,
    pub generation_settings: GenerationSettings,
    /// Principal the job runs on behalf of
    pub created_by: String,
    pub next_run_at: DateTime<Utc>,
    /// Recurrence description, interpreted by the job store alone
    pub schedule_config: ScheduleConfig,
}

impl Job {
    /// Check if this job is due to run
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.next_run_at <= now
    }
}

/// How a job store advances `next_run_at` after each execution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScheduleConfig {
    /// Cron expression with seconds resolution, e.g. `0 0 6 * * * *`
    Cron { expression: String },
    /// Fixed period measured from the end of the previous run
    Interval {
        #[serde(with = "crate::config::duration_serde::duration")]
        every: Duration,
    },
    /// Single run; the job deactivates afterwards
    Once,
}

/// A job together with the scheduling state its store maintains
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobRecord {
    pub job: Job,
    pub is_active: bool,
    pub last_run_at: Option<DateTime<Utc>>,
    pub last_result: Option<serde_json::Value>,
    pub total_runs: u64,
    pub successful_runs: u64,
    pub failed_runs: u64,
    pub total_items_generated: u64,
}

impl JobRecord {
    /// A freshly created, active job with no runs
    pub fn new(job: Job) -> Self {
        Self {
            job,
            is_active: true,
            last_run_at: None,
            last_result: None,
            total_runs: 0,
            successful_runs: 0,
            failed_runs: 0,
            total_items_generated: 0,
        }
    }
}

/// What a maintenance purge removed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PurgeReport {
    pub execution_logs_deleted: u64,
    pub inactive_jobs_deleted: u64,
}
