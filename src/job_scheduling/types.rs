//! Job scheduling type definitions

use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use crate::errors::StoreError;
use crate::models::PurgeReport;

/// Result of one executor run
pub type ExecutionResult = Result<ExecutionOutcome, JobExecutionError>;

/// Summary of a successful job run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExecutionOutcome {
    pub job_id: Uuid,
    pub success: bool,
    pub execution_time_ms: u64,
    pub content_generated: u32,
    pub topics_created: u32,
    pub questions_created: u32,
}

/// Why a job run did not succeed
///
/// Each variant corresponds to one stage of a run and has its own log line.
#[derive(Error, Debug)]
pub enum JobExecutionError {
    /// The `running` entry could not be written, so the job was not run
    #[error("Failed to create execution log entry for job {job_id}: {source}")]
    LogCreation {
        job_id: Uuid,
        #[source]
        source: StoreError,
    },

    /// The generator failed or reported `success: false`; the failure was recorded
    #[error("Content generation failed for job {job_id}: {message}")]
    Generation {
        job_id: Uuid,
        message: String,
        execution_time_ms: u64,
    },

    /// The outcome was logged but the job's scheduling state was not updated
    #[error("Failed to commit execution of job {job_id}: {source}")]
    Commit {
        job_id: Uuid,
        success: bool,
        #[source]
        source: StoreError,
    },

    /// The executor task panicked or was aborted
    #[error("Executor for job {job_id} did not finish: {message}")]
    Aborted { job_id: Uuid, message: String },
}

impl JobExecutionError {
    pub fn job_id(&self) -> Uuid {
        match self {
            Self::LogCreation { job_id, .. }
            | Self::Generation { job_id, .. }
            | Self::Commit { job_id, .. }
            | Self::Aborted { job_id, .. } => *job_id,
        }
    }
}

/// Why a job was not dispatched
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchRejection {
    #[error("Job {0} is already running")]
    AlreadyRunning(Uuid),

    #[error("All {max_concurrent_jobs} execution slots are busy")]
    AtCapacity { max_concurrent_jobs: usize },

    #[error("Processor is shutting down")]
    ShuttingDown,
}

/// Why a tick did no work at all
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// A previous tick is still dispatching or awaiting its executors
    AlreadyDispatching,
    ShuttingDown,
}

/// Counts for a tick that dispatched work
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TickSummary {
    pub due: usize,
    pub skipped_running: usize,
    pub dispatched: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// What a single scheduler tick did
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TickReport {
    Skipped { reason: SkipReason },
    NoDueJobs,
    DiscoveryFailed { message: String },
    SlotsBusy { due: usize, running: usize },
    Completed(TickSummary),
}

impl TickReport {
    /// Number of executors this tick started
    pub fn dispatched(&self) -> usize {
        match self {
            Self::Completed(summary) => summary.dispatched,
            _ => 0,
        }
    }
}

/// Point-in-time view of the scheduler
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessorStats {
    pub worker_id: String,
    pub running_jobs: Vec<Uuid>,
    pub max_concurrent_jobs: usize,
    pub dispatching: bool,
    pub accepting_work: bool,
}

/// What one maintenance sweep did; `None` marks a step that failed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub purge: Option<PurgeReport>,
    pub stale_entries_failed: Option<u64>,
}

/// How shutdown ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShutdownReport {
    /// Every in-flight job finished before the timeout
    pub graceful: bool,
    /// Jobs still executing when shutdown returned
    pub remaining_jobs: Vec<Uuid>,
    pub waited: Duration,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_report_dispatched() {
        let report = TickReport::Completed(TickSummary {
            due: 5,
            dispatched: 3,
            succeeded: 2,
            failed: 1,
            ..TickSummary::default()
        });
        assert_eq!(report.dispatched(), 3);
        assert_eq!(TickReport::NoDueJobs.dispatched(), 0);
        assert_eq!(
            serde_json::to_value(TickReport::SlotsBusy { due: 2, running: 3 }).unwrap(),
            serde_json::json!({"outcome": "slots_busy", "due": 2, "running": 3})
        );
    }

    #[test]
    fn test_execution_error_job_id() {
        let job_id = Uuid::new_v4();
        let err = JobExecutionError::Commit {
            job_id,
            success: true,
            source: StoreError::unavailable("connection reset"),
        };
        assert_eq!(err.job_id(), job_id);
        assert!(err.to_string().contains("Failed to commit execution"));
    }
}
