//! Scheduler loop: discovers due jobs and dispatches executors
//!
//! Each tick fetches due jobs, drops the ones already running, fills the free
//! slots in due-list order and waits for every executor it started. A tick
//! that finds the previous one still in progress does nothing.

use chrono::Utc;
use futures::future::join_all;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::job_executor::JobExecutor;
use super::running_jobs::RunningJobs;
use super::types::{
    DispatchRejection, ExecutionResult, JobExecutionError, ProcessorStats, SkipReason,
    TickReport, TickSummary,
};
use crate::models::Job;
use crate::repositories::JobStore;

/// Held while a tick is dispatching or awaiting its executors
struct DispatchGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> DispatchGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for DispatchGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Periodic discovery and bounded dispatch of due jobs
pub struct SchedulerLoop {
    job_store: Arc<dyn JobStore>,
    executor: Arc<JobExecutor>,
    running: RunningJobs,
    max_concurrent_jobs: usize,
    dispatching: AtomicBool,
    shutdown: CancellationToken,
}

impl SchedulerLoop {
    /// `shutdown` stops the loop from accepting new work once cancelled
    pub fn new(
        job_store: Arc<dyn JobStore>,
        executor: Arc<JobExecutor>,
        max_concurrent_jobs: usize,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            job_store,
            executor,
            running: RunningJobs::new(),
            max_concurrent_jobs,
            dispatching: AtomicBool::new(false),
            shutdown,
        }
    }

    pub fn running_jobs(&self) -> &RunningJobs {
        &self.running
    }

    pub fn max_concurrent_jobs(&self) -> usize {
        self.max_concurrent_jobs
    }

    pub fn is_accepting_work(&self) -> bool {
        !self.shutdown.is_cancelled() && !self.running.is_closed()
    }

    /// Stop dispatching; claims racing this call either land first or are refused
    pub fn stop_accepting_work(&self) {
        self.shutdown.cancel();
        self.running.close();
    }

    pub fn stats(&self) -> ProcessorStats {
        ProcessorStats {
            worker_id: self.executor.worker_id().to_string(),
            running_jobs: self.running.ids(),
            max_concurrent_jobs: self.max_concurrent_jobs,
            dispatching: self.dispatching.load(Ordering::Acquire),
            accepting_work: self.is_accepting_work(),
        }
    }

    /// Run one discovery and dispatch cycle
    pub async fn tick(&self) -> TickReport {
        if !self.is_accepting_work() {
            debug!("Processor is shutting down, skipping tick");
            return TickReport::Skipped {
                reason: SkipReason::ShuttingDown,
            };
        }

        let Some(_dispatch) = DispatchGuard::acquire(&self.dispatching) else {
            info!("Previous tick is still in progress, skipping this one");
            return TickReport::Skipped {
                reason: SkipReason::AlreadyDispatching,
            };
        };

        let due_jobs = match self.job_store.fetch_due_jobs(Utc::now()).await {
            Ok(jobs) => jobs,
            Err(e) => {
                error!("Failed to fetch due jobs: {}", e);
                return TickReport::DiscoveryFailed {
                    message: e.to_string(),
                };
            }
        };

        if due_jobs.is_empty() {
            debug!("No due jobs found");
            return TickReport::NoDueJobs;
        }

        let due = due_jobs.len();
        let (already_running, candidates): (Vec<Job>, Vec<Job>) = due_jobs
            .into_iter()
            .partition(|job| self.running.contains(&job.id));
        for job in &already_running {
            debug!("Job '{}' ({}) is still running, not dispatching again", job.name, job.id);
        }

        let running = self.running.len();
        let available_slots = self.max_concurrent_jobs.saturating_sub(running);
        if available_slots == 0 {
            info!(
                "All {} execution slots busy, deferring {} due jobs",
                self.max_concurrent_jobs,
                candidates.len()
            );
            return TickReport::SlotsBusy { due, running };
        }

        debug!(
            "Found {} due jobs ({} already running), {} slots available",
            due,
            already_running.len(),
            available_slots
        );

        let mut handles = Vec::new();
        for job in candidates.into_iter().take(available_slots) {
            if !self.is_accepting_work() {
                info!("Shutdown requested, stopping dispatch");
                break;
            }
            match self.spawn_executor(job) {
                Ok(dispatched) => handles.push(dispatched),
                Err(DispatchRejection::ShuttingDown) => {
                    info!("Shutdown requested, stopping dispatch");
                    break;
                }
                Err(rejection) => debug!("Not dispatching job: {}", rejection),
            }
        }

        let summary = self.await_executors(due, already_running.len(), handles).await;
        info!(
            "Tick complete: dispatched {}, succeeded {}, failed {}",
            summary.dispatched, summary.succeeded, summary.failed
        );
        TickReport::Completed(summary)
    }

    /// Dispatch `job` immediately, outside the timer
    ///
    /// Honors the running set and the concurrency cap but not the tick guard.
    pub fn run_job_now(&self, job: Job) -> Result<JoinHandle<ExecutionResult>, DispatchRejection> {
        if !self.is_accepting_work() {
            return Err(DispatchRejection::ShuttingDown);
        }
        info!("Manually dispatching job '{}' ({})", job.name, job.id);
        self.spawn_executor(job).map(|(_, handle)| handle)
    }

    fn spawn_executor(
        &self,
        job: Job,
    ) -> Result<(Uuid, JoinHandle<ExecutionResult>), DispatchRejection> {
        let job_id = job.id;
        let guard = self.running.try_claim(job_id, self.max_concurrent_jobs)?;
        let executor = self.executor.clone();
        let handle = tokio::spawn(async move { executor.execute(job, guard).await });
        Ok((job_id, handle))
    }

    async fn await_executors(
        &self,
        due: usize,
        skipped_running: usize,
        handles: Vec<(Uuid, JoinHandle<ExecutionResult>)>,
    ) -> TickSummary {
        let dispatched = handles.len();
        let results = join_all(
            handles
                .into_iter()
                .map(|(job_id, handle)| async move { (job_id, handle.await) }),
        )
        .await;

        let mut summary = TickSummary {
            due,
            skipped_running,
            dispatched,
            ..TickSummary::default()
        };
        for (job_id, joined) in results {
            let result = joined.unwrap_or_else(|e| {
                Err(JobExecutionError::Aborted {
                    job_id,
                    message: e.to_string(),
                })
            });
            match result {
                Ok(outcome) if outcome.success => summary.succeeded += 1,
                Ok(_) => summary.failed += 1,
                Err(JobExecutionError::Aborted { job_id, message }) => {
                    error!("Executor for job {} did not finish: {}", job_id, message);
                    summary.failed += 1;
                }
                Err(e) => {
                    debug!("Job {} failed: {}", e.job_id(), e);
                    summary.failed += 1;
                }
            }
        }
        if summary.failed > 0 {
            warn!("{} of {} dispatched jobs failed", summary.failed, dispatched);
        }
        summary
    }
}
