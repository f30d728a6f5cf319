//! Processor lifecycle
//!
//! Owns the scheduler loop and maintenance sweeper, drives them from timers
//! and coordinates a bounded shutdown that waits for in-flight jobs.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::job_executor::JobExecutor;
use super::maintenance::MaintenanceSweeper;
use super::scheduler_loop::SchedulerLoop;
use super::types::{ProcessorStats, ShutdownReport};
use crate::config::ProcessorConfig;
use crate::errors::{AppError, AppResult};
use crate::repositories::{ExecutionLogStore, JobStore};
use crate::services::ContentGenerator;
use crate::utils::WorkerId;

/// A scheduled job processor with injected collaborators
pub struct Processor {
    config: ProcessorConfig,
    worker_id: WorkerId,
    scheduler: Arc<SchedulerLoop>,
    sweeper: Arc<MaintenanceSweeper>,
    shutdown: CancellationToken,
    started: AtomicBool,
    timers: Mutex<Vec<JoinHandle<()>>>,
}

impl Processor {
    pub fn new(
        config: ProcessorConfig,
        job_store: Arc<dyn JobStore>,
        log_store: Arc<dyn ExecutionLogStore>,
        generator: Arc<dyn ContentGenerator>,
    ) -> AppResult<Self> {
        config.validate().map_err(AppError::configuration)?;

        let worker_id = WorkerId::generate();
        let shutdown = CancellationToken::new();
        let executor = Arc::new(JobExecutor::new(
            job_store.clone(),
            log_store.clone(),
            generator,
            worker_id.clone(),
        ));
        let scheduler = Arc::new(SchedulerLoop::new(
            job_store.clone(),
            executor,
            config.max_concurrent_jobs,
            shutdown.clone(),
        ));
        let sweeper = Arc::new(MaintenanceSweeper::new(
            job_store,
            log_store,
            config.stale_running_after,
        ));

        info!(
            "Created job processor {} (max concurrent jobs: {})",
            worker_id, config.max_concurrent_jobs
        );

        Ok(Self {
            config,
            worker_id,
            scheduler,
            sweeper,
            shutdown,
            started: AtomicBool::new(false),
            timers: Mutex::new(Vec::new()),
        })
    }

    pub fn worker_id(&self) -> &WorkerId {
        &self.worker_id
    }

    pub fn scheduler(&self) -> &Arc<SchedulerLoop> {
        &self.scheduler
    }

    pub fn sweeper(&self) -> &Arc<MaintenanceSweeper> {
        &self.sweeper
    }

    pub fn stats(&self) -> ProcessorStats {
        self.scheduler.stats()
    }

    /// Start the tick timer, the maintenance timer and the startup tick
    pub fn start(&self) {
        if self.started.swap(true, Ordering::AcqRel) {
            warn!("Processor {} already started, ignoring start()", self.worker_id);
            return;
        }
        if self.shutdown.is_cancelled() {
            warn!("Processor {} has been stopped and cannot be restarted", self.worker_id);
            return;
        }

        info!(
            "Starting job processor {} (tick every {:?}, maintenance every {:?})",
            self.worker_id, self.config.tick_interval, self.config.maintenance_interval
        );

        let handles = vec![
            self.spawn_tick_timer(),
            self.spawn_maintenance_timer(),
            self.spawn_startup_tick(),
        ];
        self.timers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .extend(handles);
    }

    /// Each tick runs as its own task so a slow tick never delays the timer;
    /// overlapping ticks are skipped by the scheduler's dispatch guard.
    fn spawn_tick_timer(&self) -> JoinHandle<()> {
        let scheduler = self.scheduler.clone();
        let token = self.shutdown.clone();
        let period = self.config.tick_interval;

        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let scheduler = scheduler.clone();
                        tokio::spawn(async move {
                            scheduler.tick().await;
                        });
                    }
                    _ = token.cancelled() => {
                        debug!("Tick timer stopped");
                        break;
                    }
                }
            }
        })
    }

    fn spawn_maintenance_timer(&self) -> JoinHandle<()> {
        let sweeper = self.sweeper.clone();
        let token = self.shutdown.clone();
        let period = self.config.maintenance_interval;

        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        sweeper.sweep().await;
                    }
                    _ = token.cancelled() => {
                        debug!("Maintenance timer stopped");
                        break;
                    }
                }
            }
        })
    }

    fn spawn_startup_tick(&self) -> JoinHandle<()> {
        let scheduler = self.scheduler.clone();
        let token = self.shutdown.clone();
        let delay = self.config.startup_delay;

        tokio::spawn(async move {
            tokio::select! {
                _ = sleep(delay) => {
                    debug!("Running startup tick");
                    scheduler.tick().await;
                }
                _ = token.cancelled() => {}
            }
        })
    }

    /// Stop accepting work and wait, bounded, for running jobs to finish
    ///
    /// Jobs still running at the timeout are left to finish on their own; the
    /// report lists them.
    pub async fn stop(&self) -> ShutdownReport {
        let timeout = self.config.shutdown_timeout;
        let poll_interval = self.config.shutdown_poll_interval;
        let running = self.scheduler.running_jobs();

        info!(
            "Stopping job processor {} ({} jobs running, waiting up to {:?})",
            self.worker_id,
            running.len(),
            timeout
        );
        self.scheduler.stop_accepting_work();

        let started = Instant::now();
        let report = loop {
            let remaining_jobs = running.ids();
            let waited = started.elapsed();
            if remaining_jobs.is_empty() {
                info!("All running jobs finished after {:?}", waited);
                break ShutdownReport {
                    graceful: true,
                    remaining_jobs,
                    waited,
                };
            }
            if waited >= timeout {
                warn!(
                    "Forced shutdown after {:?}: {} jobs still running: {:?}",
                    waited,
                    remaining_jobs.len(),
                    remaining_jobs
                );
                break ShutdownReport {
                    graceful: false,
                    remaining_jobs,
                    waited,
                };
            }
            debug!("Waiting for {} running jobs to finish", remaining_jobs.len());
            sleep(poll_interval.min(timeout - waited)).await;
        };

        // Timers exit on cancellation; abort covers one stuck in a sweep
        for timer in self
            .timers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .drain(..)
        {
            timer.abort();
        }

        info!("Job processor {} stopped", self.worker_id);
        report
    }
}
