//! Maintenance sweeper
//!
//! Runs on its own timer, independently of the scheduler loop. Purges old data
//! through the job store and fails `running` log entries whose worker never
//! came back to complete them.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::types::SweepReport;
use crate::repositories::{ExecutionLogStore, JobStore};

pub struct MaintenanceSweeper {
    job_store: Arc<dyn JobStore>,
    log_store: Arc<dyn ExecutionLogStore>,
    stale_running_after: Duration,
}

impl MaintenanceSweeper {
    pub fn new(
        job_store: Arc<dyn JobStore>,
        log_store: Arc<dyn ExecutionLogStore>,
        stale_running_after: Duration,
    ) -> Self {
        Self {
            job_store,
            log_store,
            stale_running_after,
        }
    }

    /// Run one sweep; failures are logged and reported, never returned
    pub async fn sweep(&self) -> SweepReport {
        debug!("Running maintenance sweep");
        let mut report = SweepReport::default();

        match self.job_store.purge_old_data().await {
            Ok(purged) => {
                if purged.execution_logs_deleted > 0 || purged.inactive_jobs_deleted > 0 {
                    info!(
                        "Maintenance purged {} execution log entries and {} inactive jobs",
                        purged.execution_logs_deleted, purged.inactive_jobs_deleted
                    );
                }
                report.purge = Some(purged);
            }
            Err(e) => error!("Maintenance purge failed: {}", e),
        }

        match chrono::Duration::from_std(self.stale_running_after) {
            Ok(max_age) => {
                let started_before = Utc::now() - max_age;
                match self.log_store.fail_stale_running(started_before).await {
                    Ok(0) => report.stale_entries_failed = Some(0),
                    Ok(count) => {
                        warn!(
                            "Marked {} abandoned running execution log entries as failed (started before {})",
                            count,
                            started_before.format("%Y-%m-%d %H:%M:%S UTC")
                        );
                        report.stale_entries_failed = Some(count);
                    }
                    Err(e) => error!("Failed to reconcile stale running entries: {}", e),
                }
            }
            Err(e) => error!("Invalid stale entry threshold {:?}: {}", self.stale_running_after, e),
        }

        report
    }
}
