//! Running-set tracking
//!
//! The set of job IDs currently executing in this worker. Membership is the
//! only thing that keeps a job from being dispatched twice, so claims are made
//! with a single check-and-insert and released by a guard on every exit path.
//! Closing the set happens under the same lock, so a claim either lands before
//! the close and is visible to shutdown, or is rejected.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

use super::types::DispatchRejection;

#[derive(Debug, Default)]
struct RunningState {
    ids: HashSet<Uuid>,
    closed: bool,
}

/// Shared handle to the running set
///
/// The lock is only held for set operations and never across `.await`.
#[derive(Debug, Clone, Default)]
pub struct RunningJobs {
    inner: Arc<Mutex<RunningState>>,
}

impl RunningJobs {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RunningState> {
        // A panic while holding the lock cannot leave the set half-updated
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Claim `job_id` if the set is open, it is not running and a slot is free
    pub fn try_claim(
        &self,
        job_id: Uuid,
        max_concurrent_jobs: usize,
    ) -> Result<RunningJobGuard, DispatchRejection> {
        let mut running = self.lock();
        if running.closed {
            return Err(DispatchRejection::ShuttingDown);
        }
        if running.ids.contains(&job_id) {
            return Err(DispatchRejection::AlreadyRunning(job_id));
        }
        if running.ids.len() >= max_concurrent_jobs {
            return Err(DispatchRejection::AtCapacity {
                max_concurrent_jobs,
            });
        }
        running.ids.insert(job_id);
        Ok(RunningJobGuard {
            job_id,
            running: self.inner.clone(),
        })
    }

    /// Refuse all further claims; running jobs keep their slots
    pub fn close(&self) {
        self.lock().closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn contains(&self, job_id: &Uuid) -> bool {
        self.lock().ids.contains(job_id)
    }

    pub fn len(&self) -> usize {
        self.lock().ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().ids.is_empty()
    }

    /// Snapshot of the running IDs, sorted for stable output
    pub fn ids(&self) -> Vec<Uuid> {
        let mut ids: Vec<Uuid> = self.lock().ids.iter().copied().collect();
        ids.sort();
        ids
    }
}

/// Claim on one running-set slot; dropping it frees the slot
#[derive(Debug)]
pub struct RunningJobGuard {
    job_id: Uuid,
    running: Arc<Mutex<RunningState>>,
}

impl RunningJobGuard {
    pub fn job_id(&self) -> Uuid {
        self.job_id
    }
}

impl Drop for RunningJobGuard {
    fn drop(&mut self) {
        let mut running = self
            .running
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        running.ids.remove(&self.job_id);
    }
}
