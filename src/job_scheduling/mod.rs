//! Job scheduling subsystem
//!
//! Periodically discovers due content-generation jobs and runs a bounded
//! number of them at once. The system is built around four components:
//! - `SchedulerLoop`: discovery and bounded dispatch, one tick at a time
//! - `JobExecutor`: runs one job and records its outcome
//! - `MaintenanceSweeper`: purges old data and reconciles abandoned runs
//! - `Processor`: timers, startup and bounded shutdown

pub mod job_executor;
pub mod maintenance;
pub mod processor;
pub mod running_jobs;
pub mod scheduler_loop;
pub mod types;

pub use job_executor::JobExecutor;
pub use maintenance::MaintenanceSweeper;
pub use processor::Processor;
pub use running_jobs::{RunningJobGuard, RunningJobs};
pub use scheduler_loop::SchedulerLoop;
pub use types::*;
