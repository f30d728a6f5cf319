//! SeaORM entity definitions

pub mod prelude;

pub mod job_execution_logs;
pub mod scheduled_jobs;
