pub use super::job_execution_logs::Entity as JobExecutionLogs;
pub use super::scheduled_jobs::Entity as ScheduledJobs;
