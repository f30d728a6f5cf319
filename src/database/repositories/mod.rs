//! SeaORM repository implementations
//!
//! Job store and execution log store backed by the database, working across
//! SQLite, PostgreSQL and MySQL.

pub mod execution_log;
pub mod scheduled_job;

pub use execution_log::ExecutionLogSeaOrmRepository;
pub use scheduled_job::{ScheduledJobCreateRequest, ScheduledJobSeaOrmRepository};
