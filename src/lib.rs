//! Scheduled content-generation job processor
//!
//! Discovers due jobs, runs a bounded number of them concurrently through a
//! remote content generator, records an audit trail of every run and advances
//! each job's schedule. The store and generator seams are traits so the
//! processor can be embedded with any backend.

pub mod config;
pub mod database;
pub mod entities;
pub mod errors;
pub mod job_scheduling;
pub mod models;
pub mod observability;
pub mod repositories;
pub mod services;
pub mod utils;

pub use config::Config;
pub use errors::{AppError, AppResult};
pub use job_scheduling::Processor;
