//! Centralized error handling for the job processor
//!
//! Typed errors for each collaborator seam, so that log lines can tell a
//! store failure from a generator failure from a configuration problem.
//!
//! # Error Categories
//!
//! - **Store Errors**: job store and execution log store failures
//! - **Generator Errors**: content generator transport and protocol failures
//! - **Configuration Errors**: invalid or unreadable settings
//!
//! Per-job execution failures live in
//! [`crate::job_scheduling::JobExecutionError`], which wraps these.

pub mod types;

pub use types::*;

/// Convenience type alias for Results using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Convenience type alias for Job Store / Execution Log Store results
pub type StoreResult<T> = Result<T, StoreError>;

/// Convenience type alias for Content Generator results
pub type GeneratorResult<T> = Result<T, GeneratorError>;
