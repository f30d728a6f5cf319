//! Store abstractions used by the processor
//!
//! - `traits`: the `JobStore` and `ExecutionLogStore` seams
//! - `memory`: in-process implementations for embedding and tests

pub mod memory;
pub mod traits;

pub use memory::{InMemoryExecutionLogStore, InMemoryJobStore};
pub use traits::{ExecutionLogStore, JobStore};
