pub mod cron_helper;
pub mod worker_id;

pub use worker_id::WorkerId;
