//! Worker instance identity
//!
//! Each processor instance tags its log entries and generator requests with
//! one identifier so runs can be correlated across horizontally scaled workers.

use chrono::Utc;
use rand::{Rng, distr::Alphanumeric};
use std::fmt;

const SUFFIX_LEN: usize = 9;

/// Opaque identifier for one running processor instance
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WorkerId(String);

impl WorkerId {
    /// Generate `worker-<unix millis>-<random suffix>`
    pub fn generate() -> Self {
        let suffix: String = rand::rng()
            .sample_iter(&Alphanumeric)
            .take(SUFFIX_LEN)
            .map(char::from)
            .collect();
        Self(format!(
            "worker-{}-{}",
            Utc::now().timestamp_millis(),
            suffix.to_lowercase()
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for WorkerId {
    fn from(value: String) -> Self {
        Self(value)
    }
}
