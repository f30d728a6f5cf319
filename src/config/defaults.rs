/// Configuration default values
///
/// This module contains all the default values for configuration options,
/// making them easily changeable in one central location.
use std::time::Duration;

// Processor defaults
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_MAINTENANCE_INTERVAL: Duration = Duration::from_secs(60 * 60);
pub const DEFAULT_MAX_CONCURRENT_JOBS: usize = 3;
pub const DEFAULT_STARTUP_DELAY: Duration = Duration::from_secs(10);
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_SHUTDOWN_POLL_INTERVAL: Duration = Duration::from_millis(500);
// Entries still `running` after this long belong to a dead worker
pub const DEFAULT_STALE_RUNNING_AFTER: Duration = Duration::from_secs(6 * 60 * 60);

// Content generator defaults
pub const DEFAULT_GENERATOR_BASE_URL: &str = "http://localhost:3000";
pub const DEFAULT_GENERATOR_ENDPOINT: &str = "/api/generate";
pub const DEFAULT_GENERATOR_TIMEOUT: Duration = Duration::from_secs(10 * 60);
pub const DEFAULT_GENERATOR_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

// Database defaults
pub const DEFAULT_DATABASE_URL: &str = "sqlite://./job-processor.db";
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;

// Retention defaults
pub const DEFAULT_EXECUTION_LOG_RETENTION: Duration = Duration::from_secs(30 * 24 * 60 * 60);

// Generation settings fallbacks, applied by `GenerationSettings::resolve`
pub const DEFAULT_DAYS_AHEAD: i64 = 1;
pub const DEFAULT_MAX_ITEMS: u32 = 10;
pub const DEFAULT_LOOKBACK_DAYS: u32 = 7;
pub const DEFAULT_ITEMS_PER_UNIT: u32 = 6;
pub const DEFAULT_TYPE_DISTRIBUTION: &[(&str, u8)] =
    &[("multiple_choice", 60), ("true_false", 20), ("fill_blank", 20)];
pub const DEFAULT_DIFFICULTY_DISTRIBUTION: &[(&str, u8)] =
    &[("easy", 30), ("medium", 50), ("hard", 20)];
