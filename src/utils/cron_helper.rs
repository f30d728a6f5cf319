//! Next-run computation for job schedules
//!
//! Only job store implementations call into this module; the processor itself
//! treats `ScheduleConfig` as opaque.

use chrono::{DateTime, Utc};
use cron::Schedule;
use std::str::FromStr;

use crate::models::ScheduleConfig;

/// Calculate when a job should next run, given that it just ran at `after`
///
/// # Returns
/// * `Ok(Some(time))` - The next run time
/// * `Ok(None)` - The schedule has no further runs (one-shot or exhausted cron)
/// * `Err(String)` - The schedule cannot be interpreted
pub fn next_run_after(
    schedule: &ScheduleConfig,
    after: DateTime<Utc>,
) -> Result<Option<DateTime<Utc>>, String> {
    match schedule {
        ScheduleConfig::Cron { expression } => {
            let schedule = Schedule::from_str(expression)
                .map_err(|e| format!("Invalid cron expression '{expression}': {e}"))?;
            Ok(schedule.after(&after).next())
        }
        ScheduleConfig::Interval { every } => {
            if every.is_zero() {
                return Err("Interval schedule must be greater than zero".to_string());
            }
            let every = chrono::Duration::from_std(*every)
                .map_err(|e| format!("Interval {every:?} out of range: {e}"))?;
            Ok(after.checked_add_signed(every))
        }
        ScheduleConfig::Once => Ok(None),
    }
}

/// Check that a schedule can be interpreted before a job is stored
pub fn validate_schedule(schedule: &ScheduleConfig) -> Result<(), String> {
    next_run_after(schedule, Utc::now()).map(|_| ())
}
