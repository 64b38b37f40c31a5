//! Turning a [`TimingSpec`] into an absolute fire time.

use chrono::{DateTime, Duration, Utc};
use croner::Cron;

use crate::{EngineError, models::TimingSpec};

/// Check that a spec can produce fire times (cron expressions parse).
pub fn validate(spec: &TimingSpec) -> Result<(), EngineError> {
    match spec {
        TimingSpec::Delay { .. } => Ok(()),
        TimingSpec::Cron { expression } => parse_cron(expression).map(|_| ()),
    }
}

/// Fire time for `spec` when scheduled at `now`.
///
/// Cron schedules yield the next occurrence strictly after `now`.
pub fn next_fire_time(spec: &TimingSpec, now: DateTime<Utc>) -> Result<DateTime<Utc>, EngineError> {
    match spec {
        TimingSpec::Delay { seconds } => {
            let seconds = i64::try_from(*seconds).map_err(|_| invalid(format!("delay of {seconds}s is too long")))?;
            Duration::try_seconds(seconds)
                .and_then(|d| now.checked_add_signed(d))
                .ok_or_else(|| invalid(format!("delay of {seconds}s is too long")))
        }
        TimingSpec::Cron { expression } => parse_cron(expression)?
            .find_next_occurrence(&now, false)
            .map_err(|e| invalid(format!("cron '{expression}' has no next occurrence: {e}"))),
    }
}

fn parse_cron(expression: &str) -> Result<Cron, EngineError> {
    Cron::new(expression)
        .parse()
        .map_err(|e| invalid(format!("invalid cron expression '{expression}': {e}")))
}

fn invalid(message: String) -> EngineError {
    EngineError::InvalidTiming(message)
}
