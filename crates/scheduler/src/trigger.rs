//! Trigger specifications derived from timer records.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use tock_core::{TimerRecord, TimeUnit, MIN_INTERVAL_MS};

use crate::cron::{translate, CronError};
use crate::engine::EngineError;

/// What the engine needs to fire a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TriggerSpec {
    /// Fixed rate, first fire one interval after registration.
    Interval { every_ms: u64 },
    /// Engine-form cron expression evaluated in an IANA zone.
    Cron { expression: String, zone: String },
}

#[derive(Debug, Error)]
pub enum TriggerError {
    #[error("trigger not specified: neither interval nor schedule is set")]
    TriggerNotSpecified,

    #[error("interval and schedule are mutually exclusive")]
    ConflictingTriggerShapes,

    #[error("interval too short: {millis}ms (minimum {MIN_INTERVAL_MS}ms)")]
    IntervalTooShort { millis: u64 },

    #[error("invalid delay: '{0}'")]
    InvalidDelay(String),

    #[error("invalid time zone: '{0}'")]
    InvalidZone(String),

    #[error(transparent)]
    Cron(#[from] CronError),

    #[error("timer has no id to key its trigger")]
    MissingId,

    #[error("scheduling failure for job {job_key}: {source}")]
    SchedulingFailure {
        job_key: String,
        #[source]
        source: EngineError,
    },
}

impl TriggerError {
    /// Whether the error stems from the record's content rather than the engine.
    pub fn is_validation(&self) -> bool {
        !matches!(
            self,
            TriggerError::SchedulingFailure { .. } | TriggerError::MissingId
        )
    }
}

/// Compute the engine trigger for `record`.
pub fn compute_trigger(record: &TimerRecord) -> Result<TriggerSpec, TriggerError> {
    let entry = record
        .routing_entry
        .as_ref()
        .ok_or(TriggerError::TriggerNotSpecified)?;

    match (&entry.interval, &entry.schedule) {
        (Some(_), Some(_)) => Err(TriggerError::ConflictingTriggerShapes),
        (None, None) => Err(TriggerError::TriggerNotSpecified),
        (Some(interval), None) => {
            let delay = interval
                .delay
                .trim()
                .parse::<u64>()
                .map_err(|_| TriggerError::InvalidDelay(interval.delay.clone()))?;
            let millis = delay
                .checked_mul(interval.unit.millis())
                .ok_or_else(|| TriggerError::InvalidDelay(interval.delay.clone()))?;
            if millis < MIN_INTERVAL_MS {
                return Err(TriggerError::IntervalTooShort { millis });
            }
            Ok(TriggerSpec::Interval { every_ms: millis })
        }
        (None, Some(schedule)) => {
            let zone = schedule.zone_or_default();
            zone.parse::<chrono_tz::Tz>()
                .map_err(|_| TriggerError::InvalidZone(zone.to_string()))?;
            Ok(TriggerSpec::Cron {
                expression: translate(&schedule.cron)?,
                zone: zone.to_string(),
            })
        }
    }
}

/// Declared trigger shape of a record, used to decide whether a reschedule is a no-op.
///
/// Interval timers compare `(delay, unit)`, cron timers `(expression, zone)`;
/// the two shapes never compare equal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerShape {
    Interval { delay: String, unit: TimeUnit },
    Cron { expression: String, zone: String },
}

impl TriggerShape {
    pub fn of(record: &TimerRecord) -> Option<Self> {
        let entry = record.routing_entry.as_ref()?;
        match (&entry.interval, &entry.schedule) {
            (Some(interval), None) => Some(TriggerShape::Interval {
                delay: interval.delay.trim().to_string(),
                unit: interval.unit,
            }),
            (None, Some(schedule)) => Some(TriggerShape::Cron {
                expression: schedule.cron.trim().to_string(),
                zone: schedule.zone_or_default().to_string(),
            }),
            _ => None,
        }
    }
}
