//! Trigger side of timer scheduling.
//!
//! This crate provides:
//! - Cron translation from 5-field expressions to the engine's 7-field form
//! - Trigger computation and shape comparison for timer records
//! - The [`SchedulingEngine`] capability and a tokio-backed [`LocalEngine`]
//! - The [`TriggerCoordinator`] that keeps engine triggers in line with records

pub mod coordinator;
pub mod cron;
pub mod engine;
pub mod local;
pub mod trigger;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use coordinator::TriggerCoordinator;
pub use self::cron::{parse_schedule, translate, CronError};
pub use engine::{EngineError, JobData, JobHandler, SchedulingEngine};
pub use local::LocalEngine;
pub use trigger::{compute_trigger, TriggerError, TriggerShape, TriggerSpec};
