//! Scheduling engine capability.
//!
//! The engine owns jobs keyed by string. Each job carries a [`TriggerSpec`]
//! and the [`JobData`] handed to the [`JobHandler`] when it fires.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::trigger::TriggerSpec;

/// Payload stored with every job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobData {
    pub tenant: String,
    pub user_id: Option<Uuid>,
    pub timer_id: Uuid,
}

#[derive(Debug, Clone, Error)]
pub enum EngineError {
    #[error("job already exists: {0}")]
    AlreadyExists(String),

    #[error("invalid trigger for job {key}: {reason}")]
    InvalidTrigger { key: String, reason: String },

    #[error("engine unavailable: {0}")]
    Unavailable(String),
}

/// Job and trigger management.
#[async_trait]
pub trait SchedulingEngine: Send + Sync {
    /// Register a new job; fails with [`EngineError::AlreadyExists`] if `key` is taken.
    async fn register(&self, key: &str, trigger: &TriggerSpec, data: JobData)
        -> Result<(), EngineError>;

    /// Swap the trigger of an existing job. Returns `false` if no job has `key`.
    async fn replace_trigger(&self, key: &str, trigger: &TriggerSpec) -> Result<bool, EngineError>;

    /// Remove a job and its trigger. Returns `false` if no job has `key`.
    async fn remove_job(&self, key: &str) -> Result<bool, EngineError>;
}

/// Blanket implementation so `Arc<dyn SchedulingEngine>` can be used directly.
#[async_trait]
impl<T: SchedulingEngine + ?Sized> SchedulingEngine for Arc<T> {
    async fn register(
        &self,
        key: &str,
        trigger: &TriggerSpec,
        data: JobData,
    ) -> Result<(), EngineError> {
        (**self).register(key, trigger, data).await
    }

    async fn replace_trigger(&self, key: &str, trigger: &TriggerSpec) -> Result<bool, EngineError> {
        (**self).replace_trigger(key, trigger).await
    }

    async fn remove_job(&self, key: &str) -> Result<bool, EngineError> {
        (**self).remove_job(key).await
    }
}

/// Invoked each time a job fires.
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn fire(&self, job: JobData);
}

#[async_trait]
impl<T: JobHandler + ?Sized> JobHandler for Arc<T> {
    async fn fire(&self, job: JobData) {
        (**self).fire(job).await
    }
}
