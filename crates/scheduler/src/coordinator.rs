//! Reconciles engine triggers with timer records.
//!
//! The coordinator never persists anything: the record is the intent, and
//! every method here moves the engine toward it.

use std::sync::Arc;

use tracing::{debug, info, warn};

use tock_core::{TenantContext, TimerRecord};

use crate::engine::{EngineError, JobData, SchedulingEngine};
use crate::trigger::{compute_trigger, TriggerError, TriggerShape};

#[derive(Clone)]
pub struct TriggerCoordinator {
    engine: Arc<dyn SchedulingEngine>,
}

impl TriggerCoordinator {
    pub fn new(engine: Arc<dyn SchedulingEngine>) -> Self {
        Self { engine }
    }

    /// Register a trigger for `record`.
    ///
    /// Returns `false` without touching the engine when the record is inactive,
    /// and `false` when the engine already holds a job under the record's id.
    pub async fn schedule(
        &self,
        ctx: &TenantContext,
        record: &TimerRecord,
    ) -> Result<bool, TriggerError> {
        if !record.is_active() {
            debug!(
                tenant = %ctx.tenant(),
                timer_id = ?record.id,
                enabled = record.enabled,
                "timer inactive, not scheduling"
            );
            return Ok(false);
        }

        let timer_id = record.id.ok_or(TriggerError::MissingId)?;
        let key = timer_id.to_string();
        let trigger = compute_trigger(record)?;
        let data = JobData {
            tenant: ctx.tenant().to_string(),
            // Rebuilds run without a caller; fall back to the last writer.
            user_id: ctx
                .user_id()
                .or_else(|| record.metadata.as_ref().and_then(|m| m.updated_by_user_id)),
            timer_id,
        };

        match self.engine.register(&key, &trigger, data).await {
            Ok(()) => {
                info!(tenant = %ctx.tenant(), timer_id = %key, ?trigger, "timer scheduled");
                Ok(true)
            }
            Err(EngineError::AlreadyExists(_)) => {
                debug!(tenant = %ctx.tenant(), timer_id = %key, "job already registered");
                Ok(false)
            }
            Err(source) => Err(TriggerError::SchedulingFailure {
                job_key: key,
                source,
            }),
        }
    }

    /// Move the engine from `old`'s trigger to `new`'s.
    pub async fn reschedule(
        &self,
        ctx: &TenantContext,
        old: &TimerRecord,
        new: &TimerRecord,
    ) -> Result<(), TriggerError> {
        if !new.is_active() {
            if old.is_active() {
                info!(tenant = %ctx.tenant(), timer_id = ?new.id, "timer deactivated, removing trigger");
                return self.delete(ctx, old).await;
            }
            debug!(tenant = %ctx.tenant(), timer_id = ?new.id, "timer stays inactive");
            return Ok(());
        }

        if !old.is_active() {
            self.schedule(ctx, new).await?;
            return Ok(());
        }

        if TriggerShape::of(old) == TriggerShape::of(new) {
            debug!(tenant = %ctx.tenant(), timer_id = ?new.id, "trigger unchanged");
            return Ok(());
        }

        let key = new.job_key().ok_or(TriggerError::MissingId)?;
        let trigger = compute_trigger(new)?;
        let replaced = self
            .engine
            .replace_trigger(&key, &trigger)
            .await
            .map_err(|source| TriggerError::SchedulingFailure {
                job_key: key.clone(),
                source,
            })?;

        if replaced {
            info!(tenant = %ctx.tenant(), timer_id = %key, ?trigger, "trigger replaced");
        } else {
            warn!(tenant = %ctx.tenant(), timer_id = %key, "no job to replace, registering");
            self.schedule(ctx, new).await?;
        }
        Ok(())
    }

    /// Remove the trigger of `record`; inactive records have none.
    pub async fn delete(&self, ctx: &TenantContext, record: &TimerRecord) -> Result<(), TriggerError> {
        if !record.is_active() {
            debug!(tenant = %ctx.tenant(), timer_id = ?record.id, "timer inactive, nothing to unschedule");
            return Ok(());
        }

        let key = record.job_key().ok_or(TriggerError::MissingId)?;
        let removed = self
            .engine
            .remove_job(&key)
            .await
            .map_err(|source| TriggerError::SchedulingFailure {
                job_key: key.clone(),
                source,
            })?;
        info!(tenant = %ctx.tenant(), timer_id = %key, removed, "trigger removed");
        Ok(())
    }

    /// Register triggers for every active record. Returns how many were registered.
    ///
    /// Failures are logged per record so one bad timer cannot block the rest.
    pub async fn rebuild(&self, ctx: &TenantContext, records: &[TimerRecord]) -> usize {
        let mut registered = 0;
        for record in records {
            match self.schedule(ctx, record).await {
                Ok(true) => registered += 1,
                Ok(false) => {}
                Err(e) => warn!(
                    tenant = %ctx.tenant(),
                    timer_id = ?record.id,
                    error = %e,
                    "failed to rebuild trigger"
                ),
            }
        }
        info!(tenant = %ctx.tenant(), registered, total = records.len(), "triggers rebuilt");
        registered
    }
}
