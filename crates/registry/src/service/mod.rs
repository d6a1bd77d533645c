//! Timer registry service.
//!
//! Every write persists first and then asks the [`TriggerCoordinator`] to
//! bring the engine in line. The store is authoritative: if reconciliation
//! fails the record stays and the error is returned to the caller.

#[cfg(test)]
mod tests;

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use tock_core::{AuditMetadata, Interval, TenantContext, TimerRecord, TimerType};
use tock_scheduler::{compute_trigger, TriggerCoordinator};
use tock_storage::{Page, TimerStore};

use crate::error::RegistryError;

#[derive(Clone)]
pub struct TimerRegistry {
    store: Arc<dyn TimerStore>,
    coordinator: TriggerCoordinator,
}

impl TimerRegistry {
    pub fn new(store: Arc<dyn TimerStore>, coordinator: TriggerCoordinator) -> Self {
        Self { store, coordinator }
    }

    pub fn store(&self) -> &Arc<dyn TimerStore> {
        &self.store
    }

    // ── Writes ────────────────────────────────────────────────────

    /// Create a timer, or update the existing one when the natural key matches.
    pub async fn create(
        &self,
        ctx: &TenantContext,
        mut input: TimerRecord,
    ) -> Result<TimerRecord, RegistryError> {
        if let Some(id) = input.id {
            if self.store.find_by_id(ctx, id).await?.is_some() {
                return Err(RegistryError::AlreadyExists(id.to_string()));
            }
        }

        prepare(&mut input)?;
        let natural_key = input.natural_key()?;

        if let Some(existing) = self.store.find_by_natural_key(ctx, &natural_key).await? {
            let id = existing
                .id
                .ok_or_else(|| RegistryError::Validation("stored timer has no id".to_string()))?;
            info!(
                tenant = %ctx.tenant(),
                timer_id = %id,
                natural_key = %natural_key,
                "timer already registered, updating instead"
            );
            input.id = Some(id);
            return self.apply_update(ctx, existing, input).await;
        }

        let now = Utc::now();
        input.id = Some(input.id.unwrap_or_else(Uuid::new_v4));
        input.metadata = Some(AuditMetadata {
            created_date: Some(now),
            created_by_user_id: ctx.user_id(),
            updated_date: Some(now),
            updated_by_user_id: ctx.user_id(),
        });

        let saved = self.store.save(ctx, &input).await?;
        self.coordinator.schedule(ctx, &saved).await?;
        info!(tenant = %ctx.tenant(), timer_id = ?saved.id, natural_key = %natural_key, "timer created");
        Ok(saved)
    }

    /// Replace the timer stored under `id`.
    pub async fn update(
        &self,
        ctx: &TenantContext,
        id: Uuid,
        mut input: TimerRecord,
    ) -> Result<TimerRecord, RegistryError> {
        if input.id != Some(id) {
            return Err(RegistryError::Validation(format!(
                "timer id in body ({}) does not match path id ({id})",
                input
                    .id
                    .map(|i| i.to_string())
                    .unwrap_or_else(|| "missing".to_string())
            )));
        }

        prepare(&mut input)?;
        let existing = self
            .store
            .find_by_id(ctx, id)
            .await?
            .ok_or(RegistryError::NotFound(id))?;
        self.apply_update(ctx, existing, input).await
    }

    async fn apply_update(
        &self,
        ctx: &TenantContext,
        existing: TimerRecord,
        mut input: TimerRecord,
    ) -> Result<TimerRecord, RegistryError> {
        let created = existing.metadata.clone().unwrap_or_default();
        input.metadata = Some(AuditMetadata {
            created_date: created.created_date,
            created_by_user_id: created.created_by_user_id,
            updated_date: Some(Utc::now()),
            updated_by_user_id: ctx.user_id(),
        });

        let saved = self.store.save(ctx, &input).await?;
        self.coordinator.reschedule(ctx, &existing, &saved).await?;
        debug!(tenant = %ctx.tenant(), timer_id = ?saved.id, "timer updated");
        Ok(saved)
    }

    /// Delete a timer and its trigger. Missing ids are a no-op.
    pub async fn delete(&self, ctx: &TenantContext, id: Uuid) -> Result<(), RegistryError> {
        let Some(existing) = self.store.find_by_id(ctx, id).await? else {
            debug!(tenant = %ctx.tenant(), timer_id = %id, "delete of unknown timer ignored");
            return Ok(());
        };
        self.store.delete(ctx, id).await?;
        self.coordinator.delete(ctx, &existing).await?;
        info!(tenant = %ctx.tenant(), timer_id = %id, "timer deleted");
        Ok(())
    }

    /// Tenant teardown: delete every timer. Returns how many were removed.
    pub async fn delete_all(&self, ctx: &TenantContext) -> Result<usize, RegistryError> {
        let records = self.store.list_all(ctx).await?;
        let mut deleted = 0;
        for record in &records {
            if let Some(id) = record.id {
                self.delete(ctx, id).await?;
                deleted += 1;
            }
        }
        info!(tenant = %ctx.tenant(), deleted, "all timers deleted");
        Ok(deleted)
    }

    /// Enable or disable a module's SYSTEM timers. Returns how many changed.
    ///
    /// Only records whose flag differs are touched, so repeating a switch is a no-op.
    pub async fn switch_module_timers(
        &self,
        ctx: &TenantContext,
        module_name: &str,
        enable: bool,
    ) -> Result<usize, RegistryError> {
        let mismatched: Vec<TimerRecord> = self
            .store
            .find_by_module_and_enabled(ctx, module_name, !enable)
            .await?
            .into_iter()
            .filter(|r| r.kind == Some(TimerType::System))
            .collect();

        if mismatched.is_empty() {
            debug!(tenant = %ctx.tenant(), module = %module_name, enable, "no timers to switch");
            return Ok(0);
        }

        let now = Utc::now();
        let flipped: Vec<TimerRecord> = mismatched
            .iter()
            .cloned()
            .map(|mut r| {
                r.enabled = enable;
                let metadata = r.metadata.get_or_insert_with(AuditMetadata::default);
                metadata.updated_date = Some(now);
                metadata.updated_by_user_id = ctx.user_id();
                r
            })
            .collect();

        let saved = self.store.save_all(ctx, &flipped).await?;

        if enable {
            for record in &saved {
                self.coordinator.schedule(ctx, record).await?;
            }
        } else {
            for record in &mismatched {
                self.coordinator.delete(ctx, record).await?;
            }
        }

        info!(
            tenant = %ctx.tenant(),
            module = %module_name,
            enable,
            switched = saved.len(),
            "module timers switched"
        );
        Ok(saved.len())
    }

    // ── Reads ─────────────────────────────────────────────────────

    pub async fn find_by_id(&self, ctx: &TenantContext, id: Uuid) -> Result<TimerRecord, RegistryError> {
        self.store
            .find_by_id(ctx, id)
            .await?
            .ok_or(RegistryError::NotFound(id))
    }

    pub async fn find_by_module_and_kind(
        &self,
        ctx: &TenantContext,
        module_name: &str,
        kind: TimerType,
    ) -> Result<Vec<TimerRecord>, RegistryError> {
        Ok(self.store.find_by_module_and_kind(ctx, module_name, kind).await?)
    }

    pub async fn find_all(
        &self,
        ctx: &TenantContext,
        offset: u64,
        limit: u64,
    ) -> Result<Page, RegistryError> {
        Ok(self.store.find_all(ctx, offset, limit).await?)
    }

    // ── Tenant lifecycle ──────────────────────────────────────────

    /// Provision the tenant's storage and register triggers for its stored timers.
    pub async fn init_tenant(&self, ctx: &TenantContext) -> Result<usize, RegistryError> {
        self.store.provision(ctx).await?;
        let records = self.store.list_all(ctx).await?;
        Ok(self.coordinator.rebuild(ctx, &records).await)
    }

    /// Rebuild triggers for every provisioned tenant. Used at process start.
    pub async fn rebuild_all(&self) -> Result<usize, RegistryError> {
        let mut registered = 0;
        for tenant in self.store.tenants().await? {
            let ctx = match TenantContext::new(tenant.as_str()) {
                Ok(ctx) => ctx,
                Err(e) => {
                    warn!(tenant = %tenant, error = %e, "skipping tenant with invalid name");
                    continue;
                }
            };
            let records = self.store.list_all(&ctx).await?;
            registered += self.coordinator.rebuild(&ctx, &records).await;
        }
        Ok(registered)
    }
}

/// Validate an input record and derive the server-side fields.
fn prepare(record: &mut TimerRecord) -> Result<(), RegistryError> {
    if record.kind.is_none() {
        return Err(RegistryError::Validation("timer type is required".to_string()));
    }
    let entry = record
        .routing_entry
        .as_ref()
        .ok_or_else(|| RegistryError::Validation("routing entry is required".to_string()))?;
    entry.validate()?;

    record.resolve_module_name()?;
    if record
        .module_name
        .as_deref()
        .map_or(true, |m| m.trim().is_empty())
    {
        return Err(RegistryError::Validation(
            "moduleName or moduleId is required".to_string(),
        ));
    }

    // Disabled timers are checked too: they may be switched on later.
    let zero_interval = record
        .routing_entry
        .as_ref()
        .and_then(|e| e.interval.as_ref())
        .is_some_and(Interval::is_zero);
    if !zero_interval {
        compute_trigger(record)?;
    }
    Ok(())
}
