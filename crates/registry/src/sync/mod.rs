//! Applies module lifecycle and entitlement events to SYSTEM timers.
//!
//! USER timers are never touched here. A tenant without a timer table is
//! skipped for update, delete and entitlement events; a create against a
//! missing table fails so the consumer can retry once provisioning catches up.


use std::sync::Arc;

use tracing::{info, warn};

use tock_core::{module_name_from_id, TenantContext, TimerRecord, TimerType};

use crate::error::SyncError;
use crate::events::{EntitlementEvent, ModuleResourceEvent, ModuleTimers, ResourceEventType};
use crate::service::TimerRegistry;

#[derive(Clone)]
pub struct ModuleSyncCoordinator {
    registry: Arc<TimerRegistry>,
}

impl ModuleSyncCoordinator {
    pub fn new(registry: Arc<TimerRegistry>) -> Self {
        Self { registry }
    }

    /// Returns how many timers were created or removed.
    pub async fn handle_resource_event(&self, event: &ModuleResourceEvent) -> Result<usize, SyncError> {
        let ctx = TenantContext::new(event.tenant.as_str())?;
        match event.event_type {
            ResourceEventType::Create => {
                let module = required(event.new_value.as_ref(), "newValue")?;
                self.create_timers(&ctx, module).await
            }
            ResourceEventType::Update => {
                let module = required(event.new_value.as_ref(), "newValue")?;
                let previous = event.old_value.as_ref().unwrap_or(module);
                let module_name = module_name_from_id(&previous.module_id)?;
                match self.delete_system_timers(&ctx, &module_name).await {
                    Ok(_) => {}
                    Err(e) if e.is_table_missing() => {
                        info!(
                            tenant = %ctx.tenant(),
                            module = %module_name,
                            "timer table missing, skipping module update"
                        );
                        return Ok(0);
                    }
                    Err(e) => return Err(e),
                }
                self.create_timers(&ctx, module).await
            }
            ResourceEventType::Delete => {
                let module = event
                    .old_value
                    .as_ref()
                    .or(event.new_value.as_ref())
                    .ok_or_else(|| SyncError::InvalidEvent("module delete without a value".to_string()))?;
                let module_name = module_name_from_id(&module.module_id)?;
                skip_table_missing(&ctx, "module delete", self.delete_system_timers(&ctx, &module_name).await)
            }
        }
    }

    /// Returns how many timers changed state.
    pub async fn handle_entitlement_event(&self, event: &EntitlementEvent) -> Result<usize, SyncError> {
        let ctx = TenantContext::new(event.tenant.as_str())?;
        let module_name = module_name_from_id(&event.module_id)?;
        let enable = event.event_type.enables();
        let result = self
            .registry
            .switch_module_timers(&ctx, &module_name, enable)
            .await
            .map_err(SyncError::from);
        skip_table_missing(&ctx, "entitlement", result)
    }

    async fn create_timers(&self, ctx: &TenantContext, module: &ModuleTimers) -> Result<usize, SyncError> {
        for entry in &module.timers {
            let record = TimerRecord::system(&module.module_id, entry.clone());
            self.registry.create(ctx, record).await?;
        }
        info!(
            tenant = %ctx.tenant(),
            module_id = %module.module_id,
            count = module.timers.len(),
            "module timers registered"
        );
        Ok(module.timers.len())
    }

    async fn delete_system_timers(&self, ctx: &TenantContext, module_name: &str) -> Result<usize, SyncError> {
        let existing = self
            .registry
            .find_by_module_and_kind(ctx, module_name, TimerType::System)
            .await?;
        let mut deleted = 0;
        for record in &existing {
            if let Some(id) = record.id {
                self.registry.delete(ctx, id).await?;
                deleted += 1;
            }
        }
        info!(tenant = %ctx.tenant(), module = %module_name, deleted, "module timers removed");
        Ok(deleted)
    }
}

fn required<'a>(value: Option<&'a ModuleTimers>, field: &str) -> Result<&'a ModuleTimers, SyncError> {
    value.ok_or_else(|| SyncError::InvalidEvent(format!("{field} is required")))
}

fn skip_table_missing(
    ctx: &TenantContext,
    what: &str,
    result: Result<usize, SyncError>,
) -> Result<usize, SyncError> {
    match result {
        Err(e) if e.is_table_missing() => {
            info!(tenant = %ctx.tenant(), "timer table missing, skipping {what}");
            Ok(0)
        }
        Err(e) => {
            warn!(tenant = %ctx.tenant(), error = %e, "{what} failed");
            Err(e)
        }
        ok => ok,
    }
}
