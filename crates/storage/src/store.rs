//! Timer store trait.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use uuid::Uuid;

use tock_core::{TenantContext, TimerRecord, TimerType};

use crate::error::StoreError;

/// One page of a listing plus the tenant-wide total.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Page {
    pub items: Vec<TimerRecord>,
    pub total: u64,
}

/// Persistence for timer records, scoped by the tenant in `ctx`.
///
/// Every method reports [`StoreError::TableMissing`] for a tenant that was
/// never provisioned. `save` upserts by id and keeps natural keys unique.
#[async_trait]
pub trait TimerStore: Send + Sync {
    async fn find_by_id(
        &self,
        ctx: &TenantContext,
        id: Uuid,
    ) -> Result<Option<TimerRecord>, StoreError>;

    async fn find_by_natural_key(
        &self,
        ctx: &TenantContext,
        natural_key: &str,
    ) -> Result<Option<TimerRecord>, StoreError>;

    async fn find_by_module_and_kind(
        &self,
        ctx: &TenantContext,
        module_name: &str,
        kind: TimerType,
    ) -> Result<Vec<TimerRecord>, StoreError>;

    async fn find_by_module_and_enabled(
        &self,
        ctx: &TenantContext,
        module_name: &str,
        enabled: bool,
    ) -> Result<Vec<TimerRecord>, StoreError>;

    /// Records ordered by creation time, then id.
    async fn find_all(
        &self,
        ctx: &TenantContext,
        offset: u64,
        limit: u64,
    ) -> Result<Page, StoreError>;

    async fn list_all(&self, ctx: &TenantContext) -> Result<Vec<TimerRecord>, StoreError>;

    async fn save(
        &self,
        ctx: &TenantContext,
        record: &TimerRecord,
    ) -> Result<TimerRecord, StoreError>;

    /// Save a batch in one write.
    async fn save_all(
        &self,
        ctx: &TenantContext,
        records: &[TimerRecord],
    ) -> Result<Vec<TimerRecord>, StoreError>;

    /// Returns whether a record was removed.
    async fn delete(&self, ctx: &TenantContext, id: Uuid) -> Result<bool, StoreError>;

    /// Tenants that currently have a timer table.
    async fn tenants(&self) -> Result<Vec<String>, StoreError>;

    /// Create the tenant's timer table. Idempotent.
    async fn provision(&self, ctx: &TenantContext) -> Result<(), StoreError>;
}

/// Blanket implementation so `Arc<dyn TimerStore>` can be used directly.
#[async_trait]
impl<T: TimerStore + ?Sized> TimerStore for Arc<T> {
    async fn find_by_id(
        &self,
        ctx: &TenantContext,
        id: Uuid,
    ) -> Result<Option<TimerRecord>, StoreError> {
        (**self).find_by_id(ctx, id).await
    }

    async fn find_by_natural_key(
        &self,
        ctx: &TenantContext,
        natural_key: &str,
    ) -> Result<Option<TimerRecord>, StoreError> {
        (**self).find_by_natural_key(ctx, natural_key).await
    }

    async fn find_by_module_and_kind(
        &self,
        ctx: &TenantContext,
        module_name: &str,
        kind: TimerType,
    ) -> Result<Vec<TimerRecord>, StoreError> {
        (**self).find_by_module_and_kind(ctx, module_name, kind).await
    }

    async fn find_by_module_and_enabled(
        &self,
        ctx: &TenantContext,
        module_name: &str,
        enabled: bool,
    ) -> Result<Vec<TimerRecord>, StoreError> {
        (**self)
            .find_by_module_and_enabled(ctx, module_name, enabled)
            .await
    }

    async fn find_all(
        &self,
        ctx: &TenantContext,
        offset: u64,
        limit: u64,
    ) -> Result<Page, StoreError> {
        (**self).find_all(ctx, offset, limit).await
    }

    async fn list_all(&self, ctx: &TenantContext) -> Result<Vec<TimerRecord>, StoreError> {
        (**self).list_all(ctx).await
    }

    async fn save(
        &self,
        ctx: &TenantContext,
        record: &TimerRecord,
    ) -> Result<TimerRecord, StoreError> {
        (**self).save(ctx, record).await
    }

    async fn save_all(
        &self,
        ctx: &TenantContext,
        records: &[TimerRecord],
    ) -> Result<Vec<TimerRecord>, StoreError> {
        (**self).save_all(ctx, records).await
    }

    async fn delete(&self, ctx: &TenantContext, id: Uuid) -> Result<bool, StoreError> {
        (**self).delete(ctx, id).await
    }

    async fn tenants(&self) -> Result<Vec<String>, StoreError> {
        (**self).tenants().await
    }

    async fn provision(&self, ctx: &TenantContext) -> Result<(), StoreError> {
        (**self).provision(ctx).await
    }
}
