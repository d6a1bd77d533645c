//! In-memory timer store.
//!
//! Tables only exist for provisioned tenants, so [`StoreError::TableMissing`]
//! behaves the same as against PostgreSQL.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use tock_core::{TenantContext, TimerRecord, TimerType};

use crate::error::StoreError;
use crate::store::{Page, TimerStore};

#[derive(Debug, Clone)]
struct StoredTimer {
    natural_key: String,
    record: TimerRecord,
}

type Table = HashMap<Uuid, StoredTimer>;

#[derive(Default)]
pub struct InMemoryTimerStore {
    tables: RwLock<HashMap<String, Table>>,
}

impl InMemoryTimerStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn missing(ctx: &TenantContext) -> StoreError {
        StoreError::TableMissing {
            tenant: ctx.tenant().to_string(),
        }
    }

    async fn select<F>(&self, ctx: &TenantContext, filter: F) -> Result<Vec<TimerRecord>, StoreError>
    where
        F: Fn(&StoredTimer) -> bool,
    {
        let tables = self.tables.read().await;
        let table = tables.get(ctx.tenant()).ok_or_else(|| Self::missing(ctx))?;
        let mut rows: Vec<TimerRecord> = table
            .values()
            .filter(|row| filter(row))
            .map(|row| row.record.clone())
            .collect();
        rows.sort_by_key(|r| (r.metadata.as_ref().and_then(|m| m.created_date), r.id));
        Ok(rows)
    }
}

fn prepare(record: &TimerRecord) -> Result<(Uuid, StoredTimer), StoreError> {
    let id = record.id.ok_or(StoreError::MissingId)?;
    let natural_key = record.natural_key()?;
    Ok((
        id,
        StoredTimer {
            natural_key,
            record: record.clone(),
        },
    ))
}

fn insert(table: &mut Table, id: Uuid, row: StoredTimer) -> Result<(), StoreError> {
    let clash = table
        .iter()
        .any(|(other, existing)| *other != id && existing.natural_key == row.natural_key);
    if clash {
        return Err(StoreError::DuplicateKey(row.natural_key));
    }
    table.insert(id, row);
    Ok(())
}

#[async_trait]
impl TimerStore for InMemoryTimerStore {
    async fn find_by_id(
        &self,
        ctx: &TenantContext,
        id: Uuid,
    ) -> Result<Option<TimerRecord>, StoreError> {
        let tables = self.tables.read().await;
        let table = tables.get(ctx.tenant()).ok_or_else(|| Self::missing(ctx))?;
        Ok(table.get(&id).map(|row| row.record.clone()))
    }

    async fn find_by_natural_key(
        &self,
        ctx: &TenantContext,
        natural_key: &str,
    ) -> Result<Option<TimerRecord>, StoreError> {
        Ok(self
            .select(ctx, |row| row.natural_key == natural_key)
            .await?
            .into_iter()
            .next())
    }

    async fn find_by_module_and_kind(
        &self,
        ctx: &TenantContext,
        module_name: &str,
        kind: TimerType,
    ) -> Result<Vec<TimerRecord>, StoreError> {
        self.select(ctx, |row| {
            row.record.module_name.as_deref() == Some(module_name) && row.record.kind == Some(kind)
        })
        .await
    }

    async fn find_by_module_and_enabled(
        &self,
        ctx: &TenantContext,
        module_name: &str,
        enabled: bool,
    ) -> Result<Vec<TimerRecord>, StoreError> {
        self.select(ctx, |row| {
            row.record.module_name.as_deref() == Some(module_name) && row.record.enabled == enabled
        })
        .await
    }

    async fn find_all(
        &self,
        ctx: &TenantContext,
        offset: u64,
        limit: u64,
    ) -> Result<Page, StoreError> {
        let all = self.select(ctx, |_| true).await?;
        let total = all.len() as u64;
        let items = all
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect();
        Ok(Page { items, total })
    }

    async fn list_all(&self, ctx: &TenantContext) -> Result<Vec<TimerRecord>, StoreError> {
        self.select(ctx, |_| true).await
    }

    async fn save(
        &self,
        ctx: &TenantContext,
        record: &TimerRecord,
    ) -> Result<TimerRecord, StoreError> {
        let (id, row) = prepare(record)?;
        let mut tables = self.tables.write().await;
        let table = tables
            .get_mut(ctx.tenant())
            .ok_or_else(|| Self::missing(ctx))?;
        insert(table, id, row)?;
        Ok(record.clone())
    }

    async fn save_all(
        &self,
        ctx: &TenantContext,
        records: &[TimerRecord],
    ) -> Result<Vec<TimerRecord>, StoreError> {
        let rows = records
            .iter()
            .map(prepare)
            .collect::<Result<Vec<_>, _>>()?;
        let mut tables = self.tables.write().await;
        let table = tables
            .get_mut(ctx.tenant())
            .ok_or_else(|| Self::missing(ctx))?;

        // Apply to a copy so a clash leaves the table untouched.
        let mut staged = table.clone();
        for (id, row) in rows {
            insert(&mut staged, id, row)?;
        }
        *table = staged;
        Ok(records.to_vec())
    }

    async fn delete(&self, ctx: &TenantContext, id: Uuid) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;
        let table = tables
            .get_mut(ctx.tenant())
            .ok_or_else(|| Self::missing(ctx))?;
        Ok(table.remove(&id).is_some())
    }

    async fn tenants(&self) -> Result<Vec<String>, StoreError> {
        let mut tenants: Vec<String> = self.tables.read().await.keys().cloned().collect();
        tenants.sort();
        Ok(tenants)
    }

    async fn provision(&self, ctx: &TenantContext) -> Result<(), StoreError> {
        self.tables
            .write()
            .await
            .entry(ctx.tenant().to_string())
            .or_default();
        Ok(())
    }
}
