//! PostgreSQL timer store.
//!
//! Each tenant owns a schema `{tenant}_tock` with a single `timer` table.
//! The full record is kept as JSONB next to the columns used for lookups.
//! Tenant names are validated by [`TenantContext`] before they reach SQL.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgSslMode};
use sqlx::PgPool;
use tracing::{error, info};
use uuid::Uuid;

use tock_core::config::PostgresConfig;
use tock_core::{TenantContext, TimerRecord, TimerType};

use crate::error::StoreError;
use crate::store::{Page, TimerStore};

const SCHEMA_SUFFIX: &str = "_tock";
const TABLE: &str = "timer";

/// Schema holding `tenant`'s timers.
pub fn schema_name(tenant: &str) -> String {
    format!("{}{}", tenant.to_lowercase(), SCHEMA_SUFFIX)
}

fn table(ctx: &TenantContext) -> String {
    format!("\"{}\".{}", schema_name(ctx.tenant()), TABLE)
}

/// Map `42P01` (undefined_table) to [`StoreError::TableMissing`] and `23505` to a key clash.
fn map_db_error(e: sqlx::Error, ctx: &TenantContext) -> StoreError {
    if let sqlx::Error::Database(ref db_err) = e {
        match db_err.code().as_deref() {
            Some("42P01") => {
                return StoreError::TableMissing {
                    tenant: ctx.tenant().to_string(),
                }
            }
            Some("23505") => return StoreError::DuplicateKey(db_err.message().to_string()),
            _ => {}
        }
    }
    error!(tenant = %ctx.tenant(), "timer store database error: {}", e);
    StoreError::Database(e)
}

fn decode(rows: Vec<serde_json::Value>) -> Result<Vec<TimerRecord>, StoreError> {
    rows.into_iter()
        .map(|v| serde_json::from_value(v).map_err(StoreError::from))
        .collect()
}

struct Row {
    id: Uuid,
    natural_key: String,
    module_name: Option<String>,
    kind: String,
    enabled: bool,
    descriptor: serde_json::Value,
    created_date: Option<DateTime<Utc>>,
    updated_date: Option<DateTime<Utc>>,
}

impl Row {
    fn from_record(record: &TimerRecord) -> Result<Self, StoreError> {
        let id = record.id.ok_or(StoreError::MissingId)?;
        let natural_key = record.natural_key()?;
        let kind = record
            .kind
            .map(|k| k.as_str().to_string())
            .unwrap_or_default();
        let metadata = record.metadata.as_ref();
        Ok(Self {
            id,
            natural_key,
            module_name: record.module_name.clone(),
            kind,
            enabled: record.enabled,
            descriptor: serde_json::to_value(record)?,
            created_date: metadata.and_then(|m| m.created_date),
            updated_date: metadata.and_then(|m| m.updated_date),
        })
    }
}

pub struct PgTimerStore {
    pool: PgPool,
}

impl PgTimerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(config: &PostgresConfig) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(connect_options(config)?)
            .await?;
        info!("PostgreSQL connected: {}", config.host);
        Ok(Self::new(pool))
    }

    async fn fetch(
        &self,
        ctx: &TenantContext,
        sql: &str,
        binds: &[&str],
    ) -> Result<Vec<TimerRecord>, StoreError> {
        let mut query = sqlx::query_scalar::<_, serde_json::Value>(sql);
        for bind in binds {
            query = query.bind(*bind);
        }
        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_db_error(e, ctx))?;
        decode(rows)
    }

    fn upsert_sql(ctx: &TenantContext) -> String {
        format!(
            "INSERT INTO {} (id, natural_key, module_name, kind, enabled, descriptor, created_date, updated_date)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             ON CONFLICT (id) DO UPDATE SET
                natural_key = EXCLUDED.natural_key,
                module_name = EXCLUDED.module_name,
                kind = EXCLUDED.kind,
                enabled = EXCLUDED.enabled,
                descriptor = EXCLUDED.descriptor,
                updated_date = EXCLUDED.updated_date",
            table(ctx)
        )
    }
}

/// Connection options from config fields; credentials are never spliced into a URL.
fn connect_options(config: &PostgresConfig) -> Result<PgConnectOptions, StoreError> {
    let ssl_mode = config.ssl_mode.parse::<PgSslMode>()?;
    let mut options = PgConnectOptions::new()
        .host(&config.host)
        .port(config.port)
        .database(&config.database)
        .username(config.username_or_default())
        .ssl_mode(ssl_mode);
    if let Some(password) = config.password.as_deref() {
        options = options.password(password);
    }
    Ok(options)
}

fn bind_row<'q>(
    sql: &'q str,
    row: Row,
) -> sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments> {
    sqlx::query(sql)
        .bind(row.id)
        .bind(row.natural_key)
        .bind(row.module_name)
        .bind(row.kind)
        .bind(row.enabled)
        .bind(row.descriptor)
        .bind(row.created_date)
        .bind(row.updated_date)
}

#[async_trait]
impl TimerStore for PgTimerStore {
    async fn find_by_id(
        &self,
        ctx: &TenantContext,
        id: Uuid,
    ) -> Result<Option<TimerRecord>, StoreError> {
        let sql = format!("SELECT descriptor FROM {} WHERE id = $1", table(ctx));
        let row = sqlx::query_scalar::<_, serde_json::Value>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_db_error(e, ctx))?;
        row.map(|v| serde_json::from_value(v).map_err(StoreError::from))
            .transpose()
    }

    async fn find_by_natural_key(
        &self,
        ctx: &TenantContext,
        natural_key: &str,
    ) -> Result<Option<TimerRecord>, StoreError> {
        let sql = format!("SELECT descriptor FROM {} WHERE natural_key = $1", table(ctx));
        Ok(self.fetch(ctx, &sql, &[natural_key]).await?.into_iter().next())
    }

    async fn find_by_module_and_kind(
        &self,
        ctx: &TenantContext,
        module_name: &str,
        kind: TimerType,
    ) -> Result<Vec<TimerRecord>, StoreError> {
        let sql = format!(
            "SELECT descriptor FROM {} WHERE module_name = $1 AND kind = $2
             ORDER BY created_date, id",
            table(ctx)
        );
        self.fetch(ctx, &sql, &[module_name, kind.as_str()]).await
    }

    async fn find_by_module_and_enabled(
        &self,
        ctx: &TenantContext,
        module_name: &str,
        enabled: bool,
    ) -> Result<Vec<TimerRecord>, StoreError> {
        let sql = format!(
            "SELECT descriptor FROM {} WHERE module_name = $1 AND enabled = $2
             ORDER BY created_date, id",
            table(ctx)
        );
        let rows = sqlx::query_scalar::<_, serde_json::Value>(&sql)
            .bind(module_name)
            .bind(enabled)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_db_error(e, ctx))?;
        decode(rows)
    }

    async fn find_all(
        &self,
        ctx: &TenantContext,
        offset: u64,
        limit: u64,
    ) -> Result<Page, StoreError> {
        let count_sql = format!("SELECT COUNT(*) FROM {}", table(ctx));
        let total = sqlx::query_scalar::<_, i64>(&count_sql)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_db_error(e, ctx))?;

        let sql = format!(
            "SELECT descriptor FROM {} ORDER BY created_date, id OFFSET $1 LIMIT $2",
            table(ctx)
        );
        let rows = sqlx::query_scalar::<_, serde_json::Value>(&sql)
            .bind(i64::try_from(offset).unwrap_or(i64::MAX))
            .bind(i64::try_from(limit).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_db_error(e, ctx))?;

        Ok(Page {
            items: decode(rows)?,
            total: total.max(0) as u64,
        })
    }

    async fn list_all(&self, ctx: &TenantContext) -> Result<Vec<TimerRecord>, StoreError> {
        let sql = format!("SELECT descriptor FROM {} ORDER BY created_date, id", table(ctx));
        self.fetch(ctx, &sql, &[]).await
    }

    async fn save(
        &self,
        ctx: &TenantContext,
        record: &TimerRecord,
    ) -> Result<TimerRecord, StoreError> {
        let row = Row::from_record(record)?;
        let sql = Self::upsert_sql(ctx);
        bind_row(&sql, row)
            .execute(&self.pool)
            .await
            .map_err(|e| map_db_error(e, ctx))?;
        Ok(record.clone())
    }

    async fn save_all(
        &self,
        ctx: &TenantContext,
        records: &[TimerRecord],
    ) -> Result<Vec<TimerRecord>, StoreError> {
        let rows = records
            .iter()
            .map(Row::from_record)
            .collect::<Result<Vec<_>, _>>()?;
        let sql = Self::upsert_sql(ctx);

        let mut tx = self.pool.begin().await.map_err(|e| map_db_error(e, ctx))?;
        for row in rows {
            bind_row(&sql, row)
                .execute(&mut *tx)
                .await
                .map_err(|e| map_db_error(e, ctx))?;
        }
        tx.commit().await.map_err(|e| map_db_error(e, ctx))?;
        Ok(records.to_vec())
    }

    async fn delete(&self, ctx: &TenantContext, id: Uuid) -> Result<bool, StoreError> {
        let sql = format!("DELETE FROM {} WHERE id = $1", table(ctx));
        let result = sqlx::query(&sql)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| map_db_error(e, ctx))?;
        Ok(result.rows_affected() > 0)
    }

    async fn tenants(&self) -> Result<Vec<String>, StoreError> {
        let schemas = sqlx::query_scalar::<_, String>(
            "SELECT table_schema::text FROM information_schema.tables
             WHERE table_name = $1 AND table_schema LIKE $2
             ORDER BY table_schema",
        )
        .bind(TABLE)
        .bind(format!("%{}", SCHEMA_SUFFIX.replace('_', "\\_")))
        .fetch_all(&self.pool)
        .await?;

        Ok(schemas
            .into_iter()
            .filter_map(|s| s.strip_suffix(SCHEMA_SUFFIX).map(str::to_string))
            .filter(|t| !t.is_empty())
            .collect())
    }

    async fn provision(&self, ctx: &TenantContext) -> Result<(), StoreError> {
        let schema = schema_name(ctx.tenant());
        let statements = [
            format!("CREATE SCHEMA IF NOT EXISTS \"{schema}\""),
            format!(
                "CREATE TABLE IF NOT EXISTS {} (
                    id UUID PRIMARY KEY,
                    natural_key TEXT NOT NULL UNIQUE,
                    module_name TEXT,
                    kind TEXT NOT NULL,
                    enabled BOOLEAN NOT NULL DEFAULT false,
                    descriptor JSONB NOT NULL,
                    created_date TIMESTAMPTZ,
                    updated_date TIMESTAMPTZ
                )",
                table(ctx)
            ),
            format!(
                "CREATE INDEX IF NOT EXISTS timer_module_kind_idx ON {} (module_name, kind)",
                table(ctx)
            ),
        ];
        for sql in &statements {
            sqlx::query(sql)
                .execute(&self.pool)
                .await
                .map_err(|e| map_db_error(e, ctx))?;
        }
        info!(tenant = %ctx.tenant(), schema = %schema, "tenant timer table provisioned");
        Ok(())
    }
}
