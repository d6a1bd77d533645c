//! Tenant lifecycle endpoints.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use tracing::info;

use super::{registry_error, ApiResult, Tenant};
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantInitResponse {
    pub tenant: String,
    pub registered_triggers: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantTeardownResponse {
    pub tenant: String,
    pub deleted_timers: usize,
}

/// Provision the tenant's timer table and register triggers for stored timers.
pub async fn tenant_init(
    State(state): State<Arc<AppState>>,
    Tenant(ctx): Tenant,
) -> ApiResult<(StatusCode, Json<TenantInitResponse>)> {
    let registered = state
        .registry
        .init_tenant(&ctx)
        .await
        .map_err(|e| registry_error(&ctx, e))?;
    info!(tenant = %ctx.tenant(), registered, "tenant initialised");
    Ok((
        StatusCode::CREATED,
        Json(TenantInitResponse {
            tenant: ctx.tenant().to_string(),
            registered_triggers: registered,
        }),
    ))
}

/// Delete every timer of the tenant together with its trigger.
pub async fn tenant_teardown(
    State(state): State<Arc<AppState>>,
    Tenant(ctx): Tenant,
) -> ApiResult<Json<TenantTeardownResponse>> {
    let deleted = state
        .registry
        .delete_all(&ctx)
        .await
        .map_err(|e| registry_error(&ctx, e))?;
    info!(tenant = %ctx.tenant(), deleted, "tenant timers removed");
    Ok(Json(TenantTeardownResponse {
        tenant: ctx.tenant().to_string(),
        deleted_timers: deleted,
    }))
}
