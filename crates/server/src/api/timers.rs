//! Timer CRUD endpoints under `/scheduler/timers`.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use tock_core::TimerRecord;

use super::{registry_error, ApiResult, Tenant};
use crate::state::AppState;

const DEFAULT_LIMIT: u64 = 10;

#[derive(Debug, Deserialize)]
pub struct ListParams {
    #[serde(default)]
    pub offset: u64,
    #[serde(default = "default_limit")]
    pub limit: u64,
}

fn default_limit() -> u64 {
    DEFAULT_LIMIT
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerList {
    pub timers: Vec<TimerRecord>,
    pub total_records: u64,
}

pub async fn timers_list(
    State(state): State<Arc<AppState>>,
    Tenant(ctx): Tenant,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<TimerList>> {
    let page = state
        .registry
        .find_all(&ctx, params.offset, params.limit)
        .await
        .map_err(|e| registry_error(&ctx, e))?;
    Ok(Json(TimerList {
        timers: page.items,
        total_records: page.total,
    }))
}

pub async fn timers_create(
    State(state): State<Arc<AppState>>,
    Tenant(ctx): Tenant,
    Json(input): Json<TimerRecord>,
) -> ApiResult<(StatusCode, Json<TimerRecord>)> {
    let saved = state
        .registry
        .create(&ctx, input)
        .await
        .map_err(|e| registry_error(&ctx, e))?;
    Ok((StatusCode::CREATED, Json(saved)))
}

pub async fn timers_get(
    State(state): State<Arc<AppState>>,
    Tenant(ctx): Tenant,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<TimerRecord>> {
    let record = state
        .registry
        .find_by_id(&ctx, id)
        .await
        .map_err(|e| registry_error(&ctx, e))?;
    Ok(Json(record))
}

pub async fn timers_update(
    State(state): State<Arc<AppState>>,
    Tenant(ctx): Tenant,
    Path(id): Path<Uuid>,
    Json(input): Json<TimerRecord>,
) -> ApiResult<Json<TimerRecord>> {
    let saved = state
        .registry
        .update(&ctx, id, input)
        .await
        .map_err(|e| registry_error(&ctx, e))?;
    Ok(Json(saved))
}

pub async fn timers_delete(
    State(state): State<Arc<AppState>>,
    Tenant(ctx): Tenant,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state
        .registry
        .delete(&ctx, id)
        .await
        .map_err(|e| registry_error(&ctx, e))?;
    Ok(StatusCode::NO_CONTENT)
}
