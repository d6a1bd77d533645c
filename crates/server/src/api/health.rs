use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use tock_queue::QueueConsumer;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub store: &'static str,
    pub scheduled_jobs: usize,
    pub queue: String,
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let queue = match state.queue.health_check().await {
        Ok(h) => h.to_string(),
        Err(e) => format!("error: {e}"),
    };
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        store: state.store_kind,
        scheduled_jobs: state.engine.job_count().await,
        queue,
    })
}
