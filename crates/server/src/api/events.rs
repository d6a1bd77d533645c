use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use tracing::{debug, error};

use tock_queue::TimerEvent;

use super::{ApiError, ApiResult, ErrorResponse};
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishResponse {
    pub message_id: String,
}

/// Accept a module-resource or entitlement event for asynchronous processing.
pub async fn events_publish(
    State(state): State<Arc<AppState>>,
    Json(event): Json<TimerEvent>,
) -> ApiResult<(StatusCode, Json<PublishResponse>)> {
    let body = serde_json::to_string(&event).map_err(|e| -> ApiError {
        error!(error = %e, "failed to re-encode event");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse { error: e.to_string() }),
        )
    })?;
    let message_id = state.queue.publish(body).await;
    debug!(%message_id, tenant = %event.tenant(), topic = event.topic(), "event accepted");
    Ok((StatusCode::ACCEPTED, Json(PublishResponse { message_id })))
}
