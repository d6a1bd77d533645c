//! HTTP router construction.

use std::sync::Arc;

use axum::http::HeaderValue;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tracing::warn;

use crate::api;
use crate::state::AppState;

/// Build the complete application router with all routes and middleware.
pub fn build_router(state: Arc<AppState>, cors_origin: &str) -> Router {
    Router::new()
        .route("/health", get(api::health))
        .route(
            "/scheduler/timers",
            get(api::timers_list).post(api::timers_create),
        )
        .route(
            "/scheduler/timers/{id}",
            get(api::timers_get)
                .put(api::timers_update)
                .delete(api::timers_delete),
        )
        .route(
            "/tenant",
            post(api::tenant_init).delete(api::tenant_teardown),
        )
        .route("/events", post(api::events_publish))
        .layer(cors_layer(cors_origin))
        .with_state(state)
}

fn cors_layer(origin: &str) -> CorsLayer {
    if origin == "*" {
        return CorsLayer::permissive();
    }
    match origin.parse::<HeaderValue>() {
        Ok(value) => CorsLayer::new()
            .allow_origin(value)
            .allow_methods(Any)
            .allow_headers(Any),
        Err(e) => {
            warn!(origin, error = %e, "invalid CORS origin, falling back to permissive");
            CorsLayer::permissive()
        }
    }
}
