//! HTTP handlers.
//!
//! Every tenant-scoped route reads the tenant from `x-tenant` and the acting
//! user from `x-user-id`.

mod events;
mod health;
mod tenant;
mod timers;

pub use events::events_publish;
pub use health::health;
pub use tenant::{tenant_init, tenant_teardown};
pub use timers::{timers_create, timers_delete, timers_get, timers_list, timers_update};

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use uuid::Uuid;

use tock_core::TenantContext;
use tock_registry::RegistryError;

pub const TENANT_HEADER: &str = "x-tenant";
pub const USER_ID_HEADER: &str = "x-user-id";
pub const REQUEST_ID_HEADER: &str = "x-request-id";

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

// ── Type alias ──────────────────────────────────────────────────

pub(crate) type ApiError = (StatusCode, Json<ErrorResponse>);
pub(crate) type ApiResult<T> = Result<T, ApiError>;

// ── Helpers ─────────────────────────────────────────────────────

pub(crate) fn bad_request(msg: impl Into<String>) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse { error: msg.into() }),
    )
}

pub(crate) fn registry_error(ctx: &TenantContext, e: RegistryError) -> ApiError {
    let status = StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let error = if e.is_table_missing() {
        format!("tenant {} is not provisioned", ctx.tenant())
    } else {
        e.to_string()
    };
    if status.is_server_error() {
        tracing::error!(tenant = %ctx.tenant(), error = %e, "request failed");
    }
    (status, Json(ErrorResponse { error }))
}

// ── Tenant extractor ────────────────────────────────────────────

/// Tenant context built from request headers.
pub struct Tenant(pub TenantContext);

impl<S: Send + Sync> FromRequestParts<S> for Tenant {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
        };

        let tenant = header(TENANT_HEADER)
            .ok_or_else(|| bad_request(format!("missing {TENANT_HEADER} header")))?;
        let mut ctx = TenantContext::new(tenant).map_err(|e| bad_request(e.to_string()))?;

        if let Some(raw) = header(USER_ID_HEADER) {
            let user_id = Uuid::parse_str(raw)
                .map_err(|_| bad_request(format!("invalid {USER_ID_HEADER} header: {raw}")))?;
            ctx = ctx.with_user(Some(user_id));
        }
        if let Some(request_id) = header(REQUEST_ID_HEADER) {
            ctx = ctx.with_request_id(request_id);
        }
        Ok(Tenant(ctx))
    }
}
