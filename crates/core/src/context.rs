//! Per-request tenant scope, passed explicitly through every layer.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;

/// Tenant and actor for the duration of one API call, event, or trigger fire.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TenantContext {
    tenant: String,
    user_id: Option<Uuid>,
    request_id: Option<String>,
}

impl TenantContext {
    /// Tenant names end up in schema identifiers, so only `[A-Za-z0-9_]` is accepted.
    pub fn new(tenant: impl Into<String>) -> Result<Self, CoreError> {
        let tenant = tenant.into();
        if tenant.is_empty()
            || !tenant
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(CoreError::InvalidTenant(tenant));
        }
        Ok(Self {
            tenant,
            user_id: None,
            request_id: None,
        })
    }

    pub fn with_user(mut self, user_id: Option<Uuid>) -> Self {
        self.user_id = user_id;
        self
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn tenant(&self) -> &str {
        &self.tenant
    }

    pub fn user_id(&self) -> Option<Uuid> {
        self.user_id
    }

    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }
}
