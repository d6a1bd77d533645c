//! Bearer credentials for outbound callbacks.
//!
//! A fired timer calls back into its module as the user who last wrote it,
//! inside the timer's tenant. [`HttpTokenProvider`] asks an identity service
//! for such a token; [`StaticTokenProvider`] hands out a fixed one (or none).

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use tock_core::config::CallbackConfig;

use crate::error::TokenError;

#[async_trait::async_trait]
pub trait TokenProvider: Send + Sync {
    /// Token for `tenant` acting as `user_id`. `Ok(None)` means call unauthenticated.
    async fn token(&self, tenant: &str, user_id: Option<Uuid>) -> Result<Option<String>, TokenError>;
}

#[async_trait::async_trait]
impl<T: TokenProvider + ?Sized> TokenProvider for Arc<T> {
    async fn token(&self, tenant: &str, user_id: Option<Uuid>) -> Result<Option<String>, TokenError> {
        (**self).token(tenant, user_id).await
    }
}

// ── Static ────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct StaticTokenProvider {
    token: Option<String>,
}

impl StaticTokenProvider {
    pub fn new(token: Option<String>) -> Self {
        Self { token }
    }
}

#[async_trait::async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn token(&self, _tenant: &str, _user_id: Option<Uuid>) -> Result<Option<String>, TokenError> {
        Ok(self.token.clone())
    }
}

// ── Impersonation service ─────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TokenRequest<'a> {
    tenant: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: Option<String>,
}

/// Fetches impersonation tokens by POSTing `{tenant, userId}` to a token endpoint
/// that answers `{"token": "..."}`.
#[derive(Debug, Clone)]
pub struct HttpTokenProvider {
    url: String,
    client: reqwest::Client,
}

impl HttpTokenProvider {
    pub fn new(url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            url: url.into(),
            client,
        }
    }
}

#[async_trait::async_trait]
impl TokenProvider for HttpTokenProvider {
    async fn token(&self, tenant: &str, user_id: Option<Uuid>) -> Result<Option<String>, TokenError> {
        let response = self
            .client
            .post(&self.url)
            .header("x-tenant", tenant)
            .json(&TokenRequest { tenant, user_id })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TokenError::Rejected {
                status: status.as_u16(),
            });
        }

        let body: TokenResponse = response.json().await?;
        let token = body
            .token
            .filter(|t| !t.is_empty())
            .ok_or(TokenError::MissingToken)?;
        debug!(tenant, user_id = ?user_id, "obtained impersonation token");
        Ok(Some(token))
    }
}

/// Pick the token source the callback config describes: the impersonation
/// endpoint when set, else the static token (possibly none).
pub fn token_provider_from_config(config: &CallbackConfig) -> Result<Arc<dyn TokenProvider>, TokenError> {
    match &config.token_url {
        Some(url) => {
            let client = reqwest::Client::builder()
                .timeout(Duration::from_millis(config.timeout_ms))
                .build()?;
            Ok(Arc::new(HttpTokenProvider::new(url.clone(), client)))
        }
        None => Ok(Arc::new(StaticTokenProvider::new(config.static_token.clone()))),
    }
}
