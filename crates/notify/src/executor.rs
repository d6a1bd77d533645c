//! Callback executor: the engine's job handler.
//!
//! A fire carries only the tenant, the writing user and the timer id. The
//! record is re-read from the store on every fire so that a timer deleted or
//! edited since registration is honoured. Failures are logged and never
//! retried; the next fire is the retry.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};
use uuid::Uuid;

use tock_core::config::CallbackConfig;
use tock_core::TenantContext;
use tock_scheduler::{JobData, JobHandler};
use tock_storage::TimerStore;

use crate::error::CallbackError;
use crate::method::HttpMethod;
use crate::token::TokenProvider;

pub const TENANT_HEADER: &str = "x-tenant";
pub const USER_ID_HEADER: &str = "x-user-id";
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// What happened to one fire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackOutcome {
    /// The target answered 2xx.
    Delivered { status: u16 },
    /// The target answered, but not with 2xx.
    Rejected { status: u16 },
    /// The timer no longer exists.
    TimerMissing,
    /// The timer declares a method outside [`HttpMethod`].
    UnsupportedMethod(String),
    /// The routing entry has neither path nor pattern.
    NoPath,
}

pub struct CallbackExecutor {
    store: Arc<dyn TimerStore>,
    tokens: Arc<dyn TokenProvider>,
    client: reqwest::Client,
    base_url: String,
}

impl CallbackExecutor {
    pub fn new(
        store: Arc<dyn TimerStore>,
        tokens: Arc<dyn TokenProvider>,
        config: &CallbackConfig,
    ) -> Result<Self, CallbackError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;
        Ok(Self {
            store,
            tokens,
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Perform the callback for one fired job.
    pub async fn execute(&self, job: &JobData) -> Result<CallbackOutcome, CallbackError> {
        let ctx = TenantContext::new(job.tenant.as_str())
            .map_err(|e| CallbackError::Config(e.to_string()))?
            .with_user(job.user_id);

        let Some(record) = self.store.find_by_id(&ctx, job.timer_id).await? else {
            info!(tenant = %job.tenant, timer_id = %job.timer_id, "timer no longer exists, skipping fire");
            return Ok(CallbackOutcome::TimerMissing);
        };
        let Some(entry) = record.routing_entry.as_ref() else {
            return Ok(CallbackOutcome::NoPath);
        };

        let method = match HttpMethod::from_declared(&entry.methods) {
            Ok(method) => method,
            Err(declared) => {
                warn!(tenant = %job.tenant, timer_id = %job.timer_id, method = %declared, "unsupported HTTP method, skipping fire");
                return Ok(CallbackOutcome::UnsupportedMethod(declared));
            }
        };
        let Some(path) = entry.static_path() else {
            warn!(tenant = %job.tenant, timer_id = %job.timer_id, "timer has no path, skipping fire");
            return Ok(CallbackOutcome::NoPath);
        };

        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        let request_id = Uuid::new_v4().to_string();

        let mut request = self
            .client
            .request(method.as_reqwest(), &url)
            .header(TENANT_HEADER, job.tenant.as_str())
            .header(REQUEST_ID_HEADER, request_id.as_str());
        if let Some(user_id) = job.user_id {
            request = request.header(USER_ID_HEADER, user_id.to_string());
        }
        if let Some(token) = self.tokens.token(&job.tenant, job.user_id).await? {
            request = request.bearer_auth(token);
        }

        debug!(tenant = %job.tenant, timer_id = %job.timer_id, %method, %url, "issuing timer callback");
        let response = request.send().await?;
        let status = response.status();

        if status.is_success() {
            info!(
                tenant = %job.tenant,
                timer_id = %job.timer_id,
                %method,
                %url,
                status = status.as_u16(),
                request_id = %request_id,
                "timer callback delivered"
            );
            Ok(CallbackOutcome::Delivered {
                status: status.as_u16(),
            })
        } else {
            let body = response.text().await.unwrap_or_default();
            warn!(
                tenant = %job.tenant,
                timer_id = %job.timer_id,
                %method,
                %url,
                status = status.as_u16(),
                request_id = %request_id,
                body = %body,
                "timer callback returned non-success status"
            );
            Ok(CallbackOutcome::Rejected {
                status: status.as_u16(),
            })
        }
    }
}

#[async_trait::async_trait]
impl JobHandler for CallbackExecutor {
    async fn fire(&self, job: JobData) {
        if let Err(e) = self.execute(&job).await {
            error!(tenant = %job.tenant, timer_id = %job.timer_id, error = %e, "timer callback failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use axum::extract::State;
    use axum::http::{HeaderMap, Method, StatusCode, Uri};
    use axum::Router;
    use tock_core::{RoutingEntry, TimerRecord, TimerType};
    use tock_storage::InMemoryTimerStore;

    use super::*;
    use crate::error::TokenError;

    #[derive(Debug, Clone)]
    struct Seen {
        method: Method,
        path: String,
        headers: HeaderMap,
    }

    type Log = Arc<Mutex<Vec<Seen>>>;

    async fn record(State(log): State<Log>, method: Method, uri: Uri, headers: HeaderMap) -> StatusCode {
        let status = if uri.path() == "/broken" {
            StatusCode::INTERNAL_SERVER_ERROR
        } else {
            StatusCode::NO_CONTENT
        };
        log.lock().unwrap().push(Seen {
            method,
            path: uri.path().to_string(),
            headers,
        });
        status
    }

    async fn target() -> (String, Log) {
        let log: Log = Arc::default();
        let router = Router::new().fallback(record).with_state(log.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        (format!("http://{addr}"), log)
    }

    /// Token fake that remembers who asked.
    #[derive(Default)]
    struct RecordingTokens {
        asked: Mutex<Vec<(String, Option<Uuid>)>>,
    }

    #[async_trait::async_trait]
    impl TokenProvider for RecordingTokens {
        async fn token(&self, tenant: &str, user_id: Option<Uuid>) -> Result<Option<String>, TokenError> {
            self.asked.lock().unwrap().push((tenant.to_string(), user_id));
            Ok(Some(format!("token-{tenant}")))
        }
    }

    struct Harness {
        store: Arc<InMemoryTimerStore>,
        tokens: Arc<RecordingTokens>,
        executor: CallbackExecutor,
        log: Log,
    }

    async fn harness() -> Harness {
        let (base_url, log) = target().await;
        let store = Arc::new(InMemoryTimerStore::new());
        store.provision(&ctx()).await.unwrap();
        let tokens = Arc::new(RecordingTokens::default());
        let executor = CallbackExecutor::new(
            store.clone(),
            tokens.clone(),
            &CallbackConfig {
                base_url,
                timeout_ms: 2_000,
                token_url: None,
                static_token: None,
            },
        )
        .unwrap();
        Harness {
            store,
            tokens,
            executor,
            log,
        }
    }

    fn ctx() -> TenantContext {
        TenantContext::new("diku").unwrap()
    }

    async fn saved(store: &InMemoryTimerStore, methods: &[&str], pattern: &str, path: Option<&str>) -> Uuid {
        let record = TimerRecord {
            id: Some(Uuid::new_v4()),
            kind: Some(TimerType::User),
            module_name: Some("mod-foo".to_string()),
            enabled: true,
            routing_entry: Some(RoutingEntry {
                methods: methods.iter().map(|m| m.to_string()).collect(),
                path_pattern: Some(pattern.to_string()),
                path: path.map(str::to_string),
                interval: Some(tock_core::Interval::new("1", tock_core::TimeUnit::Minute)),
                schedule: None,
            }),
            ..Default::default()
        };
        store.save(&ctx(), &record).await.unwrap().id.unwrap()
    }

    fn job(timer_id: Uuid, user_id: Option<Uuid>) -> JobData {
        JobData {
            tenant: "diku".to_string(),
            user_id,
            timer_id,
        }
    }

    #[tokio::test]
    async fn delivers_with_identity_headers() {
        let h = harness().await;
        let id = saved(&h.store, &["PUT"], "/foo/{id}", Some("/foo/expire")).await;
        let user = Uuid::new_v4();

        let outcome = h.executor.execute(&job(id, Some(user))).await.unwrap();
        assert_eq!(outcome, CallbackOutcome::Delivered { status: 204 });

        let seen = h.log.lock().unwrap().clone();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].method, Method::PUT);
        assert_eq!(seen[0].path, "/foo/expire");
        assert_eq!(seen[0].headers[TENANT_HEADER], "diku");
        assert_eq!(seen[0].headers[USER_ID_HEADER], user.to_string().as_str());
        assert!(seen[0].headers.contains_key(REQUEST_ID_HEADER));
        assert_eq!(seen[0].headers["authorization"], "Bearer token-diku");
        assert_eq!(*h.tokens.asked.lock().unwrap(), vec![("diku".to_string(), Some(user))]);
    }

    #[tokio::test]
    async fn defaults_to_post_and_pattern_path() {
        let h = harness().await;
        let id = saved(&h.store, &[], "/foo/expire", None).await;

        h.executor.execute(&job(id, None)).await.unwrap();
        let seen = h.log.lock().unwrap().clone();
        assert_eq!(seen[0].method, Method::POST);
        assert_eq!(seen[0].path, "/foo/expire");
        assert!(!seen[0].headers.contains_key(USER_ID_HEADER));
    }

    #[tokio::test]
    async fn missing_timer_is_skipped() {
        let h = harness().await;
        let outcome = h.executor.execute(&job(Uuid::new_v4(), None)).await.unwrap();
        assert_eq!(outcome, CallbackOutcome::TimerMissing);
        assert!(h.log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unsupported_method_is_skipped() {
        let h = harness().await;
        let id = saved(&h.store, &["OPTIONS"], "/foo/expire", None).await;
        let outcome = h.executor.execute(&job(id, None)).await.unwrap();
        assert_eq!(outcome, CallbackOutcome::UnsupportedMethod("OPTIONS".to_string()));
        assert!(h.log.lock().unwrap().is_empty());
        assert!(h.tokens.asked.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn non_success_is_reported_not_retried() {
        let h = harness().await;
        let id = saved(&h.store, &["POST"], "/broken", None).await;
        let outcome = h.executor.execute(&job(id, None)).await.unwrap();
        assert_eq!(outcome, CallbackOutcome::Rejected { status: 500 });
        assert_eq!(h.log.lock().unwrap().len(), 1);
    }
}
