use std::env;

use serde::{Deserialize, Serialize};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_parse<T: std::str::FromStr>(profile: &str, key: &str, default: T) -> T {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub server: ServerConfig,
    pub postgres: PostgresConfig,
    pub callback: CallbackConfig,
    pub sync: SyncConfig,
    pub queue: QueueConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `TOCK_PROFILE`. When set (e.g. `PROD`), every key
    /// is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("TOCK_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            server: ServerConfig::from_env_profiled(p),
            postgres: PostgresConfig::from_env_profiled(p),
            callback: CallbackConfig::from_env_profiled(p),
            sync: SyncConfig::from_env_profiled(p),
            queue: QueueConfig::from_env_profiled(p),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!("  server:      {}:{}", self.server.host, self.server.port);
        tracing::info!(
            "  postgres:    host={}, db={}, configured={}",
            self.postgres.host,
            self.postgres.database,
            self.postgres.is_configured()
        );
        tracing::info!(
            "  callback:    base_url={}, timeout={}ms, token={}",
            self.callback.base_url,
            self.callback.timeout_ms,
            self.callback.token_source()
        );
        tracing::info!(
            "  sync:        table-missing retries={} delay={}ms",
            self.sync.retry_attempts,
            self.sync.retry_delay_ms
        );
        tracing::info!(
            "  queue:       poll={}ms batch={}",
            self.queue.poll_interval_ms,
            self.queue.batch_size
        );
    }
}

// ── Server ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_origin: String,
}

impl ServerConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            host: profiled_env_or(p, "HOST", "0.0.0.0"),
            port: profiled_env_parse(p, "PORT", 8081),
            cors_origin: profiled_env_or(p, "CORS_ORIGIN", "*"),
        }
    }
}

// ── PostgreSQL ────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostgresConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub ssl_mode: String,
    pub max_connections: u32,
}

impl PostgresConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            host: profiled_env_or(p, "PG_HOST", "localhost"),
            port: profiled_env_parse(p, "PG_PORT", 5432),
            database: profiled_env_or(p, "PG_DATABASE", "tock"),
            username: profiled_env_opt(p, "PG_USERNAME"),
            password: profiled_env_opt(p, "PG_PASSWORD"),
            ssl_mode: profiled_env_or(p, "PG_SSL_MODE", "prefer"),
            max_connections: profiled_env_parse(p, "PG_MAX_CONNECTIONS", 10),
        }
    }

    /// Login role; `postgres` when unset.
    pub fn username_or_default(&self) -> &str {
        self.username.as_deref().unwrap_or("postgres")
    }

    pub fn is_configured(&self) -> bool {
        self.username.is_some()
    }
}

// ── Callback delivery ─────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallbackConfig {
    /// Gateway base URL that timer paths are resolved against.
    pub base_url: String,
    pub timeout_ms: u64,
    /// Impersonation endpoint; when unset `static_token` is used.
    pub token_url: Option<String>,
    pub static_token: Option<String>,
}

impl CallbackConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            base_url: profiled_env_or(p, "CALLBACK_BASE_URL", "http://localhost:9130"),
            timeout_ms: profiled_env_parse(p, "CALLBACK_TIMEOUT_MS", 30_000),
            token_url: profiled_env_opt(p, "TOKEN_URL"),
            static_token: profiled_env_opt(p, "STATIC_TOKEN"),
        }
    }

    /// Redacted token source label.
    pub fn token_source(&self) -> &'static str {
        match (&self.token_url, &self.static_token) {
            (Some(_), _) => "impersonation",
            (None, Some(_)) => "static",
            (None, None) => "none",
        }
    }
}

// ── Module sync ───────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Attempts for module-resource events that hit a missing tenant table.
    pub retry_attempts: u32,
    pub retry_delay_ms: u64,
}

impl SyncConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            retry_attempts: profiled_env_parse(p, "SYNC_RETRY_ATTEMPTS", 5),
            retry_delay_ms: profiled_env_parse(p, "SYNC_RETRY_DELAY_MS", 2_000),
        }
    }
}

// ── Event queue ───────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    pub poll_interval_ms: u64,
    pub batch_size: u32,
}

impl QueueConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            poll_interval_ms: profiled_env_parse(p, "QUEUE_POLL_INTERVAL_MS", 500),
            batch_size: profiled_env_parse(p, "QUEUE_BATCH_SIZE", 10),
        }
    }
}
