//! Process wiring.
//!
//! store → callback executor → local engine → trigger coordinator → registry
//! → module sync → event listener (fed by the in-process queue).

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{info, warn};

use tock_core::Config;
use tock_notify::{token_provider_from_config, CallbackExecutor};
use tock_queue::{EventListener, MemoryQueue};
use tock_registry::{ModuleSyncCoordinator, TimerRegistry};
use tock_scheduler::{LocalEngine, TriggerCoordinator};
use tock_storage::{InMemoryTimerStore, PgTimerStore, TimerStore};

use crate::state::AppState;

/// Which timer store backs the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum StoreChoice {
    /// PostgreSQL when configured, else in-memory.
    Auto,
    Memory,
    Postgres,
}

pub struct App {
    pub state: Arc<AppState>,
    listener: Option<EventListener>,
}

impl App {
    /// Open the configured store and wire everything on top of it.
    pub async fn build(config: &Config, choice: StoreChoice) -> anyhow::Result<Self> {
        let use_pg = match choice {
            StoreChoice::Postgres => true,
            StoreChoice::Memory => false,
            StoreChoice::Auto => config.postgres.is_configured(),
        };

        if use_pg {
            let store = PgTimerStore::connect(&config.postgres).await?;
            info!(host = %config.postgres.host, database = %config.postgres.database, "using PostgreSQL timer store");
            Self::with_store(Arc::new(store), "postgres", config)
        } else {
            warn!("PostgreSQL not configured, timers are kept in memory and lost on restart");
            Self::with_store(Arc::new(InMemoryTimerStore::new()), "memory", config)
        }
    }

    pub fn with_store(
        store: Arc<dyn TimerStore>,
        store_kind: &'static str,
        config: &Config,
    ) -> anyhow::Result<Self> {
        let tokens = token_provider_from_config(&config.callback)?;
        let executor = CallbackExecutor::new(store.clone(), tokens, &config.callback)?;
        let engine = LocalEngine::new(Arc::new(executor));

        let coordinator = TriggerCoordinator::new(Arc::new(engine.clone()));
        let registry = Arc::new(TimerRegistry::new(store, coordinator));
        let queue = Arc::new(MemoryQueue::new());

        let listener = EventListener::new(
            queue.clone(),
            ModuleSyncCoordinator::new(registry.clone()),
            config.queue.clone(),
            config.sync.clone(),
        );

        Ok(Self {
            state: Arc::new(AppState {
                registry,
                queue,
                engine,
                store_kind,
            }),
            listener: Some(listener),
        })
    }

    /// Re-register triggers for every provisioned tenant.
    pub async fn rebuild_triggers(&self) -> anyhow::Result<usize> {
        let registered = self.state.registry.rebuild_all().await?;
        info!(registered, "engine triggers rebuilt from store");
        Ok(registered)
    }

    /// Start consuming the event queue. Only the first call spawns a task.
    pub fn spawn_listener(&mut self) -> Option<JoinHandle<()>> {
        self.listener.take().map(|listener| tokio::spawn(listener.run()))
    }
}
