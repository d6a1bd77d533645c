use std::sync::Arc;

use tock_queue::MemoryQueue;
use tock_registry::TimerRegistry;
use tock_scheduler::LocalEngine;

pub struct AppState {
    pub registry: Arc<TimerRegistry>,
    pub queue: Arc<MemoryQueue>,
    pub engine: LocalEngine,
    /// Backend label for `/health`.
    pub store_kind: &'static str,
}
