//! Event listener loop.
//!
//! Polls the consumer, applies each event through the module sync
//! coordinator, and settles every message:
//! - success: ack
//! - unparseable body or event content the registry rejects: ack and log
//!   (redelivery cannot fix it)
//! - missing tenant table, failing store or engine: nack while the message
//!   has been delivered fewer than the configured attempts, then ack and log

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use tock_core::config::{QueueConfig, SyncConfig};
use tock_registry::{ModuleSyncCoordinator, SyncError};

use crate::consumer::{QueueConsumer, QueueMessage};
use crate::error::QueueError;
use crate::parser::{parse_message, TimerEvent};

/// Outcome counts for one polled batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchStats {
    pub received: usize,
    pub acked: usize,
    pub nacked: usize,
}

pub struct EventListener {
    consumer: Arc<dyn QueueConsumer>,
    sync: ModuleSyncCoordinator,
    queue: QueueConfig,
    retry: SyncConfig,
}

enum Settlement {
    Ack,
    Nack,
}

impl EventListener {
    pub fn new(
        consumer: Arc<dyn QueueConsumer>,
        sync: ModuleSyncCoordinator,
        queue: QueueConfig,
        retry: SyncConfig,
    ) -> Self {
        Self {
            consumer,
            sync,
            queue,
            retry,
        }
    }

    /// Run until the task is aborted.
    pub async fn run(self) {
        let poll_interval = Duration::from_millis(self.queue.poll_interval_ms);
        let retry_delay = Duration::from_millis(self.retry.retry_delay_ms);
        info!(
            batch_size = self.queue.batch_size,
            poll_interval_ms = self.queue.poll_interval_ms,
            retry_attempts = self.retry.retry_attempts,
            "starting event listener"
        );

        let mut consecutive_errors: u32 = 0;
        loop {
            match self.process_batch().await {
                Ok(stats) => {
                    consecutive_errors = 0;
                    if stats.received == 0 {
                        tokio::time::sleep(poll_interval).await;
                    } else if stats.nacked > 0 {
                        // Give a provisioning tenant time before redelivery.
                        tokio::time::sleep(retry_delay.max(poll_interval)).await;
                    }
                }
                Err(e) => {
                    consecutive_errors += 1;
                    warn!(error = %e, consecutive_errors, "queue poll failed");
                    // Exponential backoff on errors (capped at 30s).
                    let backoff = poll_interval * 2u32.pow(consecutive_errors.min(5));
                    tokio::time::sleep(backoff.min(Duration::from_secs(30))).await;
                }
            }
        }
    }

    /// Poll once and settle every received message.
    pub async fn process_batch(&self) -> Result<BatchStats, QueueError> {
        let messages = self.consumer.poll_batch(self.queue.batch_size).await?;
        let mut stats = BatchStats {
            received: messages.len(),
            ..Default::default()
        };

        for msg in &messages {
            let settled = match self.handle(msg).await {
                Settlement::Ack => {
                    stats.acked += 1;
                    self.consumer.ack(&msg.receipt_handle).await
                }
                Settlement::Nack => {
                    stats.nacked += 1;
                    self.consumer.nack(&msg.receipt_handle).await
                }
            };
            if let Err(e) = settled {
                warn!(message_id = %msg.id, error = %e, "failed to settle message");
            }
        }

        if stats.received > 0 {
            info!(
                received = stats.received,
                acked = stats.acked,
                nacked = stats.nacked,
                "processed event batch"
            );
        }
        Ok(stats)
    }

    async fn handle(&self, msg: &QueueMessage) -> Settlement {
        let event = match parse_message(msg) {
            Ok(event) => event,
            Err(e) => {
                error!(message_id = %msg.id, error = %e, "dropping unparseable event");
                return Settlement::Ack;
            }
        };

        let err = match self.apply(&event).await {
            Ok(affected) => {
                info!(
                    message_id = %msg.id,
                    tenant = %event.tenant(),
                    topic = event.topic(),
                    affected,
                    "event applied"
                );
                return Settlement::Ack;
            }
            Err(err) => err,
        };

        if !err.is_retryable() {
            error!(
                message_id = %msg.id,
                tenant = %event.tenant(),
                topic = event.topic(),
                error = %err,
                "dropping event rejected by the registry"
            );
            return Settlement::Ack;
        }

        if msg.attempt_count < self.retry.retry_attempts {
            warn!(
                message_id = %msg.id,
                tenant = %event.tenant(),
                attempt = msg.attempt_count,
                attempts = self.retry.retry_attempts,
                table_missing = err.is_table_missing(),
                error = %err,
                "event failed, returning to queue"
            );
            Settlement::Nack
        } else {
            error!(
                message_id = %msg.id,
                tenant = %event.tenant(),
                topic = event.topic(),
                attempts = msg.attempt_count,
                error = %err,
                "event failed on every attempt, dropping"
            );
            Settlement::Ack
        }
    }

    async fn apply(&self, event: &TimerEvent) -> Result<usize, SyncError> {
        match event {
            TimerEvent::Entitlement(e) => self.sync.handle_entitlement_event(e).await,
            TimerEvent::ModuleResource(e) => self.sync.handle_resource_event(e).await,
        }
    }
}
