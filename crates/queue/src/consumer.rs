//! Queue consumer trait and types.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::QueueError;

/// A raw message received from a queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueMessage {
    /// Unique message identifier from the queue provider.
    pub id: String,
    /// Raw message body (JSON string).
    pub body: String,
    /// Provider-specific handle for ack/nack.
    pub receipt_handle: String,
    /// When the message was enqueued.
    pub timestamp: DateTime<Utc>,
    /// Number of times this message has been received.
    pub attempt_count: u32,
}

/// Health status of a queue connection.
#[derive(Debug, Clone, Serialize)]
pub struct QueueHealth {
    pub connected: bool,
    /// Messages waiting plus messages in flight.
    pub approximate_message_count: Option<u64>,
    pub provider: String,
}

impl fmt::Display for QueueHealth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "QueueHealth {{ connected: {}, messages: {:?}, provider: {} }}",
            self.connected, self.approximate_message_count, self.provider
        )
    }
}

/// Trait for queue consumer backends.
///
/// Delivery is at-least-once: a message that is neither acked nor nacked may
/// be redelivered, and a nacked message always is.
#[async_trait]
pub trait QueueConsumer: Send + Sync {
    /// Poll up to `max_messages`. Returns an empty vec if none are available.
    async fn poll_batch(&self, max_messages: u32) -> Result<Vec<QueueMessage>, QueueError>;

    /// Acknowledge successful processing; the message is gone for good.
    async fn ack(&self, receipt_handle: &str) -> Result<(), QueueError>;

    /// Return the message to the queue for redelivery.
    async fn nack(&self, receipt_handle: &str) -> Result<(), QueueError>;

    async fn health_check(&self) -> Result<QueueHealth, QueueError>;
}

#[async_trait]
impl<T: QueueConsumer + ?Sized> QueueConsumer for Arc<T> {
    async fn poll_batch(&self, max_messages: u32) -> Result<Vec<QueueMessage>, QueueError> {
        (**self).poll_batch(max_messages).await
    }

    async fn ack(&self, receipt_handle: &str) -> Result<(), QueueError> {
        (**self).ack(receipt_handle).await
    }

    async fn nack(&self, receipt_handle: &str) -> Result<(), QueueError> {
        (**self).nack(receipt_handle).await
    }

    async fn health_check(&self) -> Result<QueueHealth, QueueError> {
        (**self).health_check().await
    }
}
