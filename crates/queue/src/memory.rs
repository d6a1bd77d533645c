//! In-process queue.
//!
//! Messages move from `ready` to `in_flight` when polled and leave for good
//! on ack. A nack puts them back at the end of `ready`.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use crate::consumer::{QueueConsumer, QueueHealth, QueueMessage};
use crate::error::QueueError;

#[derive(Default)]
struct State {
    ready: VecDeque<QueueMessage>,
    in_flight: HashMap<String, QueueMessage>,
}

#[derive(Default)]
pub struct MemoryQueue {
    state: Mutex<State>,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a JSON body. Returns the message id.
    pub async fn publish(&self, body: impl Into<String>) -> String {
        let id = Uuid::new_v4().to_string();
        let message = QueueMessage {
            id: id.clone(),
            body: body.into(),
            receipt_handle: String::new(),
            timestamp: Utc::now(),
            attempt_count: 0,
        };
        self.state.lock().await.ready.push_back(message);
        debug!(message_id = %id, "message enqueued");
        id
    }

    pub async fn depth(&self) -> (usize, usize) {
        let state = self.state.lock().await;
        (state.ready.len(), state.in_flight.len())
    }
}

#[async_trait]
impl QueueConsumer for MemoryQueue {
    async fn poll_batch(&self, max_messages: u32) -> Result<Vec<QueueMessage>, QueueError> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        let n = (max_messages as usize).min(state.ready.len());
        let mut batch = Vec::with_capacity(n);
        for mut message in state.ready.drain(..n) {
            message.attempt_count += 1;
            message.receipt_handle = Uuid::new_v4().to_string();
            state
                .in_flight
                .insert(message.receipt_handle.clone(), message.clone());
            batch.push(message);
        }
        Ok(batch)
    }

    async fn ack(&self, receipt_handle: &str) -> Result<(), QueueError> {
        self.state
            .lock()
            .await
            .in_flight
            .remove(receipt_handle)
            .map(|_| ())
            .ok_or_else(|| QueueError::UnknownReceipt(receipt_handle.to_string()))
    }

    async fn nack(&self, receipt_handle: &str) -> Result<(), QueueError> {
        let mut state = self.state.lock().await;
        let message = state
            .in_flight
            .remove(receipt_handle)
            .ok_or_else(|| QueueError::UnknownReceipt(receipt_handle.to_string()))?;
        state.ready.push_back(message);
        Ok(())
    }

    async fn health_check(&self) -> Result<QueueHealth, QueueError> {
        let (ready, in_flight) = self.depth().await;
        Ok(QueueHealth {
            connected: true,
            approximate_message_count: Some((ready + in_flight) as u64),
            provider: "memory".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn poll_ack_nack_cycle() {
        let queue = MemoryQueue::new();
        queue.publish("{}").await;
        queue.publish("{}").await;
        queue.publish("{}").await;

        let batch = queue.poll_batch(2).await.unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(queue.depth().await, (1, 2));

        queue.ack(&batch[0].receipt_handle).await.unwrap();
        queue.nack(&batch[1].receipt_handle).await.unwrap();
        assert_eq!(queue.depth().await, (2, 0));

        let rest = queue.poll_batch(10).await.unwrap();
        assert_eq!(rest.len(), 2);
        let redelivered = rest.iter().find(|m| m.id == batch[1].id).unwrap();
        assert_eq!(redelivered.attempt_count, 2);
    }

    #[tokio::test]
    async fn unknown_receipts_are_errors() {
        let queue = MemoryQueue::new();
        assert!(matches!(
            queue.ack("nope").await,
            Err(QueueError::UnknownReceipt(_))
        ));
        assert!(queue.nack("nope").await.is_err());
        assert_eq!(
            queue.health_check().await.unwrap().approximate_message_count,
            Some(0)
        );
    }
}
