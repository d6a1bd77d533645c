//! Event consumption for module lifecycle and entitlement events.
//!
//! This crate provides:
//! - [`QueueConsumer`]: poll/ack/nack over a message source
//! - [`MemoryQueue`]: in-process queue fed by the HTTP ingress
//! - [`parse_message`]: message body to [`TimerEvent`]
//! - [`EventListener`]: the loop that applies events through module sync

pub mod consumer;
pub mod error;
pub mod listener;
pub mod memory;
pub mod parser;

pub use consumer::{QueueConsumer, QueueHealth, QueueMessage};
pub use error::QueueError;
pub use listener::{BatchStats, EventListener};
pub use memory::MemoryQueue;
pub use parser::{parse_message, TimerEvent};
