//! Parse queue message bodies into timer events.
//!
//! Bodies are JSON objects carrying a `topic` discriminator next to the
//! event's own fields:
//!
//! ```json
//! {"topic": "ENTITLEMENT", "type": "REVOKE", "moduleId": "mod-foo-1.0.0", "tenant": "diku"}
//! ```

use serde::{Deserialize, Serialize};

use tock_registry::{EntitlementEvent, ModuleResourceEvent};

use crate::consumer::QueueMessage;
use crate::error::QueueError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "topic", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimerEvent {
    ModuleResource(ModuleResourceEvent),
    Entitlement(EntitlementEvent),
}

impl TimerEvent {
    pub fn tenant(&self) -> &str {
        match self {
            TimerEvent::ModuleResource(e) => &e.tenant,
            TimerEvent::Entitlement(e) => &e.tenant,
        }
    }

    pub fn topic(&self) -> &'static str {
        match self {
            TimerEvent::ModuleResource(_) => "MODULE_RESOURCE",
            TimerEvent::Entitlement(_) => "ENTITLEMENT",
        }
    }
}

/// Parse a single queue message body into a [`TimerEvent`].
pub fn parse_message(msg: &QueueMessage) -> Result<TimerEvent, QueueError> {
    serde_json::from_str(&msg.body)
        .map_err(|e| QueueError::Parse(format!("message {}: {}", msg.id, e)))
}
