//! Module lifecycle and entitlement event payloads.

use serde::{Deserialize, Serialize};

use tock_core::RoutingEntry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResourceEventType {
    Create,
    Update,
    Delete,
}

/// Timer section of a module descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleTimers {
    pub module_id: String,
    #[serde(default)]
    pub timers: Vec<RoutingEntry>,
}

/// A module was installed, upgraded or removed for a tenant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleResourceEvent {
    #[serde(rename = "type")]
    pub event_type: ResourceEventType,
    pub tenant: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_value: Option<ModuleTimers>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_value: Option<ModuleTimers>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntitlementType {
    Entitle,
    Upgrade,
    Revoke,
}

impl EntitlementType {
    /// Whether the module's timers should run after this event.
    pub fn enables(self) -> bool {
        !matches!(self, EntitlementType::Revoke)
    }
}

/// A tenant gained or lost access to a module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntitlementEvent {
    #[serde(rename = "type")]
    pub event_type: EntitlementType,
    pub module_id: String,
    pub tenant: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_event_from_json() {
        let event: ModuleResourceEvent = serde_json::from_value(serde_json::json!({
            "type": "UPDATE",
            "tenant": "diku",
            "newValue": {
                "moduleId": "mod-foo-1.1.0",
                "timers": [{
                    "methods": ["POST"],
                    "pathPattern": "/foo/expire",
                    "interval": { "delay": "5", "unit": "MIN" }
                }]
            },
            "oldValue": { "moduleId": "mod-foo-1.0.0" }
        }))
        .unwrap();

        assert_eq!(event.event_type, ResourceEventType::Update);
        let new_value = event.new_value.unwrap();
        assert_eq!(new_value.timers.len(), 1);
        assert!(event.old_value.unwrap().timers.is_empty());
    }

    #[test]
    fn entitlement_direction() {
        assert!(EntitlementType::Entitle.enables());
        assert!(EntitlementType::Upgrade.enables());
        assert!(!EntitlementType::Revoke.enables());

        let event: EntitlementEvent = serde_json::from_str(
            r#"{"type":"REVOKE","moduleId":"mod-foo-1.0.0","tenant":"diku"}"#,
        )
        .unwrap();
        assert_eq!(event.event_type, EntitlementType::Revoke);
    }
}
