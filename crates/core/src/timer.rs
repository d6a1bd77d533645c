//! Timer record model, trigger shapes, and natural-key derivation.
//!
//! A [`TimerRecord`] is the persisted intent: which module owns the timer,
//! whether it is enabled, and what its [`RoutingEntry`] looks like. The
//! natural key identifies a timer's logical identity independently of its id
//! and drives dedup-on-create.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;

/// Default zone for cron schedules without an explicit one.
pub const DEFAULT_ZONE: &str = "UTC";

// ── Timer type ────────────────────────────────────────────────

/// Origin of a timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimerType {
    /// Declared in a module descriptor and managed by module sync.
    System,
    /// Created directly through the API.
    User,
}

impl TimerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimerType::System => "SYSTEM",
            TimerType::User => "USER",
        }
    }
}

impl fmt::Display for TimerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimerType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "SYSTEM" => Ok(TimerType::System),
            "USER" => Ok(TimerType::User),
            other => Err(CoreError::Validation(format!("unknown timer type: {other}"))),
        }
    }
}

// ── Time unit ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimeUnit {
    #[serde(alias = "MS")]
    Millisecond,
    #[serde(alias = "SEC")]
    Second,
    #[serde(alias = "MIN")]
    Minute,
    Hour,
    Day,
}

impl TimeUnit {
    /// Milliseconds in one unit.
    pub fn millis(self) -> u64 {
        match self {
            TimeUnit::Millisecond => 1,
            TimeUnit::Second => 1_000,
            TimeUnit::Minute => 60_000,
            TimeUnit::Hour => 3_600_000,
            TimeUnit::Day => 86_400_000,
        }
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TimeUnit::Millisecond => "MILLISECOND",
            TimeUnit::Second => "SECOND",
            TimeUnit::Minute => "MINUTE",
            TimeUnit::Hour => "HOUR",
            TimeUnit::Day => "DAY",
        };
        f.write_str(name)
    }
}

// ── Trigger shapes ────────────────────────────────────────────

/// Fixed-rate repetition: `delay` units between fires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interval {
    /// Integer carried as a string, as module descriptors declare it.
    pub delay: String,
    pub unit: TimeUnit,
}

impl Interval {
    pub fn new(delay: impl Into<String>, unit: TimeUnit) -> Self {
        Self {
            delay: delay.into(),
            unit,
        }
    }

    /// Parsed delay value.
    pub fn delay_value(&self) -> Result<u64, CoreError> {
        self.delay
            .trim()
            .parse::<u64>()
            .map_err(|_| CoreError::Validation(format!("invalid delay: '{}'", self.delay)))
    }

    /// Effective repeat interval in milliseconds.
    pub fn millis(&self) -> Result<u64, CoreError> {
        self.delay_value()?
            .checked_mul(self.unit.millis())
            .ok_or_else(|| CoreError::Validation(format!("delay overflow: {} {}", self.delay, self.unit)))
    }

    /// A zero delay marks a timer that must never be scheduled.
    pub fn is_zero(&self) -> bool {
        matches!(self.delay_value(), Ok(0))
    }
}

/// Cron-driven repetition evaluated in `zone`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CronSchedule {
    pub cron: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone: Option<String>,
}

impl CronSchedule {
    pub fn new(cron: impl Into<String>, zone: Option<String>) -> Self {
        Self {
            cron: cron.into(),
            zone,
        }
    }

    pub fn zone_or_default(&self) -> &str {
        self.zone
            .as_deref()
            .filter(|z| !z.trim().is_empty())
            .unwrap_or(DEFAULT_ZONE)
    }
}

/// HTTP target plus trigger shape of a timer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutingEntry {
    #[serde(default)]
    pub methods: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<Interval>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<CronSchedule>,
}

impl RoutingEntry {
    /// Path component of the natural key: the pattern when declared, else the literal path.
    pub fn key_path(&self) -> &str {
        self.path_pattern
            .as_deref()
            .or(self.path.as_deref())
            .unwrap_or("")
    }

    /// Path used for the outbound callback: the literal path when declared, else the pattern.
    pub fn static_path(&self) -> Option<&str> {
        self.path
            .as_deref()
            .filter(|p| !p.is_empty())
            .or(self.path_pattern.as_deref().filter(|p| !p.is_empty()))
    }

    /// Checks the mutually exclusive trigger shapes and the interval lower bound.
    ///
    /// A zero delay passes: it marks an inactive timer rather than a bad one.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.methods.len() > 1 {
            return Err(CoreError::Validation(format!(
                "at most one HTTP method is allowed per timer, got {}",
                self.methods.len()
            )));
        }
        match (&self.interval, &self.schedule) {
            (Some(_), Some(_)) => Err(CoreError::Validation(
                "interval and schedule are mutually exclusive".to_string(),
            )),
            (None, None) => Err(CoreError::Validation(
                "either interval or schedule must be specified".to_string(),
            )),
            (Some(interval), None) => {
                let ms = interval.millis()?;
                if ms != 0 && ms < MIN_INTERVAL_MS {
                    return Err(CoreError::Validation(format!(
                        "interval must be at least {MIN_INTERVAL_MS}ms, got {ms}ms"
                    )));
                }
                Ok(())
            }
            (None, Some(schedule)) => {
                if schedule.cron.trim().is_empty() {
                    return Err(CoreError::Validation("cron expression is empty".to_string()));
                }
                Ok(())
            }
        }
    }
}

/// Shortest repeat interval the scheduler accepts.
pub const MIN_INTERVAL_MS: u64 = 1_000;

// ── Audit metadata ────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditMetadata {
    pub created_date: Option<DateTime<Utc>>,
    pub created_by_user_id: Option<Uuid>,
    pub updated_date: Option<DateTime<Utc>>,
    pub updated_by_user_id: Option<Uuid>,
}

// ── Timer record ──────────────────────────────────────────────

/// A persisted timer.
///
/// `metadata` is server-populated; whatever a client sends there is replaced
/// on write. The natural key is derived on demand and never serialized.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<TimerType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module_id: Option<String>,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub routing_entry: Option<RoutingEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<AuditMetadata>,
}

impl TimerRecord {
    /// Build an enabled SYSTEM timer for a module descriptor entry.
    pub fn system(module_id: &str, entry: RoutingEntry) -> Self {
        Self {
            id: None,
            kind: Some(TimerType::System),
            module_name: None,
            module_id: Some(module_id.to_string()),
            enabled: true,
            routing_entry: Some(entry),
            metadata: None,
        }
    }

    /// Whether an engine trigger should exist for this record.
    pub fn is_active(&self) -> bool {
        match &self.routing_entry {
            Some(entry) if self.enabled => !entry.interval.as_ref().is_some_and(Interval::is_zero),
            _ => false,
        }
    }

    /// Re-derive `module_name` from `module_id` when the latter is present.
    pub fn resolve_module_name(&mut self) -> Result<(), CoreError> {
        if let Some(module_id) = self.module_id.as_deref().filter(|m| !m.trim().is_empty()) {
            self.module_name = Some(module_name_from_id(module_id)?);
        }
        Ok(())
    }

    /// Natural key of this record; see [`natural_key`].
    pub fn natural_key(&self) -> Result<String, CoreError> {
        let kind = self
            .kind
            .ok_or_else(|| CoreError::Validation("timer type is required".to_string()))?;
        let module_name = self.module_name.as_deref().unwrap_or("");
        let (methods, path) = match &self.routing_entry {
            Some(entry) => (entry.methods.as_slice(), entry.key_path()),
            None => (&[][..], ""),
        };
        natural_key(kind, module_name, methods, path)
    }

    /// Id as the scheduling engine job key.
    pub fn job_key(&self) -> Option<String> {
        self.id.map(|id| id.to_string())
    }
}

/// `"{type}#{moduleName}#{methods joined by ','}#{path}"`.
///
/// Pure in its inputs; an empty module name is rejected.
pub fn natural_key(
    kind: TimerType,
    module_name: &str,
    methods: &[String],
    path: &str,
) -> Result<String, CoreError> {
    if module_name.trim().is_empty() {
        return Err(CoreError::Validation(
            "module name is required to compute the natural key".to_string(),
        ));
    }
    Ok(format!("{}#{}#{}#{}", kind, module_name, methods.join(","), path))
}

/// Strip the semantic version from a module id (`mod-foo-1.2.3-SNAPSHOT.4` → `mod-foo`).
///
/// An id without a version suffix is already a name.
pub fn module_name_from_id(module_id: &str) -> Result<String, CoreError> {
    let id = module_id.trim();
    if id.is_empty() {
        return Err(CoreError::InvalidModuleId(module_id.to_string()));
    }
    for (idx, _) in id.match_indices('-') {
        let rest = &id[idx + 1..];
        if is_semver_prefix(rest) {
            let name = &id[..idx];
            if name.is_empty() {
                return Err(CoreError::InvalidModuleId(module_id.to_string()));
            }
            return Ok(name.to_string());
        }
    }
    Ok(id.to_string())
}

/// `MAJOR.MINOR.PATCH` followed by nothing or a pre-release/build suffix.
fn is_semver_prefix(s: &str) -> bool {
    let core_end = s.find(['-', '+']).unwrap_or(s.len());
    let parts: Vec<&str> = s[..core_end].split('.').collect();
    parts.len() == 3
        && parts
            .iter()
            .all(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit()))
}
