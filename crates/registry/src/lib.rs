//! Timer registry and module synchronization.
//!
//! This crate provides:
//! - [`TimerRegistry`]: validated CRUD over timers with natural-key dedup,
//!   keeping engine triggers reconciled after every write
//! - [`ModuleSyncCoordinator`]: applies module lifecycle and entitlement
//!   events to a tenant's SYSTEM timers

pub mod error;
pub mod events;
pub mod service;
pub mod sync;

pub use error::{RegistryError, SyncError};
pub use events::{EntitlementEvent, EntitlementType, ModuleResourceEvent, ModuleTimers, ResourceEventType};
pub use service::TimerRegistry;
pub use sync::ModuleSyncCoordinator;
