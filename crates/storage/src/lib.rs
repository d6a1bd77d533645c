//! Tenant-scoped persistence for timer records.
//!
//! [`TimerStore`] is the boundary the registry talks to. Two backends:
//! - [`InMemoryTimerStore`] for tests and database-less runs
//! - [`PgTimerStore`] with one schema per tenant

pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;

pub use error::StoreError;
pub use memory::InMemoryTimerStore;
pub use postgres::PgTimerStore;
pub use store::{Page, TimerStore};
