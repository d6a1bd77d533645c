//! Callback delivery for fired timers.
//!
//! This crate provides:
//! - [`CallbackExecutor`]: the engine's job handler; re-reads the timer and
//!   performs its HTTP call
//! - [`TokenProvider`] with static and HTTP-backed implementations
//! - [`HttpMethod`]: the closed set of methods a timer may use

pub mod error;
pub mod executor;
pub mod method;
pub mod token;

pub use error::{CallbackError, TokenError};
pub use executor::{CallbackExecutor, CallbackOutcome};
pub use method::HttpMethod;
pub use token::{token_provider_from_config, HttpTokenProvider, StaticTokenProvider, TokenProvider};
