//! Timer scheduling service: HTTP API, event ingress and process wiring.

pub mod api;
pub mod app;
pub mod router;
pub mod state;

pub use app::{App, StoreChoice};
pub use router::build_router;
pub use state::AppState;
