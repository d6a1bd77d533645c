pub mod config;
pub mod context;
pub mod error;
pub mod timer;

pub use config::Config;
pub use context::TenantContext;
pub use error::*;
pub use timer::*;
