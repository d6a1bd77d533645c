use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid module id: {0}")]
    InvalidModuleId(String),

    #[error("Invalid tenant: {0}")]
    InvalidTenant(String),
}
