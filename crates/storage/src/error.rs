use thiserror::Error;

use tock_core::CoreError;

#[derive(Error, Debug)]
pub enum StoreError {
    /// The tenant has not been provisioned yet (or was torn down).
    #[error("timer table missing for tenant '{tenant}'")]
    TableMissing { tenant: String },

    #[error("duplicate natural key: {0}")]
    DuplicateKey(String),

    #[error("timer has no id")]
    MissingId,

    #[error("invalid record: {0}")]
    Invalid(#[from] CoreError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl StoreError {
    pub fn is_table_missing(&self) -> bool {
        matches!(self, StoreError::TableMissing { .. })
    }
}
