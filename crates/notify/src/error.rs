//! Callback and token error types.

use tock_storage::StoreError;

/// Errors while obtaining a bearer token.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("token request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("token service returned {status}")]
    Rejected { status: u16 },

    #[error("token service response has no token")]
    MissingToken,
}

/// Errors that stop a callback from being issued.
#[derive(Debug, thiserror::Error)]
pub enum CallbackError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Configuration error: {0}")]
    Config(String),
}
