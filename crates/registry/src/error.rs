use thiserror::Error;
use uuid::Uuid;

use tock_core::CoreError;
use tock_scheduler::TriggerError;
use tock_storage::StoreError;

/// Errors from timer registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("timer not found: {0}")]
    NotFound(Uuid),

    #[error("timer already exists: {0}")]
    AlreadyExists(String),

    #[error(transparent)]
    Scheduling(TriggerError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<CoreError> for RegistryError {
    fn from(e: CoreError) -> Self {
        Self::Validation(e.to_string())
    }
}

impl From<TriggerError> for RegistryError {
    fn from(e: TriggerError) -> Self {
        if e.is_validation() {
            Self::Validation(e.to_string())
        } else {
            Self::Scheduling(e)
        }
    }
}

impl RegistryError {
    /// Map to an HTTP status code for API responses.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_) => 400,
            Self::NotFound(_) => 404,
            Self::AlreadyExists(_) => 409,
            Self::Scheduling(_) => 500,
            Self::Store(StoreError::TableMissing { .. }) => 404,
            Self::Store(StoreError::DuplicateKey(_)) => 409,
            Self::Store(StoreError::Invalid(_)) | Self::Store(StoreError::MissingId) => 400,
            Self::Store(_) => 500,
        }
    }

    pub fn is_table_missing(&self) -> bool {
        matches!(self, Self::Store(e) if e.is_table_missing())
    }
}

/// Errors from applying module lifecycle or entitlement events.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("invalid event: {0}")]
    InvalidEvent(String),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl From<CoreError> for SyncError {
    fn from(e: CoreError) -> Self {
        Self::InvalidEvent(e.to_string())
    }
}

impl SyncError {
    pub fn is_table_missing(&self) -> bool {
        matches!(self, Self::Registry(e) if e.is_table_missing())
    }

    /// Whether redelivering the event could succeed. Errors caused by the
    /// event's content never can; a missing table or a failing store or engine may.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::InvalidEvent(_) => false,
            Self::Registry(e) => e.is_table_missing() || e.status_code() >= 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use tock_scheduler::EngineError;

    use super::*;

    #[test]
    fn status_codes() {
        assert_eq!(RegistryError::Validation("x".into()).status_code(), 400);
        assert_eq!(RegistryError::NotFound(Uuid::nil()).status_code(), 404);
        assert_eq!(RegistryError::AlreadyExists("x".into()).status_code(), 409);
        let missing = RegistryError::from(StoreError::TableMissing { tenant: "t".into() });
        assert_eq!(missing.status_code(), 404);
        assert!(missing.is_table_missing());
    }

    #[test]
    fn trigger_errors_split_by_origin() {
        let bad_shape = RegistryError::from(TriggerError::ConflictingTriggerShapes);
        assert_eq!(bad_shape.status_code(), 400);

        let engine = RegistryError::from(TriggerError::SchedulingFailure {
            job_key: "k".into(),
            source: EngineError::Unavailable("down".into()),
        });
        assert_eq!(engine.status_code(), 500);
    }

    #[test]
    fn sync_error_sees_through_registry() {
        let err = SyncError::from(RegistryError::from(StoreError::TableMissing {
            tenant: "t".into(),
        }));
        assert!(err.is_table_missing());
        assert!(!SyncError::InvalidEvent("bad".into()).is_table_missing());
    }

    #[test]
    fn only_recoverable_sync_errors_are_retryable() {
        let missing = SyncError::from(RegistryError::from(StoreError::TableMissing {
            tenant: "t".into(),
        }));
        assert!(missing.is_retryable());

        let engine_down = SyncError::from(RegistryError::from(TriggerError::SchedulingFailure {
            job_key: "k".into(),
            source: EngineError::Unavailable("down".into()),
        }));
        assert!(engine_down.is_retryable());

        let invalid_timer = SyncError::from(RegistryError::Validation("too short".into()));
        assert!(!invalid_timer.is_retryable());
        assert!(!SyncError::InvalidEvent("bad".into()).is_retryable());
    }
}
