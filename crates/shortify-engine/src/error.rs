use shortify_core::{AllocatorError, CacheError, CoreError, StorageError};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

/// Every outcome of an engine operation other than success.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("invalid short code format: {0}")]
    InvalidCodeFormat(String),
    #[error("invalid expiration: {0}")]
    InvalidExpiration(String),
    #[error("short code not found: {0}")]
    NotFound(String),
    #[error("short code expired: {0}")]
    Expired(String),
    #[error("external id already in use: {0}")]
    ExternalIdTaken(String),
    #[error("failed to create short link: {0}")]
    CreateFailed(#[from] CreateFailure),
    #[error("failed to resolve short code: {0}")]
    ResolveFailed(StorageError),
    #[error("administrative operation failed: {0}")]
    AdminFailed(StorageError),
    /// The store change is durable, but a cached copy of the old record could
    /// not be dropped and may still be served. Repeating the call is safe.
    #[error("short link {0} changed but its cache entry could not be dropped: {1}")]
    StaleCache(String, CacheError),
}

/// Why a create request did not produce a link.
///
/// None of these leave a partially created link behind. The sequence value
/// consumed by a failed attempt is abandoned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CreateFailure {
    #[error("{0}")]
    AllocatorUnavailable(AllocatorError),
    #[error("allocated code {0} was already stored, even after reallocating")]
    AllocationConflict(String),
    #[error("{0}")]
    Storage(StorageError),
}

impl From<CoreError> for EngineError {
    fn from(value: CoreError) -> Self {
        match value {
            CoreError::InvalidCodeFormat(message) => Self::InvalidCodeFormat(message),
        }
    }
}

impl EngineError {
    /// Whether the caller may reasonably retry the same request later.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::CreateFailed(CreateFailure::AllocatorUnavailable(err)) => {
                matches!(err, AllocatorError::Unavailable(_))
            }
            Self::CreateFailed(CreateFailure::Storage(err))
            | Self::ResolveFailed(err)
            | Self::AdminFailed(err) => !matches!(
                err,
                StorageError::InvalidData(_)
                    | StorageError::DuplicateCode(_)
                    | StorageError::DuplicateExternalId(_)
            ),
            Self::StaleCache(..) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_errors_convert() {
        let err: EngineError = CoreError::InvalidCodeFormat("bad".to_string()).into();
        assert_eq!(err, EngineError::InvalidCodeFormat("bad".to_string()));
    }

    #[test]
    fn transient_classification() {
        assert!(EngineError::ResolveFailed(StorageError::Timeout("t".to_string())).is_transient());
        assert!(EngineError::CreateFailed(CreateFailure::AllocatorUnavailable(
            AllocatorError::Unavailable("down".to_string())
        ))
        .is_transient());

        assert!(!EngineError::ResolveFailed(StorageError::InvalidData("x".to_string()))
            .is_transient());
        assert!(!EngineError::CreateFailed(CreateFailure::AllocatorUnavailable(
            AllocatorError::Exhausted("max".to_string())
        ))
        .is_transient());
        assert!(!EngineError::NotFound("zz99".to_string()).is_transient());
        assert!(!EngineError::ExternalIdTaken("order-1".to_string()).is_transient());
        assert!(EngineError::StaleCache(
            "b7".to_string(),
            CacheError::Unavailable("down".to_string())
        )
        .is_transient());
        assert!(!EngineError::CreateFailed(CreateFailure::AllocationConflict(
            "b7".to_string()
        ))
        .is_transient());
    }

    #[test]
    fn messages_include_the_cause() {
        let err = EngineError::CreateFailed(CreateFailure::Storage(StorageError::Unavailable(
            "pool closed".to_string(),
        )));
        assert_eq!(
            err.to_string(),
            "failed to create short link: storage backend unavailable: pool closed"
        );
    }
}
