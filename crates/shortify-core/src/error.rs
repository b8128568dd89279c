use thiserror::Error;

pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors raised by the code alphabet and short code validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    #[error("invalid short code format: {0}")]
    InvalidCodeFormat(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AllocatorError {
    #[error("sequence allocator unavailable: {0}")]
    Unavailable(String),
    #[error("sequence space exhausted: {0}")]
    Exhausted(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    #[error("short code already exists: {0}")]
    DuplicateCode(String),
    #[error("external id already in use: {0}")]
    DuplicateExternalId(String),
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),
    #[error("storage operation timed out: {0}")]
    Timeout(String),
    #[error("storage query failed: {0}")]
    Query(String),
    #[error("stored data is invalid: {0}")]
    InvalidData(String),
    #[error("storage operation failed: {0}")]
    Operation(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    #[error("cache backend unavailable: {0}")]
    Unavailable(String),
    #[error("cache operation timed out: {0}")]
    Timeout(String),
    #[error("cache serialization failed: {0}")]
    Serialization(String),
    #[error("cache value is invalid: {0}")]
    InvalidData(String),
    #[error("cache initialization failed: {0}")]
    Initialization(String),
    #[error("cache operation failed: {0}")]
    Operation(String),
}
