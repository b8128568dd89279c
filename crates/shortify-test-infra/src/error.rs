use thiserror::Error;

/// Failures while starting or reaching a test backend.
#[derive(Debug, Error)]
pub enum TestInfraError {
    #[error("container failed: {0}")]
    Container(#[from] testcontainers::TestcontainersError),

    #[error("redis unreachable: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("mysql unreachable: {0}")]
    MySql(#[from] sqlx::Error),
}

pub type Result<T> = std::result::Result<T, TestInfraError>;
