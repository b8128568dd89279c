use async_trait::async_trait;
use redis::AsyncCommands;
use shortify_core::sequence::Result;
use shortify_core::{AllocatorError, SequenceAllocator};
use tracing::{trace, warn};

const DEFAULT_KEY: &str = "shortify:seq";

/// A sequence allocator backed by Redis `INCR`.
///
/// `INCR` is atomic on the server, so any number of processes can share one
/// key without coordination. Durability follows the Redis persistence
/// configuration (AOF with `appendfsync always` for no reissue after a crash).
#[derive(Debug, Clone)]
pub struct RedisSequence {
    conn: redis::aio::MultiplexedConnection,
    key: String,
}

fn map_redis_error(key: &str, err: redis::RedisError) -> AllocatorError {
    let message = format!("failed to increment '{key}': {err}");
    if message.to_ascii_lowercase().contains("overflow") {
        AllocatorError::Exhausted(message)
    } else {
        AllocatorError::Unavailable(message)
    }
}

impl RedisSequence {
    /// Creates a Redis sequence using the default counter key.
    ///
    /// # Arguments
    ///
    /// * `conn` - A multiplexed Redis connection
    pub fn new(conn: redis::aio::MultiplexedConnection) -> Self {
        Self::with_key(conn, DEFAULT_KEY)
    }

    /// Creates a Redis sequence using a custom counter key.
    ///
    /// # Arguments
    ///
    /// * `conn` - A multiplexed Redis connection
    /// * `key` - The key holding the counter (e.g., "myapp:seq")
    pub fn with_key(conn: redis::aio::MultiplexedConnection, key: impl Into<String>) -> Self {
        Self {
            conn,
            key: key.into(),
        }
    }

    /// Opens a connection to `url` and creates a sequence on the default key.
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url).map_err(|e| map_redis_error(DEFAULT_KEY, e))?;
        let conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| map_redis_error(DEFAULT_KEY, e))?;
        Ok(Self::new(conn))
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

#[async_trait]
impl SequenceAllocator for RedisSequence {
    async fn next(&self) -> Result<u64> {
        let mut conn = self.conn.clone();
        let value: i64 = conn.incr(&self.key, 1_i64).await.map_err(|e| {
            warn!(key = %self.key, error = %e, "Redis error on sequence increment");
            map_redis_error(&self.key, e)
        })?;

        trace!(key = %self.key, value, "allocated sequence value");
        u64::try_from(value).map_err(|_| {
            AllocatorError::Unavailable(format!(
                "counter '{}' holds a negative value {value}",
                self.key
            ))
        })
    }
}
