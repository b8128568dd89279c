use async_trait::async_trait;
use jiff::Timestamp;
use redis::AsyncCommands;
use shortify_core::cache::Result;
use shortify_core::{CacheError, LinkCache, ShortCode, ShortLink};
use tracing::{debug, trace, warn};

const DEFAULT_PREFIX: &str = "shortify:link:";

/// A Redis-based implementation of [`LinkCache`].
///
/// Links are stored as JSON strings under a configurable key prefix. A link
/// with an expiry is written with a matching Redis TTL, so Redis drops it on
/// its own once it stops resolving. The TTL is measured from the wall clock,
/// because Redis expires keys by its own clock; expiry on a hit is still
/// checked by the caller against its clock.
#[derive(Debug, Clone)]
pub struct RedisLinkCache {
    conn: redis::aio::MultiplexedConnection,
    key_prefix: String,
}

fn map_redis_error(operation: &str, err: redis::RedisError) -> CacheError {
    let message = format!("{operation}: {err}");
    let lowered = message.to_ascii_lowercase();
    if lowered.contains("timed out") {
        CacheError::Timeout(message)
    } else if lowered.contains("connection") || lowered.contains("broken pipe") {
        CacheError::Unavailable(message)
    } else {
        CacheError::Operation(message)
    }
}

impl RedisLinkCache {
    /// Creates a new Redis link cache using the `shortify:link:` prefix.
    ///
    /// # Arguments
    ///
    /// * `conn` - A multiplexed Redis connection
    pub fn new(conn: redis::aio::MultiplexedConnection) -> Self {
        Self::with_prefix(conn, DEFAULT_PREFIX)
    }

    /// Creates a new Redis link cache with a custom key prefix.
    ///
    /// # Arguments
    ///
    /// * `conn` - A multiplexed Redis connection
    /// * `key_prefix` - Custom prefix for cache keys (e.g., "myapp:link:")
    pub fn with_prefix(
        conn: redis::aio::MultiplexedConnection,
        key_prefix: impl Into<String>,
    ) -> Self {
        Self {
            conn,
            key_prefix: key_prefix.into(),
        }
    }

    /// Opens a connection to `url` and creates a cache with the default prefix.
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)
            .map_err(|e| CacheError::Initialization(format!("invalid Redis URL: {e}")))?;
        let conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| map_redis_error("failed to connect to Redis", e))?;
        Ok(Self::new(conn))
    }

    /// Generates the cache key for a short code.
    fn cache_key(&self, code: &ShortCode) -> String {
        format!("{}{}", self.key_prefix, code.as_str())
    }
}

#[async_trait]
impl LinkCache for RedisLinkCache {
    async fn lookup(&self, code: &ShortCode) -> Result<Option<ShortLink>> {
        let key = self.cache_key(code);

        let mut conn = self.conn.clone();
        let cached: Option<String> = conn.get(&key).await.map_err(|e| {
            warn!(code = %code, error = %e, "Redis error on get");
            map_redis_error("failed to fetch value from Redis", e)
        })?;

        let Some(cached) = cached else {
            trace!(code = %code, "Cache miss in Redis");
            return Ok(None);
        };

        debug!(code = %code, "Cache hit in Redis");
        serde_json::from_str::<ShortLink>(&cached)
            .map(Some)
            .map_err(|e| {
                warn!(code = %code, error = %e, "Failed to deserialize cached link");
                CacheError::InvalidData(format!("invalid cached value for key '{key}': {e}"))
            })
    }

    async fn fill(&self, code: &ShortCode, link: &ShortLink) -> Result<()> {
        let key = self.cache_key(code);

        let ttl_ms = match link.remaining_ttl(Timestamp::now()) {
            None => None,
            Some(remaining) => {
                let millis = remaining.as_millis().min(u64::MAX as u128) as u64;
                if millis == 0 {
                    trace!(code = %code, "Link already expired, not caching");
                    return Ok(());
                }
                Some(millis)
            }
        };

        let json = serde_json::to_string(link).map_err(|e| {
            warn!(code = %code, error = %e, "Failed to serialize link for caching");
            CacheError::Serialization(format!("failed to serialize cache value: {e}"))
        })?;

        let mut conn = self.conn.clone();
        let written = match ttl_ms {
            Some(ttl_ms) => conn.pset_ex::<_, _, ()>(&key, json, ttl_ms).await,
            None => conn.set::<_, _, ()>(&key, json).await,
        };

        written.map_err(|e| {
            warn!(code = %code, error = %e, "Failed to cache link in Redis");
            map_redis_error("failed to write value to Redis", e)
        })?;
        trace!(code = %code, ttl_ms, "Cached link in Redis");
        Ok(())
    }

    async fn invalidate(&self, code: &ShortCode) -> Result<()> {
        let key = self.cache_key(code);

        let mut conn = self.conn.clone();
        conn.del::<_, ()>(&key).await.map_err(|e| {
            warn!(code = %code, error = %e, "Failed to remove link from Redis cache");
            map_redis_error("failed to delete value from Redis", e)
        })?;
        trace!(code = %code, "Removed link from Redis cache");
        Ok(())
    }
}
