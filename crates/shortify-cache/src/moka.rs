use async_trait::async_trait;
use moka::future::Cache;
use moka::policy::EvictionPolicy;
use shortify_core::cache::Result;
use shortify_core::{LinkCache, ShortCode, ShortLink};
use std::time::Duration;
use tracing::{debug, trace};
use typed_builder::TypedBuilder;

const DEFAULT_CAPACITY: u64 = 10_000;

/// An in-process cache implementation using Moka.
///
/// Capacity is bounded and the least recently used entry is evicted first.
/// Reads never block each other and writes lock only a small part of the map.
/// An optional time-to-live bounds how long an entry can outlive a change
/// made by another process.
#[derive(Debug, Clone)]
pub struct MokaLinkCache {
    cache: Cache<ShortCode, ShortLink>,
}

impl MokaLinkCache {
    /// Creates a cache holding up to 10,000 links.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Creates a cache holding up to `max_capacity` links.
    pub fn with_capacity(max_capacity: u64) -> Self {
        MokaCacheConfig::builder()
            .max_capacity(max_capacity)
            .build()
            .into()
    }

    /// Creates a cache whose entries are dropped `ttl` after insertion.
    ///
    /// # Arguments
    ///
    /// * `max_capacity` - Maximum number of entries the cache can hold
    /// * `ttl` - Time-to-live for cache entries
    pub fn with_ttl(max_capacity: u64, ttl: Duration) -> Self {
        MokaCacheConfig::builder()
            .max_capacity(max_capacity)
            .ttl(ttl)
            .build()
            .into()
    }

    /// Approximate number of cached links.
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }

    /// Applies pending evictions and expirations.
    pub async fn run_pending_tasks(&self) {
        self.cache.run_pending_tasks().await;
    }
}

impl Default for MokaLinkCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LinkCache for MokaLinkCache {
    async fn lookup(&self, code: &ShortCode) -> Result<Option<ShortLink>> {
        match self.cache.get(code).await {
            Some(link) => {
                debug!(code = %code, "Cache hit in Moka");
                Ok(Some(link))
            }
            None => {
                trace!(code = %code, "Cache miss in Moka");
                Ok(None)
            }
        }
    }

    async fn fill(&self, code: &ShortCode, link: &ShortLink) -> Result<()> {
        self.cache.insert(code.clone(), link.clone()).await;
        trace!(code = %code, "Cached link in Moka");
        Ok(())
    }

    async fn invalidate(&self, code: &ShortCode) -> Result<()> {
        self.cache.invalidate(code).await;
        trace!(code = %code, "Removed link from Moka (if present)");
        Ok(())
    }
}

/// Settings for a [`MokaLinkCache`].
#[derive(Debug, Clone, TypedBuilder)]
pub struct MokaCacheConfig {
    /// Maximum number of entries the cache can hold.
    #[builder(default = DEFAULT_CAPACITY)]
    pub max_capacity: u64,
    /// Time-to-live for cache entries.
    #[builder(default, setter(strip_option))]
    pub ttl: Option<Duration>,
}

impl Default for MokaCacheConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl From<MokaCacheConfig> for MokaLinkCache {
    fn from(config: MokaCacheConfig) -> Self {
        let mut builder = Cache::builder()
            .max_capacity(config.max_capacity)
            .eviction_policy(EvictionPolicy::lru());

        if let Some(ttl) = config.ttl {
            builder = builder.time_to_live(ttl);
        }

        MokaLinkCache {
            cache: builder.build(),
        }
    }
}
