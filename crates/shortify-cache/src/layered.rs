use async_trait::async_trait;
use shortify_core::cache::Result;
use shortify_core::{LinkCache, ShortCode, ShortLink};
use tracing::{debug, trace, warn};

/// A two-level cache composed of two [`LinkCache`]s.
///
/// L1 is typically a fast, process-local cache ([`MokaLinkCache`]) and L2 a
/// shared one ([`RedisLinkCache`]).
///
/// - **Lookup**: try L1, then L2. An L2 hit is copied into L1.
/// - **Fill**: write to L2, then L1.
/// - **Invalidate**: remove from L1, then L2.
///
/// [`MokaLinkCache`]: crate::MokaLinkCache
/// [`RedisLinkCache`]: crate::RedisLinkCache
#[derive(Debug, Clone)]
pub struct LayeredCache<L1, L2> {
    l1: L1,
    l2: L2,
}

impl<L1, L2> LayeredCache<L1, L2> {
    pub fn new(l1: L1, l2: L2) -> Self {
        Self { l1, l2 }
    }

    pub fn l1(&self) -> &L1 {
        &self.l1
    }

    pub fn l2(&self) -> &L2 {
        &self.l2
    }

    pub fn into_inner(self) -> (L1, L2) {
        (self.l1, self.l2)
    }
}

#[async_trait]
impl<L1, L2> LinkCache for LayeredCache<L1, L2>
where
    L1: LinkCache,
    L2: LinkCache,
{
    async fn lookup(&self, code: &ShortCode) -> Result<Option<ShortLink>> {
        if let Some(link) = self.l1.lookup(code).await? {
            debug!(code = %code, "L1 cache hit");
            return Ok(Some(link));
        }

        trace!(code = %code, "L1 cache miss, trying L2");
        let Some(link) = self.l2.lookup(code).await? else {
            trace!(code = %code, "L2 cache miss");
            return Ok(None);
        };

        debug!(code = %code, "L2 cache hit, backfilling L1");
        // The L2 hit is still good even if L1 cannot take it.
        if let Err(e) = self.l1.fill(code, &link).await {
            warn!(code = %code, error = %e, "Failed to backfill L1 cache");
        }
        Ok(Some(link))
    }

    async fn fill(&self, code: &ShortCode, link: &ShortLink) -> Result<()> {
        self.l2.fill(code, link).await?;
        self.l1.fill(code, link).await?;
        trace!(code = %code, "Stored link in both cache layers");
        Ok(())
    }

    async fn invalidate(&self, code: &ShortCode) -> Result<()> {
        self.l1.invalidate(code).await?;
        self.l2.invalidate(code).await?;
        trace!(code = %code, "Removed link from both cache layers");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MokaLinkCache, NullCache};
    use jiff::{SignedDuration, Timestamp};
    use shortify_core::CacheError;

    fn link(url: &str) -> ShortLink {
        ShortLink {
            code: code("b7"),
            target: url.to_string(),
            sequence: 2301,
            created_at: Timestamp::UNIX_EPOCH,
            expires_at: None,
            owner: None,
            external_id: None,
        }
    }

    fn code(s: &str) -> ShortCode {
        ShortCode::new_unchecked(s)
    }

    fn create_test_cache() -> LayeredCache<MokaLinkCache, MokaLinkCache> {
        LayeredCache::new(
            MokaLinkCache::with_capacity(100),
            MokaLinkCache::with_capacity(100),
        )
    }

    /// Rejects every operation, like an unreachable backend.
    struct BrokenCache;

    #[async_trait]
    impl LinkCache for BrokenCache {
        async fn lookup(&self, _code: &ShortCode) -> Result<Option<ShortLink>> {
            Err(CacheError::Unavailable("down".to_string()))
        }

        async fn fill(&self, _code: &ShortCode, _link: &ShortLink) -> Result<()> {
            Err(CacheError::Unavailable("down".to_string()))
        }

        async fn invalidate(&self, _code: &ShortCode) -> Result<()> {
            Err(CacheError::Unavailable("down".to_string()))
        }
    }

    #[tokio::test]
    async fn lookup_hits_l1() {
        let cache = create_test_cache();
        let c = code("b7");
        let stored = link("https://example.com");

        cache.l1().fill(&c, &stored).await.unwrap();

        assert_eq!(cache.lookup(&c).await.unwrap(), Some(stored));
    }

    #[tokio::test]
    async fn lookup_backfills_l1_from_l2() {
        let cache = create_test_cache();
        let c = code("b7");
        let stored = link("https://example.com");

        cache.l2().fill(&c, &stored).await.unwrap();
        assert!(cache.l1().lookup(&c).await.unwrap().is_none());

        assert_eq!(cache.lookup(&c).await.unwrap(), Some(stored.clone()));
        assert_eq!(cache.l1().lookup(&c).await.unwrap(), Some(stored));
    }

    #[tokio::test]
    async fn backfill_keeps_expiry() {
        let cache = create_test_cache();
        let c = code("b7");
        let stored = ShortLink {
            expires_at: Some(Timestamp::now() + SignedDuration::from_secs(3600)),
            ..link("https://example.com")
        };

        cache.l2().fill(&c, &stored).await.unwrap();
        cache.lookup(&c).await.unwrap();

        assert_eq!(cache.l1().lookup(&c).await.unwrap(), Some(stored));
    }

    #[tokio::test]
    async fn fill_writes_to_both() {
        let cache = create_test_cache();
        let c = code("b7");
        let stored = link("https://example.com");

        cache.fill(&c, &stored).await.unwrap();

        assert_eq!(cache.l1().lookup(&c).await.unwrap(), Some(stored.clone()));
        assert_eq!(cache.l2().lookup(&c).await.unwrap(), Some(stored));
    }

    #[tokio::test]
    async fn invalidate_removes_from_both() {
        let cache = create_test_cache();
        let c = code("b7");
        let stored = link("https://example.com");
        cache.fill(&c, &stored).await.unwrap();

        cache.invalidate(&c).await.unwrap();

        assert!(cache.l1().lookup(&c).await.unwrap().is_none());
        assert!(cache.l2().lookup(&c).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn miss_when_both_empty() {
        let cache = create_test_cache();
        assert!(cache.lookup(&code("b7")).await.unwrap().is_none());
    }

    /// Misses on every lookup and rejects every write.
    struct UnwritableCache;

    #[async_trait]
    impl LinkCache for UnwritableCache {
        async fn lookup(&self, _code: &ShortCode) -> Result<Option<ShortLink>> {
            Ok(None)
        }

        async fn fill(&self, _code: &ShortCode, _link: &ShortLink) -> Result<()> {
            Err(CacheError::Operation("read only".to_string()))
        }

        async fn invalidate(&self, _code: &ShortCode) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn l2_hit_survives_failed_backfill() {
        let l2 = MokaLinkCache::with_capacity(10);
        let c = code("b7");
        let stored = link("https://example.com");
        l2.fill(&c, &stored).await.unwrap();

        let cache = LayeredCache::new(UnwritableCache, l2);
        assert_eq!(cache.lookup(&c).await.unwrap(), Some(stored));
    }

    #[tokio::test]
    async fn l1_failure_surfaces_on_lookup() {
        let cache = LayeredCache::new(BrokenCache, NullCache);
        let err = cache.lookup(&code("b7")).await.unwrap_err();
        assert!(matches!(err, CacheError::Unavailable(_)));
    }

    #[tokio::test]
    async fn l2_failure_surfaces_on_fill() {
        let cache = LayeredCache::new(MokaLinkCache::with_capacity(10), BrokenCache);
        let c = code("b7");

        let err = cache.fill(&c, &link("https://example.com")).await.unwrap_err();
        assert!(matches!(err, CacheError::Unavailable(_)));
        // L2 is written first, so L1 never saw the link.
        assert!(cache.l1().lookup(&c).await.unwrap().is_none());
    }
}
