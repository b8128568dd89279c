use crate::error::CacheError;
use crate::link::ShortLink;
use crate::shortcode::ShortCode;
use async_trait::async_trait;
use std::sync::Arc;

pub type Result<T> = std::result::Result<T, CacheError>;

/// A cache for resolved links.
///
/// This trait provides a domain-specific caching abstraction for [`ShortLink`]s,
/// using [`ShortCode`] as the key. The cache is a derived view of the mapping
/// store: losing it, or any of its entries, only costs latency.
#[async_trait]
pub trait LinkCache: Send + Sync + 'static {
    /// Get a link from the cache.
    ///
    /// Returns `Ok(None)` if the key is not in the cache.
    async fn lookup(&self, code: &ShortCode) -> Result<Option<ShortLink>>;

    /// Store a link in the cache.
    async fn fill(&self, code: &ShortCode, link: &ShortLink) -> Result<()>;

    /// Remove a link from the cache.
    ///
    /// It is not an error if the key does not exist.
    async fn invalidate(&self, code: &ShortCode) -> Result<()>;
}

#[async_trait]
impl<T: LinkCache + ?Sized> LinkCache for Arc<T> {
    async fn lookup(&self, code: &ShortCode) -> Result<Option<ShortLink>> {
        (**self).lookup(code).await
    }

    async fn fill(&self, code: &ShortCode, link: &ShortLink) -> Result<()> {
        (**self).fill(code, link).await
    }

    async fn invalidate(&self, code: &ShortCode) -> Result<()> {
        (**self).invalidate(code).await
    }
}
