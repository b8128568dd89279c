use async_trait::async_trait;
use shortify_core::cache::Result;
use shortify_core::{LinkCache, ShortCode, ShortLink};

/// A cache that never holds anything. Every lookup goes to the store.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullCache;

#[async_trait]
impl LinkCache for NullCache {
    async fn lookup(&self, _code: &ShortCode) -> Result<Option<ShortLink>> {
        Ok(None)
    }

    async fn fill(&self, _code: &ShortCode, _link: &ShortLink) -> Result<()> {
        Ok(())
    }

    async fn invalidate(&self, _code: &ShortCode) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jiff::Timestamp;

    #[tokio::test]
    async fn always_misses() {
        let cache = NullCache;
        let code = ShortCode::new_unchecked("b7");
        let link = ShortLink {
            code: code.clone(),
            target: "https://example.com".to_string(),
            sequence: 2301,
            created_at: Timestamp::UNIX_EPOCH,
            expires_at: None,
            owner: None,
            external_id: None,
        };

        cache.fill(&code, &link).await.unwrap();
        assert!(cache.lookup(&code).await.unwrap().is_none());
        cache.invalidate(&code).await.unwrap();
    }
}
