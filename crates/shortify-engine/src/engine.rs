use crate::error::{CreateFailure, EngineError, Result};
use crate::params::{CreateParams, ExpirationPolicy};
use crate::settings::EngineSettings;
use jiff::Timestamp;
use shortify_core::{
    Clock, Codec, LinkCache, MappingStore, Page, SequenceAllocator, ShortCode, ShortLink,
    StorageError, SystemClock,
};
use std::sync::Arc;
use tracing::{debug, error, trace, warn};

/// Creates and resolves short links.
///
/// The engine is stateless apart from its collaborators. It holds no locks:
/// uniqueness comes from the allocator's atomic increment and the store's
/// write-once insert, so any number of engine instances (in one process or
/// many) can share the same backends. Clones share the same collaborators.
///
/// The cache is advisory. Every cache failure is logged and answered from the
/// store instead.
pub struct ShortenerEngine<A, S, C> {
    allocator: Arc<A>,
    store: Arc<S>,
    cache: Arc<C>,
    codec: Codec,
    clock: Arc<dyn Clock>,
}

impl<A, S, C> Clone for ShortenerEngine<A, S, C> {
    fn clone(&self) -> Self {
        Self {
            allocator: Arc::clone(&self.allocator),
            store: Arc::clone(&self.store),
            cache: Arc::clone(&self.cache),
            codec: self.codec,
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<A, S, C> std::fmt::Debug for ShortenerEngine<A, S, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShortenerEngine")
            .field("codec", &self.codec)
            .finish_non_exhaustive()
    }
}

impl<A, S, C> ShortenerEngine<A, S, C>
where
    A: SequenceAllocator,
    S: MappingStore,
    C: LinkCache,
{
    /// Creates an engine with unpadded codes and the system clock.
    pub fn new(allocator: A, store: S, cache: C) -> Self {
        Self {
            allocator: Arc::new(allocator),
            store: Arc::new(store),
            cache: Arc::new(cache),
            codec: Codec::new(),
            clock: Arc::new(SystemClock),
        }
    }

    /// Creates an engine configured by `settings`.
    pub fn with_settings(
        allocator: A,
        store: S,
        cache: C,
        settings: &EngineSettings,
    ) -> Result<Self> {
        let codec = settings.codec()?;
        Ok(Self {
            codec,
            ..Self::new(allocator, store, cache)
        })
    }

    /// Replaces the clock used for creation times and expiry checks.
    pub fn with_clock(mut self, clock: impl Clock) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn codec(&self) -> &Codec {
        &self.codec
    }

    pub fn allocator(&self) -> &A {
        &self.allocator
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }

    /// Creates a new link and returns its code.
    ///
    /// Creation is not idempotent: two calls with the same target yield two
    /// distinct codes. If the store reports the freshly allocated code as
    /// taken, a new value is allocated and the write retried once. An
    /// external id held by another live link fails with `ExternalIdTaken`.
    pub async fn create(&self, params: CreateParams) -> Result<ShortCode> {
        let now = self.clock.now();
        let expires_at = expiry_for(params.expiration, now)?;

        let mut reallocated = false;
        loop {
            let sequence = self.allocator.next().await.map_err(|e| {
                warn!(error = %e, "sequence allocation failed");
                CreateFailure::AllocatorUnavailable(e)
            })?;

            let link = ShortLink {
                code: self.codec.encode(sequence),
                target: params.target.clone(),
                sequence,
                created_at: now,
                expires_at,
                owner: params.owner.clone(),
                external_id: params.external_id.clone(),
            };

            match self.store.put(&link).await {
                Ok(()) => {
                    debug!(code = %link.code, sequence, "created short link");
                    self.fill_cache(&link).await;
                    // The create stands whatever the re-read finds.
                    let _ = self.confirm_fill(&link).await;
                    return Ok(link.code);
                }
                Err(StorageError::DuplicateCode(code)) if !reallocated => {
                    warn!(code = %code, sequence, "allocated code already stored, reallocating");
                    reallocated = true;
                }
                Err(StorageError::DuplicateCode(code)) => {
                    error!(code = %code, sequence, "allocator issued a stored code twice in a row");
                    return Err(CreateFailure::AllocationConflict(code).into());
                }
                Err(StorageError::DuplicateExternalId(external_id)) => {
                    debug!(external_id = %external_id, sequence, "external id already in use");
                    return Err(EngineError::ExternalIdTaken(external_id));
                }
                Err(e) => {
                    warn!(code = %link.code, sequence, error = %e, "failed to store short link");
                    return Err(CreateFailure::Storage(e).into());
                }
            }
        }
    }

    /// Resolves a code to its target URL.
    ///
    /// Fails with `InvalidCodeFormat` before touching any backend if the code
    /// is malformed, `NotFound` if it was never issued, and `Expired` if it
    /// was issued but no longer resolves (tombstoned, past its expiry, or
    /// deleted).
    ///
    /// A cache miss costs two store reads: one to fetch the record and one,
    /// after filling the cache, to catch an expire or delete that landed in
    /// between.
    pub async fn resolve(&self, code: &str) -> Result<String> {
        let (code, sequence) = ShortCode::parse(code, &self.codec)?;
        let now = self.clock.now();

        if let Some(link) = self.cached(&code, sequence, now).await {
            return Ok(link.target);
        }

        let link = self.stored(&code, sequence).await?;
        if link.is_expired_at(now) {
            trace!(code = %code, "short link expired");
            return Err(EngineError::Expired(code.to_string()));
        }

        self.fill_cache(&link).await;
        let link = self.confirm_fill(&link).await?;
        if link.is_expired_at(now) {
            trace!(code = %code, "short link expired while resolving");
            return Err(EngineError::Expired(code.to_string()));
        }
        Ok(link.target)
    }

    /// Returns the full stored record for `code`, expired or not.
    ///
    /// Reads the store directly.
    pub async fn lookup(&self, code: &str) -> Result<ShortLink> {
        let (code, sequence) = ShortCode::parse(code, &self.codec)?;
        self.stored(&code, sequence).await
    }

    /// Returns the full stored record holding `external_id`, expired or not.
    pub async fn lookup_by_external_id(&self, external_id: &str) -> Result<ShortLink> {
        self.store
            .get_by_external_id(external_id)
            .await
            .map_err(EngineError::AdminFailed)?
            .ok_or_else(|| EngineError::NotFound(external_id.to_string()))
    }

    /// Tombstones `code` so it stops resolving from now on.
    ///
    /// Idempotent. An earlier expiry already on the record is kept. If the
    /// cache entry cannot be dropped afterwards the call fails with
    /// `StaleCache`, although the tombstone itself is stored.
    pub async fn expire(&self, code: &str) -> Result<()> {
        let (code, _) = ShortCode::parse(code, &self.codec)?;

        let known = self
            .store
            .expire(&code, self.clock.now())
            .await
            .map_err(EngineError::AdminFailed)?;
        if !known {
            return Err(EngineError::NotFound(code.to_string()));
        }

        self.invalidate(&code).await?;
        debug!(code = %code, "expired short link");
        Ok(())
    }

    /// Removes the link's data. The code stays reserved and resolves as
    /// `Expired` afterwards, and its external id is freed. Deleting an
    /// already deleted code succeeds.
    pub async fn delete(&self, code: &str) -> Result<()> {
        let (code, _) = ShortCode::parse(code, &self.codec)?;
        self.delete_code(&code).await
    }

    /// Deletes the link holding `external_id`.
    ///
    /// Unlike [`delete`](Self::delete) this is not idempotent: once deleted,
    /// the external id no longer names any link and a second call fails with
    /// `NotFound`.
    pub async fn delete_by_external_id(&self, external_id: &str) -> Result<()> {
        let link = self.lookup_by_external_id(external_id).await?;
        self.delete_code(&link.code).await
    }

    /// Lists the links created for `owner`, oldest first.
    pub async fn links_for_owner(&self, owner: &str, page: Page) -> Result<Vec<ShortLink>> {
        self.store
            .list_by_owner(owner, page)
            .await
            .map_err(EngineError::AdminFailed)
    }

    /// Lists every link that was not deleted, oldest first.
    pub async fn links(&self, page: Page) -> Result<Vec<ShortLink>> {
        self.store.list(page).await.map_err(EngineError::AdminFailed)
    }

    async fn delete_code(&self, code: &ShortCode) -> Result<()> {
        let removed = self
            .store
            .delete(code, self.clock.now())
            .await
            .map_err(EngineError::AdminFailed)?;
        if !removed
            && !self
                .store
                .exists(code)
                .await
                .map_err(EngineError::AdminFailed)?
        {
            return Err(EngineError::NotFound(code.to_string()));
        }

        self.invalidate(code).await?;
        debug!(code = %code, removed, "deleted short link");
        Ok(())
    }

    /// A usable cache hit, or `None` if the store has to be asked.
    async fn cached(&self, code: &ShortCode, sequence: u64, now: Timestamp) -> Option<ShortLink> {
        let link = match self.cache.lookup(code).await {
            Ok(Some(link)) => link,
            Ok(None) => return None,
            Err(e) => {
                warn!(code = %code, error = %e, "cache lookup failed, falling back to store");
                return None;
            }
        };

        if link.sequence != sequence || link.is_expired_at(now) {
            trace!(code = %code, "discarding stale cache entry");
            self.evict(code).await;
            return None;
        }

        trace!(code = %code, "resolved from cache");
        Some(link)
    }

    /// The stored record for `code`, or the reason there is none.
    async fn stored(&self, code: &ShortCode, sequence: u64) -> Result<ShortLink> {
        let found = self
            .store
            .get(code)
            .await
            .map_err(EngineError::ResolveFailed)?;

        let Some(link) = found else {
            // Deleted codes keep their reservation, so "exists" separates
            // gone from never issued.
            let existed = self
                .store
                .exists(code)
                .await
                .map_err(EngineError::ResolveFailed)?;
            return Err(if existed {
                EngineError::Expired(code.to_string())
            } else {
                EngineError::NotFound(code.to_string())
            });
        };

        if link.sequence != sequence {
            error!(
                code = %code,
                decoded = sequence,
                stored = link.sequence,
                "stored sequence value does not match its code"
            );
            return Err(EngineError::ResolveFailed(StorageError::InvalidData(
                format!(
                    "code {code} decodes to {sequence} but is stored with sequence {}",
                    link.sequence
                ),
            )));
        }

        Ok(link)
    }

    async fn fill_cache(&self, link: &ShortLink) {
        if let Err(e) = self.cache.fill(&link.code, link).await {
            warn!(code = %link.code, error = %e, "failed to fill cache");
        }
    }

    /// Re-reads `filled` after it was written to the cache.
    ///
    /// An expire or delete that committed between the original read and the
    /// fill has already invalidated, so the fill left a stale entry behind.
    /// The re-read sees that change and drops the entry. Any change committed
    /// after the re-read invalidates after the fill and needs no help.
    async fn confirm_fill(&self, filled: &ShortLink) -> Result<ShortLink> {
        match self.stored(&filled.code, filled.sequence).await {
            Ok(current) if current == *filled => Ok(current),
            Ok(current) => {
                debug!(code = %filled.code, "link changed while caching, dropping entry");
                self.evict(&filled.code).await;
                Ok(current)
            }
            Err(EngineError::ResolveFailed(e)) => {
                warn!(code = %filled.code, error = %e, "could not confirm cached link, dropping entry");
                self.evict(&filled.code).await;
                Ok(filled.clone())
            }
            Err(e) => {
                debug!(code = %filled.code, error = %e, "link removed while caching, dropping entry");
                self.evict(&filled.code).await;
                Err(e)
            }
        }
    }

    /// Best-effort eviction on the read path. A failure only costs a later
    /// store read, since hits are re-checked for expiry.
    async fn evict(&self, code: &ShortCode) {
        if let Err(e) = self.cache.invalidate(code).await {
            warn!(code = %code, error = %e, "failed to invalidate cache entry");
        }
    }

    /// Eviction after a store change. A failure is reported to the caller,
    /// since the cache may keep serving the old record.
    async fn invalidate(&self, code: &ShortCode) -> Result<()> {
        self.cache.invalidate(code).await.map_err(|e| {
            error!(code = %code, error = %e, "failed to drop cache entry after store change");
            EngineError::StaleCache(code.to_string(), e)
        })
    }
}

/// Turns an expiration policy into an absolute expiry, measured from `now`.
fn expiry_for(policy: ExpirationPolicy, now: Timestamp) -> Result<Option<Timestamp>> {
    let expires_at = match policy {
        ExpirationPolicy::Never => return Ok(None),
        ExpirationPolicy::AfterDuration(duration) => now.checked_add(duration).map_err(|e| {
            EngineError::InvalidExpiration(format!("cannot add {duration:?} to {now}: {e}"))
        })?,
        ExpirationPolicy::AtTimestamp(at) => at,
    };

    if expires_at <= now {
        return Err(EngineError::InvalidExpiration(format!(
            "expiry {expires_at} is not after {now}"
        )));
    }
    Ok(Some(expires_at))
}
