use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use jiff::Timestamp;
use shortify_core::store::Result;
use shortify_core::{MappingStore, Page, ShortCode, ShortLink, StorageError};
use tracing::trace;

/// What the map holds for a code that was stored at some point.
#[derive(Debug, Clone)]
enum Slot {
    Live(ShortLink),
    /// Hard-deleted. The data is gone but the code stays reserved.
    Retired,
}

/// In-memory implementation of [`MappingStore`] using DashMap.
///
/// DashMap shards its locks, so reads and writes to different codes proceed
/// without blocking each other. Write-once is enforced through the entry API,
/// which holds the shard lock across the check and the insert. External ids
/// are reserved in a second map before the code is inserted and released
/// again if the code turns out to be taken.
///
/// Nothing here survives a restart. Sequence-value uniqueness is not checked
/// separately, since codes and sequence values map one to one for a fixed codec.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    slots: DashMap<ShortCode, Slot>,
    external_ids: DashMap<String, ShortCode>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: DashMap::with_capacity(capacity),
            external_ids: DashMap::new(),
        }
    }

    /// Number of codes ever stored, deleted ones included.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Live links matching `keep`, ordered by sequence value and paged.
    ///
    /// Scans and clones the whole map on every call, which is fine for tests
    /// and the single-process CLI but not for large data sets.
    fn live_page(&self, page: Page, keep: impl Fn(&ShortLink) -> bool) -> Vec<ShortLink> {
        let mut links: Vec<ShortLink> = self
            .slots
            .iter()
            .filter_map(|slot| match slot.value() {
                Slot::Live(link) if keep(link) => Some(link.clone()),
                _ => None,
            })
            .collect();

        links.sort_unstable_by_key(|link| link.sequence);
        links
            .into_iter()
            .skip(page.offset)
            .take(page.limit)
            .collect()
    }

    fn release_external_id(&self, external_id: &str, code: &ShortCode) {
        self.external_ids.remove_if(external_id, |_, holder| holder == code);
    }
}

#[async_trait]
impl MappingStore for InMemoryStore {
    async fn put(&self, link: &ShortLink) -> Result<()> {
        if let Some(external_id) = &link.external_id {
            match self.external_ids.entry(external_id.clone()) {
                Entry::Occupied(_) => {
                    return Err(StorageError::DuplicateExternalId(external_id.clone()))
                }
                Entry::Vacant(vacant) => {
                    vacant.insert(link.code.clone());
                }
            }
        }

        match self.slots.entry(link.code.clone()) {
            Entry::Occupied(_) => {
                if let Some(external_id) = &link.external_id {
                    self.release_external_id(external_id, &link.code);
                }
                Err(StorageError::DuplicateCode(link.code.to_string()))
            }
            Entry::Vacant(vacant) => {
                vacant.insert(Slot::Live(link.clone()));
                trace!(code = %link.code, "stored link");
                Ok(())
            }
        }
    }

    async fn get(&self, code: &ShortCode) -> Result<Option<ShortLink>> {
        Ok(match self.slots.get(code).as_deref() {
            Some(Slot::Live(link)) => Some(link.clone()),
            Some(Slot::Retired) | None => None,
        })
    }

    async fn get_by_external_id(&self, external_id: &str) -> Result<Option<ShortLink>> {
        let Some(code) = self.external_ids.get(external_id).map(|code| code.clone()) else {
            return Ok(None);
        };
        self.get(&code).await
    }

    async fn expire(&self, code: &ShortCode, at: Timestamp) -> Result<bool> {
        let Some(mut slot) = self.slots.get_mut(code) else {
            return Ok(false);
        };

        if let Slot::Live(link) = slot.value_mut() {
            match link.expires_at {
                Some(current) if current <= at => {}
                _ => link.expires_at = Some(at),
            }
        }
        Ok(true)
    }

    async fn delete(&self, code: &ShortCode, _at: Timestamp) -> Result<bool> {
        let retired = {
            let Some(mut slot) = self.slots.get_mut(code) else {
                return Ok(false);
            };
            std::mem::replace(slot.value_mut(), Slot::Retired)
        };

        match retired {
            Slot::Live(link) => {
                if let Some(external_id) = &link.external_id {
                    self.release_external_id(external_id, code);
                }
                Ok(true)
            }
            Slot::Retired => Ok(false),
        }
    }

    async fn exists(&self, code: &ShortCode) -> Result<bool> {
        Ok(self.slots.contains_key(code))
    }

    async fn list_by_owner(&self, owner: &str, page: Page) -> Result<Vec<ShortLink>> {
        Ok(self.live_page(page, |link| link.owner.as_deref() == Some(owner)))
    }

    async fn list(&self, page: Page) -> Result<Vec<ShortLink>> {
        Ok(self.live_page(page, |_| true))
    }
}
