use crate::error::StorageError;
use crate::link::{Page, ShortLink};
use crate::shortcode::ShortCode;
use async_trait::async_trait;
use jiff::Timestamp;
use std::sync::Arc;

pub type Result<T> = std::result::Result<T, StorageError>;

/// Durable, write-once persistence of [`ShortLink`]s keyed by code.
///
/// A successful [`put`](MappingStore::put) must be visible to every subsequent
/// [`get`](MappingStore::get) from any client. Codes are reserved forever:
/// once stored, a code can never be stored again, even after
/// [`delete`](MappingStore::delete). External ids are unique among links that
/// have not been deleted; deleting a link frees its external id.
#[async_trait]
pub trait MappingStore: Send + Sync + 'static {
    /// Inserts a new link.
    ///
    /// Returns `Err(DuplicateCode)` if the code was ever stored and
    /// `Err(DuplicateExternalId)` if another live link holds its external id.
    async fn put(&self, link: &ShortLink) -> Result<()>;

    /// Retrieves the link for a given code, expired or not.
    /// Returns `None` if the code does not exist or was deleted.
    async fn get(&self, code: &ShortCode) -> Result<Option<ShortLink>>;

    /// Retrieves the link holding `external_id`, expired or not.
    async fn get_by_external_id(&self, external_id: &str) -> Result<Option<ShortLink>>;

    /// Tombstones the link by moving its expiry to `at`, unless it already
    /// expires earlier. Idempotent.
    /// Returns `false` if the code was never stored.
    async fn expire(&self, code: &ShortCode, at: Timestamp) -> Result<bool>;

    /// Removes the link's data at `at` while keeping its code reserved.
    /// Returns `true` if a live record was removed.
    async fn delete(&self, code: &ShortCode, at: Timestamp) -> Result<bool>;

    /// Checks whether a code was ever stored, including deleted ones.
    async fn exists(&self, code: &ShortCode) -> Result<bool>;

    /// Lists an owner's links ordered by sequence value.
    async fn list_by_owner(&self, owner: &str, page: Page) -> Result<Vec<ShortLink>>;

    /// Lists every link that was not deleted, ordered by sequence value.
    async fn list(&self, page: Page) -> Result<Vec<ShortLink>>;
}

#[async_trait]
impl<T: MappingStore + ?Sized> MappingStore for Arc<T> {
    async fn put(&self, link: &ShortLink) -> Result<()> {
        (**self).put(link).await
    }

    async fn get(&self, code: &ShortCode) -> Result<Option<ShortLink>> {
        (**self).get(code).await
    }

    async fn get_by_external_id(&self, external_id: &str) -> Result<Option<ShortLink>> {
        (**self).get_by_external_id(external_id).await
    }

    async fn expire(&self, code: &ShortCode, at: Timestamp) -> Result<bool> {
        (**self).expire(code, at).await
    }

    async fn delete(&self, code: &ShortCode, at: Timestamp) -> Result<bool> {
        (**self).delete(code, at).await
    }

    async fn exists(&self, code: &ShortCode) -> Result<bool> {
        (**self).exists(code).await
    }

    async fn list_by_owner(&self, owner: &str, page: Page) -> Result<Vec<ShortLink>> {
        (**self).list_by_owner(owner, page).await
    }

    async fn list(&self, page: Page) -> Result<Vec<ShortLink>> {
        (**self).list(page).await
    }
}
