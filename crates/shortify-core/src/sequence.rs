use crate::error::AllocatorError;
use async_trait::async_trait;
use std::sync::Arc;

pub type Result<T> = std::result::Result<T, AllocatorError>;

/// Issues the sequence values short codes are derived from.
///
/// Every call to [`next`](SequenceAllocator::next) across every process sharing
/// the backend must return a distinct value, strictly greater than any value
/// previously returned. Gaps are allowed, duplicates are not.
///
/// Durable implementations delegate the increment to the backend's atomic
/// primitive and never mirror the counter in process memory.
#[async_trait]
pub trait SequenceAllocator: Send + Sync + 'static {
    /// Atomically increments the counter and returns the new value.
    async fn next(&self) -> Result<u64>;
}

#[async_trait]
impl<T: SequenceAllocator + ?Sized> SequenceAllocator for Arc<T> {
    async fn next(&self) -> Result<u64> {
        (**self).next().await
    }
}
