use async_trait::async_trait;
use shortify_core::sequence::Result;
use shortify_core::{AllocatorError, SequenceAllocator};
use std::sync::atomic::{AtomicU64, Ordering};

/// An in-process sequence backed by an atomic counter.
///
/// Values are unique and increasing within one instance, but the counter is
/// lost on restart and is not shared between processes. Use a durable
/// allocator ([`RedisSequence`](crate::RedisSequence),
/// [`MySqlSequence`](crate::MySqlSequence)) for anything that must survive a
/// restart.
#[derive(Debug)]
pub struct AtomicSequence {
    next: AtomicU64,
}

impl AtomicSequence {
    /// Creates a sequence whose first value is 1.
    pub fn new() -> Self {
        Self::with_start(1)
    }

    /// Creates a sequence whose first value is `first`.
    ///
    /// Useful for resuming from a known state in tests.
    pub fn with_start(first: u64) -> Self {
        Self {
            next: AtomicU64::new(first),
        }
    }
}

impl Default for AtomicSequence {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SequenceAllocator for AtomicSequence {
    async fn next(&self) -> Result<u64> {
        self.next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |value| {
                value.checked_add(1)
            })
            .map_err(|value| {
                AllocatorError::Exhausted(format!("in-memory sequence reached {value}"))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[tokio::test]
    async fn starts_at_one() {
        let seq = AtomicSequence::new();
        assert_eq!(seq.next().await.unwrap(), 1);
        assert_eq!(seq.next().await.unwrap(), 2);
        assert_eq!(seq.next().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn with_start_resumes_from_value() {
        let seq = AtomicSequence::with_start(2301);
        assert_eq!(seq.next().await.unwrap(), 2301);
        assert_eq!(seq.next().await.unwrap(), 2302);
    }

    #[tokio::test]
    async fn refuses_to_wrap_around() {
        let seq = AtomicSequence::with_start(u64::MAX - 1);
        assert_eq!(seq.next().await.unwrap(), u64::MAX - 1);
        assert!(matches!(
            seq.next().await,
            Err(AllocatorError::Exhausted(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_callers_never_share_a_value() {
        let seq = Arc::new(AtomicSequence::new());
        let mut handles = Vec::new();
        for _ in 0..16 {
            let seq = Arc::clone(&seq);
            handles.push(tokio::spawn(async move {
                let mut values = Vec::with_capacity(500);
                for _ in 0..500 {
                    values.push(seq.next().await.unwrap());
                }
                values
            }));
        }

        let mut seen = HashSet::new();
        for handle in handles {
            let values = handle.await.unwrap();
            // Each caller observes its own values in increasing order.
            assert!(values.windows(2).all(|w| w[0] < w[1]));
            for value in values {
                assert!(seen.insert(value), "duplicate sequence value {value}");
            }
        }
        assert_eq!(seen.len(), 16 * 500);
    }
}
