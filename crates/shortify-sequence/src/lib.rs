//! Sequence allocator backends.
//!
//! [`RedisSequence`] and [`MySqlSequence`] hand the increment to the backend's
//! atomic primitive and are safe to share across processes. [`AtomicSequence`]
//! lives in process memory and is meant for tests and benchmarks only.
//! [`Retrying`] wraps any allocator with bounded, backed-off retries.

pub mod memory;
pub mod mysql;
pub mod redis;
pub mod retry;

pub use memory::AtomicSequence;
pub use mysql::MySqlSequence;
pub use self::redis::RedisSequence;
pub use retry::{RetryPolicy, Retrying};
pub use shortify_core::SequenceAllocator;
