//! Core types and traits for the Shortify link engine.
//!
//! This crate provides the code alphabet, the link model, and the traits
//! implemented by the sequence, storage and cache backends.

pub mod cache;
pub mod clock;
pub mod codec;
pub mod error;
pub mod link;
pub mod sequence;
pub mod shortcode;
pub mod store;

pub use cache::LinkCache;
pub use clock::{Clock, ManualClock, SystemClock};
pub use codec::Codec;
pub use error::{AllocatorError, CacheError, CoreError, StorageError};
pub use link::{Page, ShortLink};
pub use sequence::SequenceAllocator;
pub use shortcode::ShortCode;
pub use store::MappingStore;
