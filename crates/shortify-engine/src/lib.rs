//! The shortening engine.
//!
//! [`ShortenerEngine`] ties a [`SequenceAllocator`], a [`MappingStore`] and a
//! [`LinkCache`] together: creation allocates a sequence value, encodes it and
//! writes the link once; resolution reads through the cache to the store and
//! enforces expiry.
//!
//! [`SequenceAllocator`]: shortify_core::SequenceAllocator
//! [`MappingStore`]: shortify_core::MappingStore
//! [`LinkCache`]: shortify_core::LinkCache

pub mod engine;
pub mod error;
pub mod params;
pub mod settings;

pub use engine::ShortenerEngine;
pub use error::{CreateFailure, EngineError, Result};
pub use params::{CreateParams, ExpirationPolicy};
pub use settings::EngineSettings;
