use jiff::{SignedDuration, Timestamp};
use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

/// When a newly created link stops resolving.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExpirationPolicy {
    /// The link never expires.
    #[default]
    Never,
    /// The link expires this long after creation.
    AfterDuration(SignedDuration),
    /// The link expires at a specific timestamp.
    AtTimestamp(Timestamp),
}

/// Input to [`ShortenerEngine::create`](crate::ShortenerEngine::create).
///
/// `target` is expected to be validated and sanitized by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TypedBuilder)]
pub struct CreateParams {
    /// The destination URL.
    #[builder(setter(into))]
    pub target: String,
    #[builder(default)]
    pub expiration: ExpirationPolicy,
    /// Opaque owner identifier, used for listing.
    #[builder(default, setter(strip_option, into))]
    pub owner: Option<String>,
    /// Caller-chosen key for later lookup, unique among live links.
    #[builder(default, setter(strip_option, into))]
    pub external_id: Option<String>,
}

impl CreateParams {
    /// A never-expiring, unowned link to `target`.
    pub fn new(target: impl Into<String>) -> Self {
        Self::builder().target(target).build()
    }
}
