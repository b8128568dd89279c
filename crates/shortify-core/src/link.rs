use crate::shortcode::ShortCode;
use jiff::Timestamp;
use serde::{Deserialize, Serialize};

/// A stored code to target URL mapping.
///
/// A link is written once and never edited. The only state transition is
/// tombstoning, which sets `expires_at` to the moment the link was expired.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShortLink {
    /// The code assigned to this link.
    pub code: ShortCode,
    /// The destination URL.
    pub target: String,
    /// The allocator value `code` was derived from.
    pub sequence: u64,
    /// When the link was created.
    pub created_at: Timestamp,
    /// When the link stops resolving, if ever.
    pub expires_at: Option<Timestamp>,
    /// Opaque owner identifier supplied by the caller.
    pub owner: Option<String>,
    /// Caller-chosen key, unique among live links.
    #[serde(default)]
    pub external_id: Option<String>,
}

impl ShortLink {
    /// Returns `true` once `now` has reached the link's expiry.
    pub fn is_expired_at(&self, now: Timestamp) -> bool {
        self.expires_at.is_some_and(|expires_at| now >= expires_at)
    }

    /// Time left until expiry, measured from `now`.
    ///
    /// Returns `None` for links without expiry and `Some(ZERO)` for links that
    /// have already expired.
    pub fn remaining_ttl(&self, now: Timestamp) -> Option<std::time::Duration> {
        self.expires_at.map(|expires_at| {
            let remaining = expires_at.duration_since(now);
            std::time::Duration::try_from(remaining).unwrap_or(std::time::Duration::ZERO)
        })
    }
}

/// Offset/limit window for listing queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub offset: usize,
    pub limit: usize,
}

impl Page {
    pub fn new(offset: usize, limit: usize) -> Self {
        Self { offset, limit }
    }
}

impl Default for Page {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 50,
        }
    }
}
