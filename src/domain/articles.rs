//! Article identity and the cache key layout shared by the engine and the reconciler.

use std::fmt;

use super::error::DomainError;

/// Prefix shared by every article-scoped cache key.
pub const ARTICLE_KEY_PREFIX: &str = "article:";

const SNAPSHOT_KEY_SUFFIX: &str = ":likes";
/// Suffix marking a pending-delta key.
pub const PENDING_KEY_SUFFIX: &str = ":likeCountTemp";
const LIKE_MARKER_PREFIX: &str = "like:";

/// Opaque caller-supplied article identifier.
///
/// The only rule enforced here is non-emptiness; the format belongs to whoever
/// owns the articles.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArticleId(String);

impl ArticleId {
    pub fn parse(raw: impl Into<String>) -> Result<Self, DomainError> {
        let raw = raw.into();
        if raw.trim().is_empty() {
            return Err(DomainError::invalid_article_id("must not be empty"));
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Key of the time-boxed copy of the durable count.
    pub fn snapshot_key(&self) -> String {
        format!("{ARTICLE_KEY_PREFIX}{}{SNAPSHOT_KEY_SUFFIX}", self.0)
    }

    /// Key of the buffered, not-yet-durable delta.
    pub fn pending_key(&self) -> String {
        format!("{ARTICLE_KEY_PREFIX}{}{PENDING_KEY_SUFFIX}", self.0)
    }

    /// Key recording that `user_id` liked this article.
    pub fn like_marker_key(&self, user_id: &str) -> String {
        format!("{LIKE_MARKER_PREFIX}{user_id}:{}", self.0)
    }

    /// Recover the article id from a pending-delta key.
    ///
    /// Returns `None` for snapshot keys and anything else sharing the prefix.
    pub fn from_pending_key(key: &str) -> Option<Self> {
        let inner = key
            .strip_prefix(ARTICLE_KEY_PREFIX)?
            .strip_suffix(PENDING_KEY_SUFFIX)?;
        Self::parse(inner).ok()
    }
}

impl fmt::Display for ArticleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Count shown to callers: durable count plus buffered delta, never below zero.
pub fn visible_total(authoritative: i64, pending: i64) -> i64 {
    authoritative.saturating_add(pending).max(0)
}

/// Parse a counter value read back from the cache.
pub fn parse_counter(key: &str, raw: &str) -> Result<i64, DomainError> {
    raw.trim()
        .parse::<i64>()
        .map_err(|_| DomainError::invariant(format!("`{key}` holds non-integer value `{raw}`")))
}
