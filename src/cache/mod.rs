//! Fast volatile cache in front of the durable counts.
//!
//! The cache holds two kinds of article-scoped entries:
//!
//! - **Snapshots** (`article:{id}:likes`): a copy of the durable count with a
//!   short TTL, written on read misses.
//! - **Pending deltas** (`article:{id}:likeCountTemp`): integers adjusted with
//!   atomic increments on every like/unlike and folded into the durable store
//!   by the reconciler.
//!
//! Redis is the production backend (`infra::redis`). [`InMemoryCounterCache`]
//! serves tests and single-process development setups (`cache.url = "memory://"`).

mod lock;
mod store;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub use store::InMemoryCounterCache;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend error: {0}")]
    Backend(String),
    #[error("cache operation timed out")]
    Timeout,
    #[error("cache value at `{key}` is not an integer")]
    NotAnInteger { key: String },
}

impl CacheError {
    pub fn backend(err: impl std::fmt::Display) -> Self {
        Self::Backend(err.to_string())
    }
}

/// Operations the like engine needs from the volatile cache.
///
/// Every mutation of a counter goes through [`CounterCache::incr_by`]; callers
/// never read a counter and write it back.
#[async_trait]
pub trait CounterCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Store a value without expiry.
    async fn set(&self, key: &str, value: &str) -> Result<(), CacheError>;

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration)
    -> Result<(), CacheError>;

    /// Atomically add `delta`, creating the key at zero first. Returns the new value.
    async fn incr_by(&self, key: &str, delta: i64) -> Result<i64, CacheError>;

    /// Enumerate live keys starting with `prefix`. Linear in the keyspace.
    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, CacheError>;

    /// Enumerate live keys shaped `{prefix}*{suffix}`.
    async fn keys_matching(
        &self,
        prefix: &str,
        suffix: &str,
    ) -> Result<Vec<String>, CacheError> {
        let mut keys = self.keys_with_prefix(prefix).await?;
        keys.retain(|key| key.len() >= prefix.len() + suffix.len() && key.ends_with(suffix));
        Ok(keys)
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError>;

    async fn health_check(&self) -> Result<(), CacheError> {
        Ok(())
    }
}
