//! Like counter engine: cache-aside reads and buffered writes.
//!
//! Reads are served from a short-lived snapshot of the durable count and may be
//! up to one TTL stale. Writes never touch the durable store; they adjust a
//! pending delta in the cache with an atomic increment and return the durable
//! count plus that delta, so a caller always sees its own write in the
//! response. The reconciler later folds pending deltas into the durable store.

use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use thiserror::Error;
use tracing::{debug, warn};

use crate::application::deadline::{DeadlineExceeded, with_deadline};
use crate::application::repos::{ArticleCountsRepo, RepoError};
use crate::cache::{CacheError, CounterCache};
use crate::domain::articles::{ArticleId, parse_counter, visible_total};
use crate::domain::error::DomainError;

pub const DEFAULT_SNAPSHOT_TTL: Duration = Duration::from_secs(5);
pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(2);

const LIKE_MARKER_VALUE: &str = "1";

#[derive(Debug, Error)]
pub enum LikeError {
    #[error("article `{article_id}` not found")]
    NotFound { article_id: ArticleId },
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Store(RepoError),
    #[error(transparent)]
    Cache(CacheError),
    #[error(transparent)]
    Deadline(#[from] DeadlineExceeded),
}

/// Coarse classification callers branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LikeErrorKind {
    NotFound,
    InvalidArticleId,
    /// Adapter failure or timeout; safe to retry from the caller's side.
    Transient,
    Invariant,
}

impl LikeError {
    pub fn kind(&self) -> LikeErrorKind {
        match self {
            LikeError::NotFound { .. } => LikeErrorKind::NotFound,
            LikeError::Domain(DomainError::InvalidArticleId { .. }) => {
                LikeErrorKind::InvalidArticleId
            }
            LikeError::Domain(DomainError::Invariant { .. }) => LikeErrorKind::Invariant,
            LikeError::Store(_) | LikeError::Cache(_) | LikeError::Deadline(_) => {
                LikeErrorKind::Transient
            }
        }
    }

    pub fn is_transient(&self) -> bool {
        self.kind() == LikeErrorKind::Transient
    }
}

impl From<RepoError> for LikeError {
    fn from(err: RepoError) -> Self {
        LikeError::Store(err)
    }
}

impl From<CacheError> for LikeError {
    fn from(err: CacheError) -> Self {
        match err {
            CacheError::NotAnInteger { key } => LikeError::Domain(DomainError::invariant(
                format!("`{key}` holds a non-integer value"),
            )),
            other => LikeError::Cache(other),
        }
    }
}

/// Tunables for the engine.
#[derive(Debug, Clone, Copy)]
pub struct LikePolicy {
    /// Lifetime of a cached snapshot of the durable count.
    pub snapshot_ttl: Duration,
    /// Deadline applied to every individual adapter call.
    pub operation_timeout: Duration,
}

impl Default for LikePolicy {
    fn default() -> Self {
        Self {
            snapshot_ttl: DEFAULT_SNAPSHOT_TTL,
            operation_timeout: DEFAULT_OPERATION_TIMEOUT,
        }
    }
}

#[derive(Clone)]
pub struct LikeService {
    counts: Arc<dyn ArticleCountsRepo>,
    cache: Arc<dyn CounterCache>,
    policy: LikePolicy,
}

impl LikeService {
    pub fn new(
        counts: Arc<dyn ArticleCountsRepo>,
        cache: Arc<dyn CounterCache>,
        policy: LikePolicy,
    ) -> Self {
        Self {
            counts,
            cache,
            policy,
        }
    }

    /// Current like count, possibly up to one snapshot TTL stale.
    pub async fn read(&self, id: &ArticleId) -> Result<i64, LikeError> {
        let key = id.snapshot_key();
        let deadline = self.policy.operation_timeout;

        if let Some(raw) = with_deadline(deadline, "cache.get", self.cache.get(&key)).await?? {
            match parse_counter(&key, &raw) {
                Ok(count) => {
                    counter!("kudos_likes_snapshot_hit_total").increment(1);
                    debug!(target = "kudos::likes", article_id = %id, count, "snapshot hit");
                    return Ok(count);
                }
                Err(err) => {
                    warn!(
                        target = "kudos::likes",
                        article_id = %id,
                        error = %err,
                        "ignoring unreadable snapshot"
                    );
                }
            }
        }

        counter!("kudos_likes_snapshot_miss_total").increment(1);
        let count = self.authoritative_count(id).await?;

        with_deadline(
            deadline,
            "cache.set_with_ttl",
            self.cache
                .set_with_ttl(&key, &count.to_string(), self.policy.snapshot_ttl),
        )
        .await??;

        debug!(target = "kudos::likes", article_id = %id, count, "snapshot refreshed");
        Ok(count)
    }

    /// Buffer a like and return the total including the caller's own write.
    pub async fn increment(&self, id: &ArticleId) -> Result<i64, LikeError> {
        self.apply(id, 1, "increment").await
    }

    /// Buffer an unlike; the returned total never goes below zero.
    pub async fn decrement(&self, id: &ArticleId) -> Result<i64, LikeError> {
        self.apply(id, -1, "decrement").await
    }

    async fn apply(&self, id: &ArticleId, step: i64, op: &'static str) -> Result<i64, LikeError> {
        // Fresh durable read: write responses must not be built on a stale snapshot.
        let authoritative = self.authoritative_count(id).await?;

        let pending = with_deadline(
            self.policy.operation_timeout,
            "cache.incr_by",
            self.cache.incr_by(&id.pending_key(), step),
        )
        .await??;

        counter!("kudos_likes_write_total", "op" => op).increment(1);
        let total = visible_total(authoritative, pending);
        debug!(
            target = "kudos::likes",
            article_id = %id,
            op,
            authoritative,
            pending,
            total,
            "buffered like delta"
        );
        Ok(total)
    }

    async fn authoritative_count(&self, id: &ArticleId) -> Result<i64, LikeError> {
        with_deadline(
            self.policy.operation_timeout,
            "store.get_count",
            self.counts.get_count(id),
        )
        .await??
        .ok_or_else(|| LikeError::NotFound {
            article_id: id.clone(),
        })
    }

    pub async fn mark_liked(&self, user_id: &str, id: &ArticleId) -> Result<(), LikeError> {
        with_deadline(
            self.policy.operation_timeout,
            "cache.set",
            self.cache
                .set(&id.like_marker_key(user_id), LIKE_MARKER_VALUE),
        )
        .await??;
        Ok(())
    }

    pub async fn clear_liked(&self, user_id: &str, id: &ArticleId) -> Result<(), LikeError> {
        with_deadline(
            self.policy.operation_timeout,
            "cache.delete",
            self.cache.delete(&id.like_marker_key(user_id)),
        )
        .await??;
        Ok(())
    }

    pub async fn has_liked(&self, user_id: &str, id: &ArticleId) -> Result<bool, LikeError> {
        let marker = with_deadline(
            self.policy.operation_timeout,
            "cache.get",
            self.cache.get(&id.like_marker_key(user_id)),
        )
        .await??;
        Ok(marker.is_some())
    }

    /// Probe both adapters.
    pub async fn health_check(&self) -> Result<(), LikeError> {
        let deadline = self.policy.operation_timeout;
        with_deadline(deadline, "store.health_check", self.counts.health_check()).await??;
        with_deadline(deadline, "cache.health_check", self.cache.health_check()).await??;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::cache::InMemoryCounterCache;
    use crate::infra::memory::InMemoryArticleStore;

    fn service(store: Arc<InMemoryArticleStore>, cache: Arc<InMemoryCounterCache>) -> LikeService {
        LikeService::new(store, cache, LikePolicy::default())
    }

    fn id(raw: &str) -> ArticleId {
        ArticleId::parse(raw).expect("valid id")
    }

    #[tokio::test]
    async fn read_miss_fills_snapshot_with_ttl() {
        let store = Arc::new(InMemoryArticleStore::new());
        store.insert(&id("12345"), 15);
        let cache = Arc::new(InMemoryCounterCache::new());
        let likes = service(store.clone(), cache.clone());

        assert_eq!(likes.read(&id("12345")).await.unwrap(), 15);
        assert_eq!(
            cache.get("article:12345:likes").await.unwrap().as_deref(),
            Some("15")
        );
        assert_eq!(store.count_reads(), 1);
    }

    #[tokio::test]
    async fn read_hit_skips_durable_store() {
        let store = Arc::new(InMemoryArticleStore::new());
        let cache = Arc::new(InMemoryCounterCache::new());
        cache
            .set_with_ttl("article:12345:likes", "10", DEFAULT_SNAPSHOT_TTL)
            .await
            .unwrap();
        let likes = service(store.clone(), cache);

        assert_eq!(likes.read(&id("12345")).await.unwrap(), 10);
        assert_eq!(store.count_reads(), 0);
    }

    #[tokio::test]
    async fn unreadable_snapshot_falls_back_to_store() {
        let store = Arc::new(InMemoryArticleStore::new());
        store.insert(&id("12345"), 3);
        let cache = Arc::new(InMemoryCounterCache::new());
        cache
            .set_with_ttl("article:12345:likes", "NaN", DEFAULT_SNAPSHOT_TTL)
            .await
            .unwrap();
        let likes = service(store, cache.clone());

        assert_eq!(likes.read(&id("12345")).await.unwrap(), 3);
        assert_eq!(
            cache.get("article:12345:likes").await.unwrap().as_deref(),
            Some("3")
        );
    }

    #[tokio::test]
    async fn missing_article_leaves_cache_untouched() {
        let store = Arc::new(InMemoryArticleStore::new());
        let cache = Arc::new(InMemoryCounterCache::new());
        let likes = service(store, cache.clone());

        let err = likes.read(&id("ghost")).await.expect_err("unknown article");
        assert_eq!(err.kind(), LikeErrorKind::NotFound);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn pending_overflow_is_transient() {
        let store = Arc::new(InMemoryArticleStore::new());
        store.insert(&id("12345"), 0);
        let cache = Arc::new(InMemoryCounterCache::new());
        cache
            .set("article:12345:likeCountTemp", &i64::MAX.to_string())
            .await
            .unwrap();
        let likes = service(store, cache);

        let err = likes.increment(&id("12345")).await.expect_err("overflow");
        assert_eq!(err.kind(), LikeErrorKind::Transient);
    }

    #[tokio::test]
    async fn increment_returns_durable_plus_pending() {
        let store = Arc::new(InMemoryArticleStore::new());
        store.insert(&id("12345"), 10);
        let cache = Arc::new(InMemoryCounterCache::new());
        cache.incr_by("article:12345:likeCountTemp", 4).await.unwrap();
        let likes = service(store, cache.clone());

        assert_eq!(likes.increment(&id("12345")).await.unwrap(), 15);
        assert_eq!(
            cache
                .get("article:12345:likeCountTemp")
                .await
                .unwrap()
                .as_deref(),
            Some("5")
        );
    }

    #[tokio::test]
    async fn decrement_never_reports_negative_totals() {
        let store = Arc::new(InMemoryArticleStore::new());
        store.insert(&id("zero"), 0);
        let cache = Arc::new(InMemoryCounterCache::new());
        let likes = service(store, cache.clone());

        assert_eq!(likes.decrement(&id("zero")).await.unwrap(), 0);
        assert_eq!(likes.decrement(&id("zero")).await.unwrap(), 0);
        assert_eq!(
            cache
                .get("article:zero:likeCountTemp")
                .await
                .unwrap()
                .as_deref(),
            Some("-2")
        );
        assert_eq!(likes.increment(&id("zero")).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn writes_on_unknown_articles_do_not_buffer_deltas() {
        let store = Arc::new(InMemoryArticleStore::new());
        let cache = Arc::new(InMemoryCounterCache::new());
        let likes = service(store, cache.clone());

        for result in [
            likes.increment(&id("ghost")).await,
            likes.decrement(&id("ghost")).await,
        ] {
            assert_eq!(result.expect_err("unknown").kind(), LikeErrorKind::NotFound);
        }
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn corrupted_pending_delta_is_an_invariant_violation() {
        let store = Arc::new(InMemoryArticleStore::new());
        store.insert(&id("12345"), 1);
        let cache = Arc::new(InMemoryCounterCache::new());
        cache.set("article:12345:likeCountTemp", "oops").await.unwrap();
        let likes = service(store, cache);

        let err = likes.increment(&id("12345")).await.expect_err("corrupt");
        assert_eq!(err.kind(), LikeErrorKind::Invariant);
    }

    struct StalledCache {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl CounterCache for StalledCache {
        async fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            std::future::pending().await
        }

        async fn set(&self, _key: &str, _value: &str) -> Result<(), CacheError> {
            std::future::pending().await
        }

        async fn set_with_ttl(
            &self,
            _key: &str,
            _value: &str,
            _ttl: Duration,
        ) -> Result<(), CacheError> {
            std::future::pending().await
        }

        async fn incr_by(&self, _key: &str, _delta: i64) -> Result<i64, CacheError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            std::future::pending().await
        }

        async fn keys_with_prefix(&self, _prefix: &str) -> Result<Vec<String>, CacheError> {
            std::future::pending().await
        }

        async fn delete(&self, _key: &str) -> Result<(), CacheError> {
            std::future::pending().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_adapter_calls_fail_as_transient_without_retry() {
        let store = Arc::new(InMemoryArticleStore::new());
        store.insert(&id("12345"), 1);
        let cache = Arc::new(StalledCache {
            calls: AtomicUsize::new(0),
        });
        let likes = LikeService::new(
            store,
            cache.clone(),
            LikePolicy {
                operation_timeout: Duration::from_millis(100),
                ..LikePolicy::default()
            },
        );

        let err = likes.increment(&id("12345")).await.expect_err("timeout");
        assert!(err.is_transient());
        assert!(matches!(err, LikeError::Deadline(_)));
        assert_eq!(cache.calls.load(Ordering::SeqCst), 1);

        let err = likes.read(&id("12345")).await.expect_err("timeout");
        assert!(err.is_transient());
        assert_eq!(cache.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn like_markers_track_per_user_status() {
        let store = Arc::new(InMemoryArticleStore::new());
        let cache = Arc::new(InMemoryCounterCache::new());
        let likes = service(store, cache);
        let article = id("12345");

        assert!(!likes.has_liked("u-1", &article).await.unwrap());
        likes.mark_liked("u-1", &article).await.unwrap();
        assert!(likes.has_liked("u-1", &article).await.unwrap());
        assert!(!likes.has_liked("u-2", &article).await.unwrap());
        likes.clear_liked("u-1", &article).await.unwrap();
        assert!(!likes.has_liked("u-1", &article).await.unwrap());
    }
}
