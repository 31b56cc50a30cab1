//! Redis adapter tests.
//!
//! - Require `REDIS_URL` (defaults to `redis://127.0.0.1:6379`) on a disposable instance.
//! - Marked `#[ignore]`; run with `cargo test -- --ignored`.

use std::time::Duration;

use kudos::cache::{CacheError, CounterCache};
use kudos::infra::redis::RedisCounterCache;
use uuid::Uuid;

type TestResult<T> = Result<T, Box<dyn std::error::Error>>;

async fn connect() -> TestResult<RedisCounterCache> {
    let url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());
    Ok(RedisCounterCache::connect(&url).await?)
}

fn unique_prefix() -> String {
    format!("article:live-{}", Uuid::new_v4())
}

#[tokio::test]
#[ignore]
async fn live_redis_counters_and_scan() -> TestResult<()> {
    let cache = connect().await?;
    cache.health_check().await?;
    let prefix = unique_prefix();
    let pending = format!("{prefix}:likeCountTemp");
    let snapshot = format!("{prefix}:likes");

    assert_eq!(cache.incr_by(&pending, 1).await?, 1);
    assert_eq!(cache.incr_by(&pending, -3).await?, -2);
    cache
        .set_with_ttl(&snapshot, "10", Duration::from_secs(5))
        .await?;

    let mut keys = cache.keys_with_prefix(&prefix).await?;
    keys.sort();
    assert_eq!(keys, vec![pending.clone(), snapshot.clone()]);
    assert_eq!(
        cache.keys_matching(&prefix, ":likeCountTemp").await?,
        vec![pending.clone()]
    );

    cache.delete(&pending).await?;
    cache.delete(&snapshot).await?;
    assert!(cache.get(&pending).await?.is_none());
    Ok(())
}

#[tokio::test]
#[ignore]
async fn live_redis_rejects_incr_on_garbage() -> TestResult<()> {
    let cache = connect().await?;
    let key = format!("{}:likeCountTemp", unique_prefix());
    cache.set(&key, "lots").await?;

    let err = cache.incr_by(&key, 1).await.expect_err("not an integer");
    assert!(matches!(err, CacheError::NotAnInteger { .. }));

    cache.delete(&key).await?;
    Ok(())
}

#[tokio::test]
#[ignore]
async fn live_redis_snapshot_expires() -> TestResult<()> {
    let cache = connect().await?;
    let key = format!("{}:likes", unique_prefix());
    cache
        .set_with_ttl(&key, "7", Duration::from_secs(1))
        .await?;
    assert_eq!(cache.get(&key).await?.as_deref(), Some("7"));

    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert!(cache.get(&key).await?.is_none());
    Ok(())
}
