//! Redis-backed counter cache.
//!
//! Uses a multiplexed `ConnectionManager`, which reconnects on its own after a
//! dropped connection. Key enumeration walks the keyspace with `SCAN`; `KEYS`
//! is never issued.

use std::time::Duration;

use async_trait::async_trait;
use redis::{AsyncCommands, Client, RedisError, aio::ConnectionManager};
use tracing::debug;

use crate::cache::{CacheError, CounterCache};

const SCAN_BATCH: usize = 500;

#[derive(Clone)]
pub struct RedisCounterCache {
    manager: ConnectionManager,
}

impl RedisCounterCache {
    pub async fn connect(url: &str) -> Result<Self, CacheError> {
        let client = Client::open(url).map_err(map_redis_error)?;
        let manager = ConnectionManager::new(client)
            .await
            .map_err(map_redis_error)?;
        debug!(target = "kudos::infra::redis", "redis connection manager ready");
        Ok(Self { manager })
    }

    fn conn(&self) -> ConnectionManager {
        self.manager.clone()
    }

    async fn scan(&self, pattern: &str) -> Result<Vec<String>, CacheError> {
        let mut conn = self.conn();
        let mut cursor: u64 = 0;
        let mut keys = Vec::new();

        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await
                .map_err(map_redis_error)?;
            keys.extend(batch);
            if next == 0 {
                break;
            }
            cursor = next;
        }

        // SCAN may return a key more than once across batches.
        keys.sort();
        keys.dedup();
        Ok(keys)
    }
}

#[async_trait]
impl CounterCache for RedisCounterCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.conn();
        let value: Option<String> = conn.get(key).await.map_err(map_redis_error)?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), CacheError> {
        let mut conn = self.conn();
        let _: () = conn.set(key, value).await.map_err(map_redis_error)?;
        Ok(())
    }

    async fn set_with_ttl(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let mut conn = self.conn();
        let seconds = ttl.as_secs().max(1);
        let _: () = conn
            .set_ex(key, value, seconds)
            .await
            .map_err(map_redis_error)?;
        Ok(())
    }

    async fn incr_by(&self, key: &str, delta: i64) -> Result<i64, CacheError> {
        let mut conn = self.conn();
        conn.incr(key, delta).await.map_err(|err| {
            if is_not_an_integer(&err) {
                CacheError::NotAnInteger {
                    key: key.to_string(),
                }
            } else {
                map_redis_error(err)
            }
        })
    }

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, CacheError> {
        self.scan(&format!("{}*", escape_glob(prefix))).await
    }

    async fn keys_matching(
        &self,
        prefix: &str,
        suffix: &str,
    ) -> Result<Vec<String>, CacheError> {
        self.scan(&match_pattern(prefix, suffix)).await
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.conn();
        let _: () = conn.del(key).await.map_err(map_redis_error)?;
        Ok(())
    }

    async fn health_check(&self) -> Result<(), CacheError> {
        let mut conn = self.conn();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(map_redis_error)?;
        Ok(())
    }
}

fn map_redis_error(err: RedisError) -> CacheError {
    if err.is_timeout() {
        CacheError::Timeout
    } else {
        CacheError::backend(err)
    }
}

fn is_not_an_integer(err: &RedisError) -> bool {
    err.to_string().contains("not an integer")
}

fn match_pattern(prefix: &str, suffix: &str) -> String {
    format!("{}*{}", escape_glob(prefix), escape_glob(suffix))
}

/// Escape `SCAN MATCH` glob metacharacters so the prefix matches literally.
fn escape_glob(prefix: &str) -> String {
    let mut escaped = String::with_capacity(prefix.len());
    for ch in prefix.chars() {
        if matches!(ch, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}
