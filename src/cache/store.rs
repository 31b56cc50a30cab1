//! In-process counter cache with per-key expiry.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use super::lock::mutex_lock;
use super::{CacheError, CounterCache};

const SOURCE: &str = "cache::store";

struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|deadline| now < deadline)
    }
}

fn purge_expired(entries: &mut HashMap<String, Entry>, now: Instant) {
    entries.retain(|_, entry| entry.is_live(now));
}

/// Volatile cache living in process memory.
///
/// Expiry uses the tokio clock, so paused-time tests can step past TTLs.
#[derive(Default)]
pub struct InMemoryCounterCache {
    entries: Mutex<HashMap<String, Entry>>,
}

impl InMemoryCounterCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        let mut entries = mutex_lock(&self.entries, SOURCE, "len");
        purge_expired(&mut entries, Instant::now());
        entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CounterCache for InMemoryCounterCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let now = Instant::now();
        let mut entries = mutex_lock(&self.entries, SOURCE, "get");
        match entries.get(key) {
            Some(entry) if entry.is_live(now) => Ok(Some(entry.value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), CacheError> {
        mutex_lock(&self.entries, SOURCE, "set").insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: None,
            },
        );
        Ok(())
    }

    async fn set_with_ttl(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        mutex_lock(&self.entries, SOURCE, "set_with_ttl").insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: Some(Instant::now() + ttl),
            },
        );
        Ok(())
    }

    async fn incr_by(&self, key: &str, delta: i64) -> Result<i64, CacheError> {
        let now = Instant::now();
        let mut entries = mutex_lock(&self.entries, SOURCE, "incr_by");

        let (current, expires_at) = match entries.get(key) {
            Some(entry) if entry.is_live(now) => {
                let current = entry.value.parse::<i64>().map_err(|_| {
                    CacheError::NotAnInteger {
                        key: key.to_string(),
                    }
                })?;
                (current, entry.expires_at)
            }
            _ => (0, None),
        };

        let next = current.checked_add(delta).ok_or_else(|| {
            CacheError::Backend(format!("increment or decrement would overflow at `{key}`"))
        })?;
        entries.insert(
            key.to_string(),
            Entry {
                value: next.to_string(),
                expires_at,
            },
        );
        Ok(next)
    }

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, CacheError> {
        let mut entries = mutex_lock(&self.entries, SOURCE, "keys_with_prefix");
        purge_expired(&mut entries, Instant::now());
        let mut keys: Vec<String> = entries
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        mutex_lock(&self.entries, SOURCE, "delete").remove(key);
        Ok(())
    }
}
