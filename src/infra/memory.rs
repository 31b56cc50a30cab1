//! In-process durable-store stand-in for tests and local runs.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;

use crate::application::repos::{ArticleCountsRepo, RepoError};
use crate::domain::articles::ArticleId;

#[derive(Default)]
pub struct InMemoryArticleStore {
    counts: DashMap<String, i64>,
    count_reads: AtomicUsize,
}

impl InMemoryArticleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, id: &ArticleId, likes: i64) {
        self.counts.insert(id.as_str().to_string(), likes.max(0));
    }

    pub fn remove(&self, id: &ArticleId) {
        self.counts.remove(id.as_str());
    }

    /// Stored count, read without touching the read counter.
    pub fn count_of(&self, id: &ArticleId) -> Option<i64> {
        self.counts.get(id.as_str()).map(|entry| *entry)
    }

    /// Number of `get_count` calls served so far.
    pub fn count_reads(&self) -> usize {
        self.count_reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ArticleCountsRepo for InMemoryArticleStore {
    async fn get_count(&self, id: &ArticleId) -> Result<Option<i64>, RepoError> {
        self.count_reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.count_of(id))
    }

    async fn add_delta(&self, id: &ArticleId, delta: i64) -> Result<bool, RepoError> {
        match self.counts.get_mut(id.as_str()) {
            Some(mut likes) => {
                *likes = likes.saturating_add(delta).max(0);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn add_delta_clamps_at_zero_and_reports_missing_rows() {
        let store = InMemoryArticleStore::new();
        let id = ArticleId::parse("a").unwrap();
        store.insert(&id, 2);

        assert!(store.add_delta(&id, -5).await.unwrap());
        assert_eq!(store.count_of(&id), Some(0));
        assert!(store.add_delta(&id, 3).await.unwrap());
        assert_eq!(store.get_count(&id).await.unwrap(), Some(3));
        assert_eq!(store.count_reads(), 1);

        let missing = ArticleId::parse("missing").unwrap();
        assert!(!store.add_delta(&missing, 1).await.unwrap());
        assert_eq!(store.count_of(&missing), None);
    }
}
