//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::articles::ArticleId;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

/// Authoritative like counts, one per article.
#[async_trait]
pub trait ArticleCountsRepo: Send + Sync {
    /// Current durable count, or `None` when the article does not exist.
    async fn get_count(&self, id: &ArticleId) -> Result<Option<i64>, RepoError>;

    /// Atomically add `delta` to the stored count, clamping the result at zero.
    ///
    /// Returns `false` when the article does not exist; nothing is written then.
    async fn add_delta(&self, id: &ArticleId, delta: i64) -> Result<bool, RepoError>;

    async fn health_check(&self) -> Result<(), RepoError> {
        Ok(())
    }
}
