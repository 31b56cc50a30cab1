use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("invalid article id: {message}")]
    InvalidArticleId { message: String },
    #[error("counter invariant violated: {message}")]
    Invariant { message: String },
}

impl DomainError {
    pub fn invalid_article_id(message: impl Into<String>) -> Self {
        Self::InvalidArticleId {
            message: message.into(),
        }
    }

    pub fn invariant(message: impl Into<String>) -> Self {
        Self::Invariant {
            message: message.into(),
        }
    }
}
