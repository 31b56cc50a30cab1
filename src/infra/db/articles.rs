use async_trait::async_trait;

use crate::{
    application::repos::{ArticleCountsRepo, RepoError},
    domain::articles::ArticleId,
};

use super::{PostgresRepositories, map_sqlx_error};

impl PostgresRepositories {
    /// Create an article row, or reset the count of an existing one.
    pub async fn upsert_article(&self, id: &ArticleId, likes: i64) -> Result<(), RepoError> {
        sqlx::query(
            r#"
            INSERT INTO articles (id, likes)
            VALUES ($1, $2)
            ON CONFLICT (id) DO UPDATE SET likes = EXCLUDED.likes, updated_at = now()
            "#,
        )
        .bind(id.as_str())
        .bind(likes)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        Ok(())
    }
}

#[async_trait]
impl ArticleCountsRepo for PostgresRepositories {
    async fn get_count(&self, id: &ArticleId) -> Result<Option<i64>, RepoError> {
        sqlx::query_scalar::<_, i64>("SELECT likes FROM articles WHERE id = $1")
            .bind(id.as_str())
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)
    }

    async fn add_delta(&self, id: &ArticleId, delta: i64) -> Result<bool, RepoError> {
        let result = sqlx::query(
            r#"
            UPDATE articles
            SET likes = GREATEST(likes + $2, 0),
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id.as_str())
        .bind(delta)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn health_check(&self) -> Result<(), RepoError> {
        self.ping().await.map_err(map_sqlx_error)
    }
}
