use axum::Json;
use axum::extract::{Extension, Path, State};
use tracing::warn;

use crate::domain::articles::ArticleId;
use crate::infra::http::HttpState;
use crate::infra::http::middleware::Caller;

use super::error::ApiError;
use super::models::{LikeStatusResponse, LikesResponse};

fn parse_article_id(raw: String) -> Result<ArticleId, ApiError> {
    ArticleId::parse(raw)
        .map_err(|err| ApiError::bad_request("Invalid article id", Some(err.to_string())))
}

pub async fn get_likes(
    State(state): State<HttpState>,
    Path(article_id): Path<String>,
) -> Result<Json<LikesResponse>, ApiError> {
    let id = parse_article_id(article_id)?;
    let likes = state.likes.read(&id).await?;
    Ok(Json(LikesResponse { likes }))
}

pub async fn like_article(
    State(state): State<HttpState>,
    Extension(caller): Extension<Caller>,
    Path(article_id): Path<String>,
) -> Result<Json<LikesResponse>, ApiError> {
    let id = parse_article_id(article_id)?;
    let likes = state.likes.increment(&id).await?;
    // The delta is buffered at this point; a marker failure must not fail the request.
    if let Err(err) = state.likes.mark_liked(&caller.user_id, &id).await {
        warn!(
            target = "kudos::http::likes",
            article_id = %id,
            error = %err,
            "like recorded but marker write failed"
        );
    }
    Ok(Json(LikesResponse { likes }))
}

pub async fn unlike_article(
    State(state): State<HttpState>,
    Extension(caller): Extension<Caller>,
    Path(article_id): Path<String>,
) -> Result<Json<LikesResponse>, ApiError> {
    let id = parse_article_id(article_id)?;
    let likes = state.likes.decrement(&id).await?;
    if let Err(err) = state.likes.clear_liked(&caller.user_id, &id).await {
        warn!(
            target = "kudos::http::likes",
            article_id = %id,
            error = %err,
            "unlike recorded but marker delete failed"
        );
    }
    Ok(Json(LikesResponse { likes }))
}

pub async fn like_status(
    State(state): State<HttpState>,
    Extension(caller): Extension<Caller>,
    Path(article_id): Path<String>,
) -> Result<Json<LikeStatusResponse>, ApiError> {
    let id = parse_article_id(article_id)?;
    let liked = state.likes.has_liked(&caller.user_id, &id).await?;
    Ok(Json(LikeStatusResponse { liked }))
}
