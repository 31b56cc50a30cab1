pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod rate_limit;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};

use crate::infra::http::HttpState;
use crate::infra::http::middleware::require_caller;

const LIKES_PATH: &str = "/api/v1/articles/{article_id}/likes";
const LIKE_PATH: &str = "/api/v1/articles/{article_id}/like";
const UNLIKE_PATH: &str = "/api/v1/articles/{article_id}/unlike";
const LIKE_STATUS_PATH: &str = "/api/v1/articles/{article_id}/like-status";

pub fn build_api_router(state: HttpState) -> Router<HttpState> {
    let read = Router::new()
        .route(LIKES_PATH, get(handlers::get_likes))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::rate_limit,
        ));

    // Rate limiting runs before the identity check.
    let like = Router::new()
        .route(LIKE_PATH, post(handlers::like_article))
        .route_layer(axum_middleware::from_fn(require_caller))
        .route_layer(axum_middleware::from_fn_with_state(
            state,
            middleware::rate_limit,
        ));

    let identified = Router::new()
        .route(UNLIKE_PATH, post(handlers::unlike_article))
        .route(LIKE_STATUS_PATH, get(handlers::like_status))
        .route_layer(axum_middleware::from_fn(require_caller));

    read.merge(like).merge(identified)
}
