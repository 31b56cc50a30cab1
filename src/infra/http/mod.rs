//! HTTP surface: the like API plus status and health probes.

pub mod api;
mod middleware;

pub use api::rate_limit::ApiRateLimiter;
pub use middleware::{Caller, RequestContext};

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    middleware as axum_middleware,
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Serialize;

use crate::application::error::ErrorReport;
use crate::application::likes::{LikeError, LikeService};

use middleware::{log_responses, set_request_context};

#[derive(Clone)]
pub struct HttpState {
    pub likes: Arc<LikeService>,
    pub rate_limiter: Arc<ApiRateLimiter>,
}

pub fn build_router(state: HttpState) -> Router {
    Router::new()
        .route("/server-status", get(server_status))
        .route("/health", get(health))
        .merge(api::build_api_router(state.clone()))
        .with_state(state)
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn(set_request_context))
}

#[derive(Debug, Serialize)]
struct ServerStatus {
    success: bool,
    message: &'static str,
}

async fn server_status() -> Json<ServerStatus> {
    Json(ServerStatus {
        success: true,
        message: "Server is up and running",
    })
}

async fn health(State(state): State<HttpState>) -> Response {
    health_response(state.likes.health_check().await)
}

fn health_response(result: Result<(), LikeError>) -> Response {
    match result {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            let mut response = StatusCode::SERVICE_UNAVAILABLE.into_response();
            ErrorReport::from_error(
                "infra::http::health",
                StatusCode::SERVICE_UNAVAILABLE,
                &err,
            )
            .attach(&mut response);
            response
        }
    }
}
