use std::net::SocketAddr;

use axum::body::Body;
use axum::extract::{ConnectInfo, MatchedPath, State};
use axum::http::{HeaderValue, Request};
use axum::middleware::Next;
use axum::response::Response;
use tracing::debug;

use crate::infra::http::HttpState;
use crate::infra::http::middleware::Caller;

use super::error::ApiError;

const RATE_LIMIT_REMAINING_HEADER: &str = "x-ratelimit-remaining";

/// Per-client, per-route sliding window. Clients are identified by user id when
/// present, otherwise by peer address.
pub async fn rate_limit(
    State(state): State<HttpState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());
    let client = client_key(&request);

    let admission = state.rate_limiter.allow(&client, &route);
    if !admission.allowed {
        debug!(
            target = "kudos::http::rate_limit",
            client = %client,
            route = %route,
            limit = state.rate_limiter.limit(),
            "rate limit exceeded"
        );
        return ApiError::rate_limited(state.rate_limiter.retry_after_secs());
    }

    let mut response = next.run(request).await;
    response.headers_mut().insert(
        RATE_LIMIT_REMAINING_HEADER,
        HeaderValue::from(admission.remaining),
    );
    response
}

fn client_key(request: &Request<Body>) -> String {
    if let Some(caller) = Caller::from_request(request) {
        return format!("user:{}", caller.user_id);
    }
    match request.extensions().get::<ConnectInfo<SocketAddr>>() {
        Some(ConnectInfo(addr)) => format!("ip:{}", addr.ip()),
        None => "anonymous".to_string(),
    }
}
