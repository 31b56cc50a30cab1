use std::time::Instant;

use axum::{
    body::Body,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{error, warn};
use uuid::Uuid;

use crate::application::error::ErrorReport;

use super::api::error::ApiError;

/// Header carrying the caller identity set by the authenticating proxy.
pub const USER_ID_HEADER: &str = "x-user-id";

#[derive(Clone)]
pub struct RequestContext {
    pub request_id: String,
}

/// Authenticated caller, inserted by [`require_caller`].
#[derive(Clone, Debug)]
pub struct Caller {
    pub user_id: String,
}

impl Caller {
    pub(crate) fn from_request(request: &Request<Body>) -> Option<Self> {
        let user_id = request.headers().get(USER_ID_HEADER)?.to_str().ok()?.trim();
        (!user_id.is_empty()).then(|| Self {
            user_id: user_id.to_string(),
        })
    }
}

pub async fn set_request_context(mut request: Request<Body>, next: Next) -> Response {
    let request_id = Uuid::new_v4().to_string();
    let ctx = RequestContext {
        request_id: request_id.clone(),
    };
    request.extensions_mut().insert(ctx.clone());

    let mut response = next.run(request).await;
    response.extensions_mut().insert(ctx);
    response
}

pub async fn require_caller(mut request: Request<Body>, next: Next) -> Response {
    let Some(caller) = Caller::from_request(&request) else {
        return ApiError::unauthorized().into_response();
    };
    request.extensions_mut().insert(caller);
    next.run(request).await
}

pub async fn log_responses(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();
    let user_id = Caller::from_request(&request).map(|caller| caller.user_id);

    let request_id = request
        .extensions()
        .get::<RequestContext>()
        .map(|ctx| ctx.request_id.clone())
        .unwrap_or_default();

    let mut response = next.run(request).await;
    let status = response.status();

    if status.is_client_error() || status.is_server_error() {
        let elapsed_ms = start.elapsed().as_millis();
        let report = response.extensions_mut().remove::<ErrorReport>();
        let (source, messages) = match report {
            Some(report) => (report.source, report.messages),
            None => ("unknown", Vec::new()),
        };
        let detail = messages
            .first()
            .cloned()
            .unwrap_or_else(|| "no diagnostic available".to_string());

        if status.is_server_error() {
            error!(
                target = "kudos::http::response",
                status = status.as_u16(),
                method = %method,
                path = %uri.path(),
                elapsed_ms = elapsed_ms,
                source = source,
                detail = %detail,
                chain = ?messages,
                request_id = request_id,
                user_id = user_id.as_deref().unwrap_or(""),
                "request failed",
            );
        } else {
            warn!(
                target = "kudos::http::response",
                status = status.as_u16(),
                method = %method,
                path = %uri.path(),
                elapsed_ms = elapsed_ms,
                source = source,
                detail = %detail,
                chain = ?messages,
                request_id = request_id,
                user_id = user_id.as_deref().unwrap_or(""),
                "client request error",
            );
        }
    }

    response
}
