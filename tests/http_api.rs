use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use async_trait::async_trait;
use kudos::application::likes::{LikePolicy, LikeService};
use kudos::cache::{CacheError, CounterCache, InMemoryCounterCache};
use kudos::domain::articles::ArticleId;
use kudos::infra::http::{ApiRateLimiter, HttpState, build_router};
use kudos::infra::memory::InMemoryArticleStore;
use serde_json::{Value, json};
use tower::ServiceExt;

struct App {
    router: Router,
    store: Arc<InMemoryArticleStore>,
}

fn app_with_limit(max_requests: u32) -> App {
    app_with(Arc::new(InMemoryCounterCache::new()), max_requests)
}

fn app_with(cache: Arc<dyn CounterCache>, max_requests: u32) -> App {
    let store = Arc::new(InMemoryArticleStore::new());
    let state = HttpState {
        likes: Arc::new(LikeService::new(
            store.clone(),
            cache,
            LikePolicy::default(),
        )),
        rate_limiter: Arc::new(ApiRateLimiter::new(Duration::from_secs(60), max_requests)),
    };
    App {
        router: build_router(state),
        store,
    }
}

fn app() -> App {
    app_with_limit(100)
}

fn request(method: Method, uri: &str, user: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        builder = builder.header("x-user-id", user);
    }
    builder.body(Body::empty()).unwrap()
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

#[tokio::test]
async fn like_flow_over_http() {
    let app = app();
    app.store.insert(&ArticleId::parse("12345").unwrap(), 10);

    let (status, body) = send(
        &app.router,
        request(Method::GET, "/api/v1/articles/12345/likes", None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "likes": 10 }));

    let (status, body) = send(
        &app.router,
        request(Method::POST, "/api/v1/articles/12345/like", Some("u-1")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "likes": 11 }));

    let (_, body) = send(
        &app.router,
        request(Method::GET, "/api/v1/articles/12345/like-status", Some("u-1")),
    )
    .await;
    assert_eq!(body, json!({ "liked": true }));

    let (_, body) = send(
        &app.router,
        request(Method::GET, "/api/v1/articles/12345/like-status", Some("u-2")),
    )
    .await;
    assert_eq!(body, json!({ "liked": false }));

    let (status, body) = send(
        &app.router,
        request(Method::POST, "/api/v1/articles/12345/unlike", Some("u-1")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "likes": 10 }));

    let (_, body) = send(
        &app.router,
        request(Method::GET, "/api/v1/articles/12345/like-status", Some("u-1")),
    )
    .await;
    assert_eq!(body, json!({ "liked": false }));
}

#[tokio::test]
async fn unknown_article_is_404_with_error_envelope() {
    let app = app();

    let (status, body) = send(
        &app.router,
        request(Method::GET, "/api/v1/articles/nope/likes", None),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "not_found");
    assert_eq!(body["error"]["hint"], "Article with ID nope not found.");
}

#[tokio::test]
async fn blank_article_id_is_400() {
    let app = app();

    let (status, body) = send(
        &app.router,
        request(Method::GET, "/api/v1/articles/%20/likes", None),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "bad_request");
}

#[tokio::test]
async fn writes_require_caller_identity() {
    let app = app();
    app.store.insert(&ArticleId::parse("1").unwrap(), 0);

    for (method, uri) in [
        (Method::POST, "/api/v1/articles/1/like"),
        (Method::POST, "/api/v1/articles/1/unlike"),
        (Method::GET, "/api/v1/articles/1/like-status"),
    ] {
        let (status, body) = send(&app.router, request(method, uri, None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri}");
        assert_eq!(body["error"]["code"], "unauthorized");
    }
    assert_eq!(app.store.count_of(&ArticleId::parse("1").unwrap()), Some(0));
}

#[tokio::test]
async fn like_endpoint_is_rate_limited_per_client() {
    let app = app_with_limit(2);
    app.store.insert(&ArticleId::parse("1").unwrap(), 0);

    for expected in [1, 2] {
        let (status, body) = send(
            &app.router,
            request(Method::POST, "/api/v1/articles/1/like", Some("u-1")),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["likes"], expected);
    }

    let response = app
        .router
        .clone()
        .oneshot(request(Method::POST, "/api/v1/articles/1/like", Some("u-1")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(
        response
            .headers()
            .get(header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok()),
        Some("60")
    );

    let (status, _) = send(
        &app.router,
        request(Method::POST, "/api/v1/articles/1/like", Some("u-2")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &app.router,
        request(Method::POST, "/api/v1/articles/1/unlike", Some("u-1")),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "unlike is not rate limited");
}

#[tokio::test]
async fn status_and_health_probes() {
    let app = app();

    let (status, body) = send(&app.router, request(Method::GET, "/server-status", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let (status, _) = send(&app.router, request(Method::GET, "/health", None)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

/// Cache that counts fine but cannot write or delete plain keys.
struct MarkerlessCache {
    inner: InMemoryCounterCache,
}

#[async_trait]
impl CounterCache for MarkerlessCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        self.inner.get(key).await
    }

    async fn set(&self, _key: &str, _value: &str) -> Result<(), CacheError> {
        Err(CacheError::Backend("READONLY replica".into()))
    }

    async fn set_with_ttl(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        self.inner.set_with_ttl(key, value, ttl).await
    }

    async fn incr_by(&self, key: &str, delta: i64) -> Result<i64, CacheError> {
        self.inner.incr_by(key, delta).await
    }

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, CacheError> {
        self.inner.keys_with_prefix(prefix).await
    }

    async fn delete(&self, _key: &str) -> Result<(), CacheError> {
        Err(CacheError::Backend("READONLY replica".into()))
    }
}

#[tokio::test]
async fn marker_failures_do_not_fail_a_recorded_like() {
    let cache = Arc::new(MarkerlessCache {
        inner: InMemoryCounterCache::new(),
    });
    let app = app_with(cache.clone(), 100);
    let article = ArticleId::parse("1").unwrap();
    app.store.insert(&article, 0);

    for expected in 1..=3 {
        let (status, body) = send(
            &app.router,
            request(Method::POST, "/api/v1/articles/1/like", Some("u-1")),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "likes": expected }));
    }
    assert_eq!(
        cache.get(&article.pending_key()).await.unwrap().as_deref(),
        Some("3"),
        "each request buffers exactly one like"
    );

    let (status, body) = send(
        &app.router,
        request(Method::POST, "/api/v1/articles/1/unlike", Some("u-1")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "likes": 2 }));
    assert_eq!(
        cache.get(&article.pending_key()).await.unwrap().as_deref(),
        Some("2")
    );
}
