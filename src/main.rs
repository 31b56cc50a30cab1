use std::{net::SocketAddr, process, sync::Arc};

use kudos::{
    application::{
        error::AppError,
        jobs::{Reconciler, spawn_reconciler},
        likes::{LikePolicy, LikeService},
        repos::ArticleCountsRepo,
    },
    cache::{CounterCache, InMemoryCounterCache},
    config::{self, CacheBackend},
    domain::articles::ArticleId,
    infra::{
        db::PostgresRepositories,
        error::InfraError,
        http::{self, ApiRateLimiter, HttpState},
        redis::RedisCounterCache,
        telemetry,
    },
};
use serde_json::json;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Reconcile(_) => run_reconcile(settings).await,
        config::Command::Count(args) => {
            run_article_command(settings, &args.article_id, ArticleOp::Count).await
        }
        config::Command::Like(args) => {
            run_article_command(settings, &args.article_id, ArticleOp::Like).await
        }
        config::Command::Unlike(args) => {
            run_article_command(settings, &args.article_id, ArticleOp::Unlike).await
        }
    }
}

struct Adapters {
    counts: Arc<dyn ArticleCountsRepo>,
    cache: Arc<dyn CounterCache>,
}

async fn init_adapters(settings: &config::Settings) -> Result<Adapters, AppError> {
    let database_url = settings
        .database
        .url
        .as_deref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))
        .map_err(AppError::from)?;

    let pool =
        PostgresRepositories::connect(database_url, settings.database.max_connections.get())
            .await
            .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    let cache: Arc<dyn CounterCache> = match &settings.cache.backend {
        CacheBackend::Redis { url } => Arc::new(
            RedisCounterCache::connect(url)
                .await
                .map_err(|err| AppError::from(InfraError::cache(err.to_string())))?,
        ),
        CacheBackend::Memory => {
            warn!(
                target = "kudos::bootstrap",
                "using in-process cache; pending likes are lost on exit"
            );
            Arc::new(InMemoryCounterCache::new())
        }
    };

    Ok(Adapters {
        counts: Arc::new(PostgresRepositories::new(pool)),
        cache,
    })
}

fn like_service(adapters: &Adapters, settings: &config::Settings) -> LikeService {
    LikeService::new(
        adapters.counts.clone(),
        adapters.cache.clone(),
        LikePolicy {
            snapshot_ttl: settings.cache.snapshot_ttl,
            operation_timeout: settings.cache.operation_timeout,
        },
    )
}

fn reconciler(adapters: &Adapters, settings: &config::Settings) -> Reconciler {
    Reconciler::new(
        adapters.counts.clone(),
        adapters.cache.clone(),
        settings.cache.operation_timeout,
    )
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let adapters = init_adapters(&settings).await?;

    let reconciler_handle = spawn_reconciler(
        Arc::new(reconciler(&adapters, &settings)),
        settings.reconciler.interval,
    );

    let state = HttpState {
        likes: Arc::new(like_service(&adapters, &settings)),
        rate_limiter: Arc::new(ApiRateLimiter::new(
            std::time::Duration::from_secs(settings.rate_limit.window_seconds.get().into()),
            settings.rate_limit.max_requests.get(),
        )),
    };

    let result = serve_http(&settings, state).await;

    info!(target = "kudos::serve", "draining reconciler");
    if tokio::time::timeout(settings.server.graceful_shutdown, reconciler_handle.shutdown())
        .await
        .is_err()
    {
        warn!(
            target = "kudos::serve",
            timeout_secs = settings.server.graceful_shutdown.as_secs(),
            "reconciler did not stop within the graceful shutdown window"
        );
    }

    result
}

async fn serve_http(settings: &config::Settings, state: HttpState) -> Result<(), AppError> {
    let router = http::build_router(state);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    info!(
        target = "kudos::serve",
        addr = %settings.server.addr,
        "listening"
    );

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .map_err(|err| AppError::unexpected(format!("server error: {err}")))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(target = "kudos::serve", error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(target = "kudos::serve", error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!(target = "kudos::serve", "shutdown signal received");
}

async fn run_reconcile(settings: config::Settings) -> Result<(), AppError> {
    let adapters = init_adapters(&settings).await?;
    let report = reconciler(&adapters, &settings).run_cycle().await?;
    print_json(&json!(report))
}

#[derive(Debug, Clone, Copy)]
enum ArticleOp {
    Count,
    Like,
    Unlike,
}

async fn run_article_command(
    settings: config::Settings,
    raw_id: &str,
    op: ArticleOp,
) -> Result<(), AppError> {
    let id = ArticleId::parse(raw_id)?;
    let adapters = init_adapters(&settings).await?;
    let likes = like_service(&adapters, &settings);

    let count = match op {
        ArticleOp::Count => likes.read(&id).await?,
        ArticleOp::Like => likes.increment(&id).await?,
        ArticleOp::Unlike => likes.decrement(&id).await?,
    };

    print_json(&json!({ "article_id": id.as_str(), "likes": count }))
}

fn print_json(value: &serde_json::Value) -> Result<(), AppError> {
    let rendered = serde_json::to_string_pretty(value)
        .map_err(|err| AppError::unexpected(format!("failed to render output: {err}")))?;
    println!("{rendered}");
    Ok(())
}
