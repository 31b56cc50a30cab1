use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};

/// Command-line arguments for the kudos binary.
#[derive(Debug, Parser)]
#[command(name = "kudos", version, about = "Article like counter service")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "KUDOS_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the HTTP service and the background reconciler.
    Serve(Box<ServeArgs>),
    /// Run a single reconciliation cycle and print its report.
    Reconcile(StoreArgs),
    /// Print the current like count of an article.
    Count(ArticleArgs),
    /// Add one like to an article.
    Like(ArticleArgs),
    /// Remove one like from an article.
    Unlike(ArticleArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct StoreArgs {
    /// Override the database connection URL.
    #[arg(long = "database-url", value_name = "URL")]
    pub database_url: Option<String>,

    /// Override the cache URL (`redis://...` or `memory://`).
    #[arg(long = "cache-url", value_name = "URL")]
    pub cache_url: Option<String>,
}

#[derive(Debug, Args, Clone)]
pub struct ArticleArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    /// Article identifier.
    #[arg(value_name = "ID")]
    pub article_id: String,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    #[command(flatten)]
    pub store: StoreArgs,

    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the graceful shutdown timeout.
    #[arg(long = "server-graceful-shutdown-seconds", value_name = "SECONDS")]
    pub server_graceful_shutdown_seconds: Option<u64>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Override the database pool size.
    #[arg(long = "database-max-connections", value_name = "COUNT")]
    pub database_max_connections: Option<u32>,

    /// Override how long a cached count snapshot lives.
    #[arg(long = "cache-snapshot-ttl-seconds", value_name = "SECONDS")]
    pub cache_snapshot_ttl_seconds: Option<u64>,

    /// Override the deadline applied to each store and cache call.
    #[arg(long = "cache-operation-timeout-ms", value_name = "MS")]
    pub cache_operation_timeout_ms: Option<u64>,

    /// Override the reconciliation period.
    #[arg(long = "reconciler-interval-seconds", value_name = "SECONDS")]
    pub reconciler_interval_seconds: Option<u64>,

    /// Override the rate limit window size.
    #[arg(long = "rate-limit-window-seconds", value_name = "SECONDS")]
    pub rate_limit_window_seconds: Option<u64>,

    /// Override the rate limit request ceiling.
    #[arg(long = "rate-limit-max-requests", value_name = "COUNT")]
    pub rate_limit_max_requests: Option<u64>,
}
