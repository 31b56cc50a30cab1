use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

/// Register descriptions for every metric the service emits. Idempotent.
pub fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "kudos_likes_snapshot_hit_total",
            Unit::Count,
            "Like count reads served from a cached snapshot."
        );
        describe_counter!(
            "kudos_likes_snapshot_miss_total",
            Unit::Count,
            "Like count reads that fell through to the durable store."
        );
        describe_counter!(
            "kudos_likes_write_total",
            Unit::Count,
            "Buffered like and unlike writes, labelled by op."
        );
        describe_counter!(
            "kudos_reconcile_applied_total",
            Unit::Count,
            "Pending deltas folded into the durable store."
        );
        describe_counter!(
            "kudos_reconcile_failed_total",
            Unit::Count,
            "Pending deltas left in place after a read, apply, or delete failure."
        );
        describe_counter!(
            "kudos_reconcile_malformed_total",
            Unit::Count,
            "Pending delta keys holding a non-integer value."
        );
        describe_histogram!(
            "kudos_reconcile_cycle_ms",
            Unit::Milliseconds,
            "Duration of one reconciliation cycle in milliseconds."
        );
    });
}
