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
            .with_writer(std::io::stderr)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_target(true)
            .with_writer(std::io::stderr)
            .boxed(),
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

/// Register descriptions for every metric the sync layer emits.
pub fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "palsync_query_hit_total",
            Unit::Count,
            "Queries served from fresh cached pages."
        );
        describe_counter!(
            "palsync_query_miss_total",
            Unit::Count,
            "Queries that fetched their first page because the cache was absent or stale."
        );
        describe_counter!(
            "palsync_page_fetch_total",
            Unit::Count,
            "Page fetches issued, first and following pages."
        );
        describe_counter!(
            "palsync_page_fetch_failed_total",
            Unit::Count,
            "Page fetches that returned an error."
        );
        describe_histogram!(
            "palsync_page_fetch_ms",
            Unit::Milliseconds,
            "Page fetch latency in milliseconds."
        );
        describe_counter!(
            "palsync_invalidated_keys_total",
            Unit::Count,
            "Cached queries marked stale by invalidation."
        );
        describe_counter!(
            "palsync_cache_evict_total",
            Unit::Count,
            "Idle cached queries evicted due to capacity."
        );
        describe_counter!(
            "palsync_mutation_total",
            Unit::Count,
            "Mutations started."
        );
        describe_counter!(
            "palsync_mutation_busy_total",
            Unit::Count,
            "Mutations rejected because the same key was in flight."
        );
        describe_counter!(
            "palsync_mutation_failed_total",
            Unit::Count,
            "Mutations whose action returned an error."
        );
    });
}
