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

pub const METRIC_CACHE_HIT: &str = "event_stats_cache_hit_total";
pub const METRIC_CACHE_MISS: &str = "event_stats_cache_miss_total";
pub const METRIC_STORE_ERROR: &str = "event_stats_store_error_total";
pub const METRIC_INVALIDATION: &str = "event_stats_invalidation_total";
pub const METRIC_REGENERATION_SCHEDULED: &str = "event_stats_regeneration_scheduled_total";
pub const METRIC_REGENERATION_FAILURE: &str = "event_stats_regeneration_failure_total";
pub const METRIC_REGENERATE_MS: &str = "event_stats_regenerate_ms";

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install the global tracing subscriber and describe the engine's metrics.
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

pub fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            METRIC_CACHE_HIT,
            Unit::Count,
            "Statistic reads served from the cache store."
        );
        describe_counter!(
            METRIC_CACHE_MISS,
            Unit::Count,
            "Statistic reads computed synchronously after a cache miss."
        );
        describe_counter!(
            METRIC_STORE_ERROR,
            Unit::Count,
            "Cache store operations that failed and were treated as a miss."
        );
        describe_counter!(
            METRIC_INVALIDATION,
            Unit::Count,
            "Change signals that cleared the statistics namespace."
        );
        describe_counter!(
            METRIC_REGENERATION_SCHEDULED,
            Unit::Count,
            "Regeneration passes handed to the deferred scheduler."
        );
        describe_counter!(
            METRIC_REGENERATION_FAILURE,
            Unit::Count,
            "Planned entries that failed to compute during regeneration."
        );
        describe_histogram!(
            METRIC_REGENERATE_MS,
            Unit::Milliseconds,
            "Wall time of a full regeneration pass in milliseconds."
        );
    });
}
