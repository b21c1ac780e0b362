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

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "roller_cache_hit_total",
            Unit::Count,
            "Total number of render cache hits, labelled by cache id."
        );
        describe_counter!(
            "roller_cache_miss_total",
            Unit::Count,
            "Total number of render cache misses, labelled by cache id."
        );
        describe_counter!(
            "roller_cache_expired_total",
            Unit::Count,
            "Total number of lookups that found an expired entry."
        );
        describe_counter!(
            "roller_cache_evict_total",
            Unit::Count,
            "Total number of render cache evictions due to capacity."
        );
        describe_counter!(
            "roller_cache_lock_poisoned_total",
            Unit::Count,
            "Cache lock acquisitions that recovered from a poisoned lock."
        );
        describe_counter!(
            "roller_requests_classified_total",
            Unit::Count,
            "Total number of page requests classified, labelled by profile."
        );
        describe_counter!(
            "roller_requests_rejected_total",
            Unit::Count,
            "Total number of requests rejected as invalid."
        );
        describe_counter!(
            "roller_page_hits_total",
            Unit::Count,
            "Weblog page hits, labelled homepage or content."
        );
        describe_histogram!(
            "roller_render_ms",
            Unit::Milliseconds,
            "Time spent rendering a page view on a cache miss."
        );
    });
}
