use metrics::{Unit, describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::cache::{CACHE_ERROR_TOTAL, CACHE_HIT_TOTAL, CACHE_MISS_TOTAL};
use crate::config::{LogFormat, LoggingSettings};
use crate::infra::http::{API_RESPONSE_TIME_SECONDS, HTTP_ERRORS_TOTAL, HTTP_REQUESTS_TOTAL};

use super::error::InfraError;

const LATENCY_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];
const AGE_BUCKETS: &[f64] = &[0.0, 3.0, 6.0, 9.0, 12.0, 15.0, 18.0];

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
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

/// Installs the Prometheus recorder as the global `metrics` sink and
/// registers the HELP text of every metric with it.
pub fn install_prometheus() -> Result<PrometheusHandle, InfraError> {
    let handle = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full(API_RESPONSE_TIME_SECONDS.to_string()),
            LATENCY_BUCKETS,
        )
        .and_then(|builder| {
            builder.set_buckets_for_metric(
                Matcher::Full("db_query_duration_seconds".to_string()),
                LATENCY_BUCKETS,
            )
        })
        .and_then(|builder| {
            builder.set_buckets_for_metric(
                Matcher::Full("patients_age_distribution".to_string()),
                AGE_BUCKETS,
            )
        })
        .and_then(|builder| builder.install_recorder())
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install metrics recorder: {err}"))
        })?;

    describe_metrics();
    Ok(handle)
}

/// Descriptions go to whichever recorder is installed at call time.
fn describe_metrics() {
    describe_counter!(
        HTTP_REQUESTS_TOTAL,
        Unit::Count,
        "Total HTTP requests by method, route and status."
    );
    describe_counter!(
        HTTP_ERRORS_TOTAL,
        Unit::Count,
        "HTTP responses with a 4xx or 5xx status."
    );
    describe_histogram!(
        API_RESPONSE_TIME_SECONDS,
        Unit::Seconds,
        "Time spent handling a routed request."
    );
    describe_counter!(
        CACHE_HIT_TOTAL,
        Unit::Count,
        "Reads served from the response cache."
    );
    describe_counter!(
        CACHE_MISS_TOTAL,
        Unit::Count,
        "Reads that fell through to the database."
    );
    describe_counter!(
        CACHE_ERROR_TOTAL,
        Unit::Count,
        "Cache backend failures treated as misses."
    );
    describe_histogram!(
        "db_query_duration_seconds",
        Unit::Seconds,
        "Round trip of the health probe query."
    );
    describe_gauge!(
        "db_active_connections",
        Unit::Count,
        "Pool connections currently checked out."
    );
    describe_gauge!("app_health", "1 when the last refresh reached the database.");
    describe_gauge!("dau", Unit::Count, "Active user accounts.");
    describe_gauge!("documents_total", Unit::Count, "Stored documents.");
    describe_gauge!(
        "documents_by_type",
        Unit::Count,
        "Stored documents per category."
    );
    describe_gauge!("patient_avg_age", "Mean patient age in years.");
    describe_gauge!("users_by_role", Unit::Count, "User accounts per role.");
    describe_gauge!(
        "new_patients_last_hour",
        Unit::Count,
        "Patients registered during the last hour."
    );
    describe_histogram!(
        "patients_age_distribution",
        "Patient ages observed by the last refresh."
    );
}
