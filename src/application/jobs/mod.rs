mod observability;

pub use observability::{MetricsRefreshContext, refresh_observability_metrics, spawn_metrics_refresh};
