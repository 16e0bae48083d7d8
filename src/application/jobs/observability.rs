//! Periodic recomputation of the observability gauges.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use metrics::{gauge, histogram};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, error};

use crate::application::repos::{ObservabilitySnapshot, RepoError, StatisticsRepo};
use crate::domain::types::DocumentCategory;

/// Ping latency recorded when the database cannot be reached.
const UNHEALTHY_PING: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct MetricsRefreshContext {
    repo: Arc<dyn StatisticsRepo>,
    published: Arc<Mutex<PublishedLabels>>,
}

impl MetricsRefreshContext {
    pub fn new(repo: Arc<dyn StatisticsRepo>) -> Self {
        Self {
            repo,
            published: Arc::new(Mutex::new(PublishedLabels::default())),
        }
    }
}

/// Label values set by earlier passes. A role that disappears from the
/// snapshot gets its gauge reset instead of keeping the last count.
#[derive(Debug, Default)]
struct PublishedLabels {
    roles: HashSet<String>,
}

/// One refresh pass. On failure the health gauge drops to zero and the error
/// is returned to the caller for logging.
pub async fn refresh_observability_metrics(ctx: &MetricsRefreshContext) -> Result<(), RepoError> {
    let result = async {
        let ping = ctx.repo.ping().await?;
        let snapshot = ctx.repo.observability_snapshot().await?;
        Ok::<_, RepoError>((ping, snapshot))
    }
    .await;

    match result {
        Ok((ping, snapshot)) => {
            publish_snapshot(&snapshot, ping, &mut *ctx.published.lock().await);
            debug!(
                target = "medrecords::jobs::metrics",
                ping_ms = ping.as_millis() as u64,
                documents = snapshot.documents_total,
                "observability metrics refreshed"
            );
            Ok(())
        }
        Err(err) => {
            record_unhealthy();
            Err(err)
        }
    }
}

fn publish_snapshot(
    snapshot: &ObservabilitySnapshot,
    ping: Duration,
    published: &mut PublishedLabels,
) {
    histogram!("db_query_duration_seconds").record(ping.as_secs_f64());
    gauge!("app_health").set(1.0);
    gauge!("db_active_connections").set(snapshot.active_connections as f64);
    gauge!("dau").set(snapshot.active_users as f64);
    gauge!("documents_total").set(snapshot.documents_total as f64);
    gauge!("new_patients_last_hour").set(snapshot.new_patients_last_hour as f64);

    for category in DocumentCategory::ALL {
        let count = snapshot
            .documents_by_category
            .iter()
            .find(|(seen, _)| *seen == category)
            .map_or(0, |(_, count)| *count);
        gauge!("documents_by_type", "document_type" => category.as_str()).set(count as f64);
    }

    let current: HashSet<String> = snapshot
        .users_by_role
        .iter()
        .map(|(role_name, _)| role_name.clone())
        .collect();
    for removed in published.roles.difference(&current) {
        gauge!("users_by_role", "role_name" => removed.clone()).set(0.0);
    }
    for (role_name, count) in &snapshot.users_by_role {
        gauge!("users_by_role", "role_name" => role_name.clone()).set(*count as f64);
    }
    published.roles = current;

    let average_age = if snapshot.patient_ages.is_empty() {
        0.0
    } else {
        let total: i64 = snapshot.patient_ages.iter().map(|age| i64::from(*age)).sum();
        total as f64 / snapshot.patient_ages.len() as f64
    };
    gauge!("patient_avg_age").set(average_age);

    let ages = histogram!("patients_age_distribution");
    for age in &snapshot.patient_ages {
        ages.record(f64::from(*age));
    }
}

fn record_unhealthy() {
    gauge!("app_health").set(0.0);
    histogram!("db_query_duration_seconds").record(UNHEALTHY_PING.as_secs_f64());
}

/// Runs a refresh immediately and then once per `period`. Failures are logged
/// and the loop keeps going.
pub fn spawn_metrics_refresh(ctx: MetricsRefreshContext, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Err(err) = refresh_observability_metrics(&ctx).await {
                error!(
                    target = "medrecords::jobs::metrics",
                    error = %err,
                    "observability metrics refresh failed"
                );
            }
        }
    })
}
