use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusHandle;

use crate::application::auth::AuthService;
use crate::application::service::CrudService;
use crate::application::statistics::StatisticsService;
use crate::application::users::UserService;
use crate::cache::ResponseCache;
use crate::domain::entities::{DocumentRecord, PatientRecord, RoleRecord};

/// Everything a request handler may reach.
#[derive(Clone)]
pub struct AppState {
    pub users: Arc<UserService>,
    pub roles: Arc<dyn CrudService<RoleRecord>>,
    pub patients: Arc<dyn CrudService<PatientRecord>>,
    pub documents: Arc<dyn CrudService<DocumentRecord>>,
    pub auth: Arc<AuthService>,
    pub statistics: Arc<StatisticsService>,
    pub cache: ResponseCache,
    /// `None` when the Prometheus exporter is disabled.
    pub metrics: Option<PrometheusHandle>,
    pub upload_limit_bytes: usize,
    pub api_prefix: String,
}
