//! Application state

use authgate_auth::JwtManager;
use authgate_db::Database;
use std::sync::Arc;

/// Prometheus handle used to render `/metrics`
pub type MetricsHandle = metrics_exporter_prometheus::PrometheusHandle;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub jwt: Arc<JwtManager>,
    /// Let anonymous callers register directly as `ADMIN`
    pub allow_self_service_admin: bool,
}

impl AppState {
    pub fn new(db: Database, jwt: Arc<JwtManager>, allow_self_service_admin: bool) -> Self {
        Self {
            db,
            jwt,
            allow_self_service_admin,
        }
    }
}
