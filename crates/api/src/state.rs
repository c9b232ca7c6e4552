use std::sync::Arc;

use audit::AuditService;
use auth::AuthService;
use config::AppConfig;
use core::traits::ObjectStore;
use jobs::JobCoordinator;
use metrics_exporter_prometheus::PrometheusHandle;
use parsers::WorkerPool;
use ratelimit::RateLimiter;
use storage::Repositories;

use crate::progress::ProgressTracker;

/// Every component handle a handler might need, aggregated once at startup
/// the way `agent-a2a`'s `AuthState` bundles its own dependencies (§3).
#[derive(Clone)]
pub struct AppState {
    pub repos: Repositories,
    pub object_store: Arc<dyn ObjectStore>,
    pub auth: Arc<AuthService>,
    pub audit: Arc<AuditService>,
    pub rate_limiter: Arc<RateLimiter>,
    pub coordinator: Arc<JobCoordinator>,
    pub worker_pool: Arc<WorkerPool>,
    pub config: Arc<AppConfig>,
    pub progress: Arc<ProgressTracker>,
    pub metrics_handle: PrometheusHandle
}
