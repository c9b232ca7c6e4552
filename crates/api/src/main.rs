use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use api::state::AppState;
use audit::{AuditService, LocalGeoSource, RemoteGeoSource};
use audit::geo::GeoResolver;
use auth::AuthService;
use core::retention_policy::{PolicyScope, RetentionPolicy};
use parsers::registry::ParserRegistry;
use parsers::WorkerPool;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init_tracing();
    let metrics_handle = observability::init_metrics();

    let config = config::load(std::env::var("CONFIG_PATH").ok().as_deref().map(std::path::Path::new))?;
    let config = Arc::new(config);
    tracing::info!("configuration loaded");

    let pool = storage::connect(&config.database.url).await?;
    storage::initialize_schema(&pool).await?;
    let repos = storage::Repositories::new(pool);

    let object_store = objectstore::build(&config.object_store);

    let auth = Arc::new(AuthService::new(repos.clone()));

    let geo_resolver = Arc::new(GeoResolver::new(
        Box::new(LocalGeoSource::empty()),
        Box::new(RemoteGeoSource::new(config.geo.remote_lookup_url_template.clone(), Duration::from_secs(config.geo.remote_timeout_secs))),
        config.geo.cache_capacity
    ));
    let audit = Arc::new(AuditService::new(repos.clone(), geo_resolver));

    let rate_limiter = Arc::new(ratelimit::RateLimiter::connect(&config.kv.url).await?);

    let parser_registry = ParserRegistry::builtin();
    let worker_pool = Arc::new(WorkerPool::new(parser_registry, config.parser, config.worker.pool_size));

    let scratch_dir = std::path::PathBuf::from(&config.object_store.scratch_dir);
    let coordinator = Arc::new(jobs::JobCoordinator::new(repos.clone(), Arc::clone(&object_store), Arc::clone(&worker_pool), scratch_dir));

    let default_policy = RetentionPolicy {
        scope: PolicyScope::Global,
        scope_id: None,
        soft_after_days: config.retention.soft_after_days,
        hard_after_soft_days: config.retention.hard_after_soft_days
    };
    let retention_engine = Arc::new(retention::RetentionEngine::new(repos.clone(), Arc::clone(&object_store), default_policy));
    api::background::spawn(retention_engine, config.retention);

    let state = AppState {
        repos,
        object_store,
        auth,
        audit,
        rate_limiter,
        coordinator,
        worker_pool,
        config: Arc::clone(&config),
        progress: Arc::new(api::progress::ProgressTracker::new()),
        metrics_handle
    };

    let app = api::build_router(state);

    let addr: SocketAddr = config.http.bind_address.parse()?;
    tracing::info!(%addr, "listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;

    Ok(())
}
