//! End-to-end tests driving the assembled router directly, the way
//! `jobs`'s `coordinator_test.rs` drives a real coordinator: real Postgres
//! and Redis fixtures, no HTTP listener. Skips (not fails) without Docker.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use api::state::AppState;
use audit::geo::GeoResolver;
use audit::{AuditService, LocalGeoSource, RemoteGeoSource};
use auth::AuthService;
use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{Request, StatusCode};
use config::AppConfig;
use core::ids::PrincipalId;
use core::principal::{Principal, Role};
use metrics_exporter_prometheus::PrometheusHandle;
use parsers::registry::ParserRegistry;
use parsers::WorkerPool;
use serde_json::Value;
use storage::Repositories;
use tower::ServiceExt;

/// `observability::init_metrics` installs the process-wide Prometheus
/// recorder and panics if called twice; every test in this file shares one
/// handle instead.
fn metrics_handle() -> PrometheusHandle {
    static HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();
    HANDLE.get_or_init(observability::init_metrics).clone()
}

static IP_COUNTER: AtomicU32 = AtomicU32::new(1);

/// A synthetic, per-test source IP so the shared Redis rate-limit buckets
/// (keyed by remote IP for `/auth/login`) don't leak between tests.
fn unique_client_ip() -> String {
    let n = IP_COUNTER.fetch_add(1, Ordering::SeqCst);
    format!("203.0.113.{n}")
}

fn sample_principal(handle: &str, password: &str, role: Role) -> Principal {
    Principal {
        id: PrincipalId::new(),
        handle: handle.to_string(),
        email: format!("{handle}@example.com"),
        role,
        password_verifier: auth::password::hash_password(password).unwrap(),
        quota_bytes: 10_485_760,
        used_bytes: 0,
        quota_grace: false,
        active: true,
        created_at: chrono::Utc::now(),
        last_login_at: None
    }
}

async fn build_state(postgres_url: &str, redis_url: &str, scratch: &std::path::Path) -> AppState {
    let pool = storage::connect(postgres_url).await.expect("connect to postgres fixture");
    storage::initialize_schema(&pool).await.expect("initialize schema");
    let repos = Repositories::new(pool);

    let mut config = AppConfig::default();
    config.database.url = postgres_url.to_string();
    config.kv.url = redis_url.to_string();
    config.object_store.local_root = scratch.join("store").to_string_lossy().into_owned();
    config.object_store.scratch_dir = scratch.join("scratch").to_string_lossy().into_owned();

    let object_store = objectstore::build(&config.object_store);
    let auth = Arc::new(AuthService::new(repos.clone()));

    let geo_resolver = Arc::new(GeoResolver::new(
        Box::new(LocalGeoSource::empty()),
        Box::new(RemoteGeoSource::new(config.geo.remote_lookup_url_template.clone(), Duration::from_secs(config.geo.remote_timeout_secs))),
        config.geo.cache_capacity
    ));
    let audit = Arc::new(AuditService::new(repos.clone(), geo_resolver));

    let rate_limiter = Arc::new(ratelimit::RateLimiter::connect(&config.kv.url).await.expect("connect to redis fixture"));

    let registry = ParserRegistry::builtin();
    let worker_pool = Arc::new(WorkerPool::new(registry, config.parser, config.worker.pool_size));
    let coordinator =
        Arc::new(jobs::JobCoordinator::new(repos.clone(), Arc::clone(&object_store), Arc::clone(&worker_pool), scratch.join("materialize")));

    AppState {
        repos,
        object_store,
        auth,
        audit,
        rate_limiter,
        coordinator,
        worker_pool,
        config: Arc::new(config),
        progress: Arc::new(api::progress::ProgressTracker::new()),
        metrics_handle: metrics_handle()
    }
}

fn request(method: &str, uri: &str, token: Option<&str>, client_ip: &str, body: Body) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri).header("x-forwarded-for", client_ip);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    builder = builder.header("content-type", "application/json");
    let mut req = builder.body(body).unwrap();
    req.extensions_mut().insert(ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 0))));
    req
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Evaluates to the started fixture pair, or returns from the calling test
/// (printing a skip notice) when Docker isn't available.
macro_rules! fixtures_or_skip {
    () => {
        match (testing::postgres().await, testing::redis().await) {
            (Some(pg), Some(redis)) => (pg, redis),
            _ => {
                eprintln!("Skipping test: Docker not available");
                return;
            }
        }
    };
}

#[tokio::test]
async fn healthz_is_public_and_unauthenticated() {
    let (pg, redis) = fixtures_or_skip!();
    let scratch = tempfile::tempdir().unwrap();
    let state = build_state(pg.url(), redis.url(), scratch.path()).await;
    let router = api::build_router(state);

    let response = router.oneshot(request("GET", "/healthz", None, &unique_client_ip(), Body::empty())).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn login_issues_a_token_that_resolves_the_same_principal() {
    let (pg, redis) = fixtures_or_skip!();
    let scratch = tempfile::tempdir().unwrap();
    let state = build_state(pg.url(), redis.url(), scratch.path()).await;
    let principal = sample_principal(&testing::unique_id("alice"), "correct horse battery staple", Role::User);
    state.repos.principals.create(&principal).await.unwrap();
    let router = api::build_router(state);
    let ip = unique_client_ip();

    let login_body = serde_json::json!({ "handle": principal.handle, "password": "correct horse battery staple" }).to_string();
    let response = router.clone().oneshot(request("POST", "/auth/login", None, &ip, Body::from(login_body))).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let token = json["token"].as_str().unwrap().to_string();
    assert_eq!(json["principal"]["handle"], principal.handle);

    let me = router.oneshot(request("GET", "/auth/me", Some(&token), &ip, Body::empty())).await.unwrap();
    assert_eq!(me.status(), StatusCode::OK);
    let me_json = body_json(me).await;
    assert_eq!(me_json["handle"], principal.handle);
}

#[tokio::test]
async fn login_with_wrong_password_is_unauthorized() {
    let (pg, redis) = fixtures_or_skip!();
    let scratch = tempfile::tempdir().unwrap();
    let state = build_state(pg.url(), redis.url(), scratch.path()).await;
    let principal = sample_principal(&testing::unique_id("dave"), "right-password-here", Role::User);
    state.repos.principals.create(&principal).await.unwrap();
    let router = api::build_router(state);

    let login_body = serde_json::json!({ "handle": principal.handle, "password": "wrong-password-here" }).to_string();
    let response =
        router.oneshot(request("POST", "/auth/login", None, &unique_client_ip(), Body::from(login_body))).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let json = body_json(response).await;
    assert_eq!(json["error_kind"], "InvalidCredentials");
}

#[tokio::test]
async fn protected_route_without_token_is_rejected() {
    let (pg, redis) = fixtures_or_skip!();
    let scratch = tempfile::tempdir().unwrap();
    let state = build_state(pg.url(), redis.url(), scratch.path()).await;
    let router = api::build_router(state);

    let response = router.oneshot(request("GET", "/auth/me", None, &unique_client_ip(), Body::empty())).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn non_admin_is_forbidden_from_admin_routes() {
    let (pg, redis) = fixtures_or_skip!();
    let scratch = tempfile::tempdir().unwrap();
    let state = build_state(pg.url(), redis.url(), scratch.path()).await;
    let principal = sample_principal(&testing::unique_id("bob"), "hunter2-hunter2", Role::User);
    state.repos.principals.create(&principal).await.unwrap();
    let router = api::build_router(state);
    let ip = unique_client_ip();

    let login_body = serde_json::json!({ "handle": principal.handle, "password": "hunter2-hunter2" }).to_string();
    let login_response = router.clone().oneshot(request("POST", "/auth/login", None, &ip, Body::from(login_body))).await.unwrap();
    let token = body_json(login_response).await["token"].as_str().unwrap().to_string();

    let response = router.oneshot(request("GET", "/admin/users", Some(&token), &ip, Body::empty())).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn admin_can_list_users() {
    let (pg, redis) = fixtures_or_skip!();
    let scratch = tempfile::tempdir().unwrap();
    let state = build_state(pg.url(), redis.url(), scratch.path()).await;
    let admin = sample_principal(&testing::unique_id("root"), "super-secret-password", Role::Admin);
    state.repos.principals.create(&admin).await.unwrap();
    let router = api::build_router(state);
    let ip = unique_client_ip();

    let login_body = serde_json::json!({ "handle": admin.handle, "password": "super-secret-password" }).to_string();
    let login_response = router.clone().oneshot(request("POST", "/auth/login", None, &ip, Body::from(login_body))).await.unwrap();
    let token = body_json(login_response).await["token"].as_str().unwrap().to_string();

    let response = router.oneshot(request("GET", "/admin/users", Some(&token), &ip, Body::empty())).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let users = body_json(response).await;
    assert!(users.as_array().unwrap().iter().any(|u| u["handle"] == admin.handle));
}

#[tokio::test]
async fn repeated_failed_logins_from_one_ip_are_rate_limited() {
    let (pg, redis) = fixtures_or_skip!();
    let scratch = tempfile::tempdir().unwrap();
    let state = build_state(pg.url(), redis.url(), scratch.path()).await;
    let principal = sample_principal(&testing::unique_id("carol"), "swordfish-swordfish", Role::User);
    state.repos.principals.create(&principal).await.unwrap();
    let router = api::build_router(state);
    let ip = unique_client_ip();

    let bad_body = serde_json::json!({ "handle": principal.handle, "password": "definitely-wrong" }).to_string();
    let mut statuses = Vec::new();
    for _ in 0..6 {
        let response = router.clone().oneshot(request("POST", "/auth/login", None, &ip, Body::from(bad_body.clone()))).await.unwrap();
        statuses.push(response.status());
    }

    assert_eq!(statuses.last(), Some(&StatusCode::TOO_MANY_REQUESTS), "the 6th login attempt within the window must be rate-limited");
    assert!(statuses[..5].iter().all(|s| *s == StatusCode::UNAUTHORIZED), "the first 5 attempts should fail on credentials, not the limiter");
}
