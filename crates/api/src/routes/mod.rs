pub mod admin;
pub mod analyses;
pub mod auth;
pub mod health;
pub mod logs;
pub mod modes;
pub mod upload;

use axum::routing::{get, post, put};
use axum::Router;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::auth_mw::authenticate_middleware;
use crate::error::correlation_id_middleware;
use crate::state::AppState;

/// Assembles the full router the way `agent-a2a`'s `main.rs` composes its
/// own route groups and middleware stack (§4.9).
pub fn build_router(state: AppState) -> Router {
    let public = Router::new().route("/healthz", get(health::healthz)).route("/auth/login", post(auth::login));

    let protected = Router::new()
        .route("/auth/logout", post(auth::logout))
        .route("/auth/me", get(auth::me))
        .route("/auth/change-password", post(auth::change_password))
        .route("/modes", get(modes::list_modes))
        .route("/upload", post(upload::upload))
        .route("/download-progress", get(upload::download_progress))
        .route("/analyses", get(analyses::list_analyses))
        .route("/analyses/{id}", get(analyses::get_analysis))
        .route("/analyses/{id}/cancel", post(analyses::cancel_analysis))
        .route("/logs/{id}/pin", post(logs::pin))
        .route("/logs/{id}/unpin", post(logs::unpin))
        .route("/metrics", get(health::metrics))
        .route("/admin/users", get(admin::list_users))
        .route("/admin/users/{id}", put(admin::update_user).delete(admin::delete_user))
        .route("/admin/users/{id}/parser-permissions/{mode_key}", put(admin::set_parser_permission))
        .route("/admin/users/{id}/quota", put(admin::set_quota))
        .route("/admin/audit-logs", get(admin::audit_logs))
        .route("/admin/audit-export", get(admin::audit_export))
        .layer(axum::middleware::from_fn_with_state(state.clone(), authenticate_middleware));

    let cors = match state.config.cors.allowed_origins.is_empty() {
        true => CorsLayer::permissive(),
        false => {
            let origins: Vec<_> = state
                .config
                .cors
                .allowed_origins
                .iter()
                .filter_map(|origin| origin.parse().ok())
                .collect();
            CorsLayer::new().allow_origin(AllowOrigin::list(origins)).allow_methods(tower_http::cors::Any)
        }
    };

    public
        .merge(protected)
        .layer(axum::middleware::from_fn(correlation_id_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(cors)
        .with_state(state)
}
