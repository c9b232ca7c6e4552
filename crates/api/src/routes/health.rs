//! `GET /healthz` (public) and `GET /metrics` (admin-only Prometheus text).

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::auth_mw::AdminContext;
use crate::state::AppState;

pub async fn healthz() -> impl IntoResponse {
    Json(json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") }))
}

pub async fn metrics(State(state): State<AppState>, AdminContext(_ctx): AdminContext) -> impl IntoResponse {
    state.metrics_handle.render()
}
