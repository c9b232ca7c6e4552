//! `/auth/*` routes (§4.6, §4.9): login, logout, current principal, and
//! password change.

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, State};
use axum::http::HeaderMap;
use axum::Json;
use core::audit_event::AuditOutcome;
use core::rate_bucket::{RateLimitIdentity, RouteClass};
use ratelimit::Decision;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::auth_mw::AuthContext;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub handle: String,
    pub password: String
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub principal: core::principal::Principal
}

fn client_ip(headers: &HeaderMap, remote: SocketAddr) -> std::net::IpAddr {
    let forwarded = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok());
    audit::resolve_client_ip(forwarded, &[], remote.ip())
}

pub async fn login(
    State(state): State<AppState>,
    ConnectInfo(remote): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(req): Json<LoginRequest>
) -> Result<Json<LoginResponse>, ApiError> {
    let ip = client_ip(&headers, remote);
    let identity = RateLimitIdentity::RemoteIp(ip.to_string());
    if let Decision::Denied { .. } = state.rate_limiter.check(&identity, RouteClass::Login).await {
        return Err(ApiError(errors::CoreError::new(errors::ErrorKind::RateLimited, "too many login attempts")));
    }

    let user_agent = headers.get("user-agent").and_then(|v| v.to_str().ok()).unwrap_or("").to_string();
    match state.auth.login(&req.handle, &req.password, &ip.to_string(), &user_agent).await {
        Ok(outcome) => {
            let _ = state
                .audit
                .record(Some(outcome.principal.id), "auth.login", None, None, ip, &user_agent, AuditOutcome::Success, json!({}))
                .await;
            Ok(Json(LoginResponse { token: outcome.token, principal: outcome.principal }))
        }
        Err(err) => {
            let _ = state.audit.record(None, "auth.login", None, None, ip, &user_agent, AuditOutcome::Failure, json!({ "handle": req.handle })).await;
            Err(ApiError::from(err))
        }
    }
}

pub async fn logout(State(state): State<AppState>, ctx: AuthContext) -> Result<Json<serde_json::Value>, ApiError> {
    state.auth.logout(ctx.session.id).await?;
    Ok(Json(json!({})))
}

pub async fn me(ctx: AuthContext) -> Json<core::principal::Principal> {
    Json(ctx.principal)
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current: String,
    pub next: String
}

pub async fn change_password(
    State(state): State<AppState>,
    ctx: AuthContext,
    Json(req): Json<ChangePasswordRequest>
) -> Result<Json<serde_json::Value>, ApiError> {
    state.auth.change_password(ctx.principal.id, &req.current, &req.next).await?;
    let _ = state
        .audit
        .record(
            Some(ctx.principal.id),
            "auth.change_password",
            None,
            None,
            ctx.ip(),
            &ctx.session.user_agent,
            AuditOutcome::Success,
            json!({}),
        )
        .await;
    Ok(Json(json!({})))
}
