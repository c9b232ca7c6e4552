//! `/admin/*` routes (§4.9, plus the supplemented parser-permission and
//! quota-override endpoints): every handler here requires [`AdminContext`].

use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use core::audit_event::AuditOutcome;
use core::ids::PrincipalId;
use core::principal::{Principal, Role};
use errors::CoreError;
use serde::Deserialize;
use serde_json::json;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::StreamExt as _;

use crate::auth_mw::AdminContext;
use crate::state::AppState;

pub async fn list_users(State(state): State<AppState>, AdminContext(_ctx): AdminContext) -> Result<Json<Vec<Principal>>, crate::error::ApiError> {
    Ok(Json(state.repos.principals.list().await.map_err(CoreError::from)?))
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub role: Option<Role>,
    pub active: Option<bool>
}

pub async fn update_user(
    State(state): State<AppState>,
    AdminContext(ctx): AdminContext,
    Path(id): Path<PrincipalId>,
    Json(req): Json<UpdateUserRequest>
) -> Result<Json<serde_json::Value>, crate::error::ApiError> {
    if let Some(role) = req.role {
        state.repos.principals.set_role(id, role).await.map_err(CoreError::from)?;
    }
    if let Some(active) = req.active {
        state.repos.principals.set_active(id, active).await.map_err(CoreError::from)?;
    }
    let _ = state
        .audit
        .record(
            Some(ctx.principal.id),
            "admin.update_user",
            Some("principal"),
            Some(&id.to_string()),
            ctx.ip(),
            &ctx.session.user_agent,
            AuditOutcome::Success,
            json!({ "role": req.role, "active": req.active })
        )
        .await;
    Ok(Json(serde_json::json!({})))
}

/// Deactivates rather than deletes the principal row, consistent with the
/// append-only audit trail referencing it by id indefinitely (§3, §4.8).
pub async fn delete_user(
    State(state): State<AppState>,
    AdminContext(ctx): AdminContext,
    Path(id): Path<PrincipalId>
) -> Result<Json<serde_json::Value>, crate::error::ApiError> {
    state.repos.principals.set_active(id, false).await.map_err(CoreError::from)?;
    let _ = state
        .audit
        .record(
            Some(ctx.principal.id),
            "admin.deactivate_user",
            Some("principal"),
            Some(&id.to_string()),
            ctx.ip(),
            &ctx.session.user_agent,
            AuditOutcome::Success,
            json!({})
        )
        .await;
    Ok(Json(serde_json::json!({})))
}

#[derive(Debug, Deserialize)]
pub struct ParserPermissionRequest {
    pub allow: bool
}

pub async fn set_parser_permission(
    State(state): State<AppState>,
    AdminContext(ctx): AdminContext,
    Path((id, mode_key)): Path<(PrincipalId, String)>,
    Json(req): Json<ParserPermissionRequest>
) -> Result<Json<serde_json::Value>, crate::error::ApiError> {
    state
        .repos
        .parser_descriptors
        .set_permission(&core::parser_descriptor::ParserPermission { principal_id: id, allow: req.allow }, &mode_key)
        .await
        .map_err(CoreError::from)?;
    let _ = state
        .audit
        .record(
            Some(ctx.principal.id),
            "admin.set_parser_permission",
            Some("principal"),
            Some(&id.to_string()),
            ctx.ip(),
            &ctx.session.user_agent,
            AuditOutcome::Success,
            json!({ "mode_key": mode_key, "allow": req.allow })
        )
        .await;
    Ok(Json(serde_json::json!({})))
}

#[derive(Debug, Deserialize)]
pub struct QuotaRequest {
    pub quota_bytes: i64,
    pub grace: Option<bool>
}

pub async fn set_quota(
    State(state): State<AppState>,
    AdminContext(ctx): AdminContext,
    Path(id): Path<PrincipalId>,
    Json(req): Json<QuotaRequest>
) -> Result<Json<serde_json::Value>, crate::error::ApiError> {
    state.repos.principals.set_quota(id, req.quota_bytes).await.map_err(CoreError::from)?;
    if let Some(grace) = req.grace {
        state.repos.principals.set_quota_grace(id, grace).await.map_err(CoreError::from)?;
    }
    let _ = state
        .audit
        .record(
            Some(ctx.principal.id),
            "admin.set_quota",
            Some("principal"),
            Some(&id.to_string()),
            ctx.ip(),
            &ctx.session.user_agent,
            AuditOutcome::Success,
            json!({ "quota_bytes": req.quota_bytes, "grace": req.grace })
        )
        .await;
    Ok(Json(serde_json::json!({})))
}

#[derive(Debug, Deserialize)]
pub struct AuditQuery {
    pub from: chrono::DateTime<chrono::Utc>,
    pub to: chrono::DateTime<chrono::Utc>,
    #[serde(default = "default_limit")]
    pub limit: i64
}

fn default_limit() -> i64 {
    200
}

pub async fn audit_logs(
    State(state): State<AppState>,
    AdminContext(ctx): AdminContext,
    Query(query): Query<AuditQuery>
) -> Result<Json<Vec<core::audit_event::AuditEvent>>, crate::error::ApiError> {
    let events = state
        .audit
        .list_range(
            ctx.principal.id,
            ctx.ip(),
            &ctx.session.user_agent,
            query.from,
            query.to,
            query.limit
        )
        .await?;
    Ok(Json(events))
}

/// Bridges `AuditService::export_csv`'s synchronous `Write` sink onto an
/// async streaming response body, so the exported CSV is never buffered in
/// full (§4.8).
struct ChannelWriter(tokio::sync::mpsc::UnboundedSender<Vec<u8>>);

impl std::io::Write for ChannelWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.send(buf.to_vec()).map_err(|e| std::io::Error::other(e.to_string()))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

pub async fn audit_export(
    State(state): State<AppState>,
    AdminContext(ctx): AdminContext,
    Query(query): Query<AuditQuery>
) -> Result<Response, crate::error::ApiError> {
    let (tx, rx) = tokio::sync::mpsc::unbounded_channel::<Vec<u8>>();
    let viewer_ip = ctx.ip();
    let viewer_user_agent = ctx.session.user_agent.clone();
    let viewer_id = ctx.principal.id;
    let audit = std::sync::Arc::clone(&state.audit);

    tokio::spawn(async move {
        let writer = ChannelWriter(tx);
        if let Err(e) = audit.export_csv(viewer_id, viewer_ip, &viewer_user_agent, query.from, query.to, writer).await {
            tracing::warn!(error = ?e, "audit export failed mid-stream");
        }
    });

    let stream = UnboundedReceiverStream::new(rx).map(|chunk| Ok::<_, std::io::Error>(axum::body::Bytes::from(chunk)));
    let body = Body::from_stream(stream);
    Ok((
        [(header::CONTENT_TYPE, "text/csv"), (header::CONTENT_DISPOSITION, "attachment; filename=\"audit-export.csv\"")],
        body
    )
        .into_response())
}
