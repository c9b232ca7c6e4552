//! `POST /logs/{id}/pin` and `/unpin` (owner or admin).

use axum::extract::{Path, State};
use axum::Json;
use core::audit_event::AuditOutcome;
use core::ids::LogFileId;
use core::principal::Role;
use errors::CoreError;
use serde_json::json;

use crate::auth_mw::AuthContext;
use crate::error::ApiError;
use crate::state::AppState;

async fn set_pinned(state: &AppState, ctx: &AuthContext, id: LogFileId, pinned: bool) -> Result<(), ApiError> {
    let log_file =
        state.repos.log_files.get(id).await.map_err(CoreError::from)?.ok_or_else(|| ApiError(CoreError::not_found("log file")))?;
    if log_file.principal_id != ctx.principal.id && ctx.principal.role != Role::Admin {
        return Err(ApiError(CoreError::not_found("log file")));
    }
    state.repos.log_files.set_pinned(id, pinned).await.map_err(CoreError::from)?;
    let _ = state
        .audit
        .record(
            Some(ctx.principal.id),
            if pinned { "logs.pin" } else { "logs.unpin" },
            Some("log_file"),
            Some(&id.to_string()),
            ctx.ip(),
            &ctx.session.user_agent,
            AuditOutcome::Success,
            json!({})
        )
        .await;
    Ok(())
}

pub async fn pin(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(id): Path<LogFileId>
) -> Result<Json<serde_json::Value>, ApiError> {
    set_pinned(&state, &ctx, id, true).await?;
    Ok(Json(serde_json::json!({})))
}

pub async fn unpin(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(id): Path<LogFileId>
) -> Result<Json<serde_json::Value>, ApiError> {
    set_pinned(&state, &ctx, id, false).await?;
    Ok(Json(serde_json::json!({})))
}
