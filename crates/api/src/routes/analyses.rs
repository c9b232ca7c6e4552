//! `/analyses*` routes (§4.9): listing, single-analysis detail with
//! results, and cancellation.

use axum::extract::{Path, Query, State};
use axum::Json;
use core::analysis::{Analysis, AnalysisResult, AnalysisStatus};
use core::ids::AnalysisId;
use core::principal::Role;
use errors::{CoreError, ErrorKind};
use serde::{Deserialize, Serialize};

use crate::auth_mw::AuthContext;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize, Default)]
pub struct AnalysesQuery {
    pub q: Option<String>,
    pub status: Option<String>,
    pub from: Option<chrono::DateTime<chrono::Utc>>,
    pub to: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default)]
    pub page: Option<u32>
}

const PAGE_SIZE: usize = 50;

fn status_matches(analysis: &Analysis, wanted: &str) -> bool {
    let actual = match analysis.status {
        AnalysisStatus::Pending => "pending",
        AnalysisStatus::Running => "running",
        AnalysisStatus::Completed => "completed",
        AnalysisStatus::Failed => "failed",
        AnalysisStatus::Cancelled => "cancelled"
    };
    actual.eq_ignore_ascii_case(wanted)
}

#[derive(Debug, Serialize)]
pub struct PagedAnalyses {
    pub items: Vec<Analysis>,
    pub page: u32,
    pub total: usize
}

pub async fn list_analyses(
    State(state): State<AppState>,
    ctx: AuthContext,
    Query(query): Query<AnalysesQuery>
) -> Result<Json<PagedAnalyses>, ApiError> {
    let mut analyses = state.repos.analyses.list_for_principal(ctx.principal.id).await.map_err(CoreError::from)?;

    if let Some(status) = &query.status {
        analyses.retain(|a| status_matches(a, status));
    }
    if let Some(needle) = &query.q {
        let needle = needle.to_lowercase();
        analyses.retain(|a| {
            a.session_label.as_deref().unwrap_or("").to_lowercase().contains(&needle)
                || a.external_ref.as_deref().unwrap_or("").to_lowercase().contains(&needle)
        });
    }
    if let Some(from) = query.from {
        analyses.retain(|a| a.started_at.is_none_or(|s| s >= from));
    }
    if let Some(to) = query.to {
        analyses.retain(|a| a.started_at.is_none_or(|s| s <= to));
    }

    let total = analyses.len();
    let page = query.page.unwrap_or(0);
    let start = (page as usize) * PAGE_SIZE;
    let items = analyses.into_iter().skip(start).take(PAGE_SIZE).collect();

    Ok(Json(PagedAnalyses { items, page, total }))
}

#[derive(Debug, Serialize)]
pub struct AnalysisDetail {
    #[serde(flatten)]
    pub analysis: Analysis,
    pub results: Vec<AnalysisResult>
}

async fn load_owned_analysis(state: &AppState, ctx: &AuthContext, id: AnalysisId) -> Result<Analysis, ApiError> {
    let analysis =
        state.repos.analyses.get(id).await.map_err(CoreError::from)?.ok_or_else(|| ApiError(CoreError::not_found("analysis")))?;
    if analysis.principal_id != ctx.principal.id && ctx.principal.role != Role::Admin {
        return Err(ApiError(CoreError::new(ErrorKind::NotFound, "analysis not found")));
    }
    Ok(analysis)
}

pub async fn get_analysis(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(id): Path<AnalysisId>
) -> Result<Json<AnalysisDetail>, ApiError> {
    let analysis = load_owned_analysis(&state, &ctx, id).await?;
    let results = state.repos.analyses.list_results(id).await.map_err(CoreError::from)?;
    Ok(Json(AnalysisDetail { analysis, results }))
}

pub async fn cancel_analysis(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(id): Path<AnalysisId>
) -> Result<Json<serde_json::Value>, ApiError> {
    let analysis = load_owned_analysis(&state, &ctx, id).await?;
    if analysis.status.is_terminal() {
        return Err(ApiError(CoreError::new(ErrorKind::Conflict, "analysis is not cancellable")));
    }
    state.coordinator.cancel(id).await?;
    Ok(Json(serde_json::json!({})))
}
