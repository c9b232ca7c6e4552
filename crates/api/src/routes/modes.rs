//! `GET /modes` (§4.9): the parser descriptors visible to the caller.

use axum::extract::State;
use axum::Json;
use core::parser_descriptor::ParserDescriptor;

use crate::auth_mw::AuthContext;
use crate::error::ApiError;
use crate::state::AppState;

pub async fn list_modes(State(state): State<AppState>, ctx: AuthContext) -> Result<Json<Vec<ParserDescriptor>>, ApiError> {
    let descriptors = state.repos.parser_descriptors.list_all().await.map_err(errors::CoreError::from)?;
    let mut visible = Vec::with_capacity(descriptors.len());
    for descriptor in descriptors {
        let override_ = state
            .repos
            .parser_descriptors
            .get_permission_override(ctx.principal.id, &descriptor.mode_key)
            .await
            .map_err(errors::CoreError::from)?;
        if descriptor.is_visible_to(ctx.principal.role, override_) {
            visible.push(descriptor);
        }
    }
    Ok(Json(visible))
}
