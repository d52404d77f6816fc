//! Menu resolution handler

use crate::auth::{ApiResult, AuthUser};
use crate::AppState;
use axum::{extract::State, response::Json};
use fieldops_access::MenuProjection;

/// GET /api/menus — the capability catalog visible to the caller
pub async fn get_menus(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> ApiResult<Json<MenuProjection>> {
    let projection = state.access.accessible_menus(&user).await?;
    Ok(Json(projection))
}
