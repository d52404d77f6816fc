//! Authentication and token lifecycle handlers

use crate::auth::{ApiResult, AuthUser, BearerToken};
use crate::AppState;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Json,
};
use fieldops_access::{IssuedToken, LoginResponse, PublicUser};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    let response = state.access.login(&request.email, &request.password).await?;
    Ok(Json(response))
}

/// POST /api/auth/logout — revoke the presented token
pub async fn logout(
    State(state): State<AppState>,
    BearerToken(token): BearerToken,
) -> ApiResult<StatusCode> {
    state.access.logout(&token).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Serialize)]
pub struct LogoutAllResponse {
    pub revoked: u64,
}

/// POST /api/auth/logout-all — revoke every session of the caller
pub async fn logout_all(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> ApiResult<Json<LogoutAllResponse>> {
    let revoked = state.access.logout_all(&user.id).await?;
    Ok(Json(LogoutAllResponse { revoked }))
}

/// POST /api/auth/refresh — exchange the presented token for a fresh one
pub async fn refresh(
    State(state): State<AppState>,
    BearerToken(token): BearerToken,
) -> ApiResult<Json<IssuedToken>> {
    let issued = state.access.refresh(&token).await?;
    Ok(Json(issued))
}

/// GET /api/auth/me
pub async fn me(AuthUser(user): AuthUser) -> Json<PublicUser> {
    Json(user.to_public())
}

#[derive(Debug, Deserialize)]
pub struct CheckPermissionQuery {
    pub permission: String,
}

#[derive(Debug, Serialize)]
pub struct CheckPermissionResponse {
    pub permission: String,
    pub granted: bool,
}

/// GET /api/auth/check-permission?permission=X
///
/// Unknown permission names answer `granted: false`, never an error.
pub async fn check_permission(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Query(query): Query<CheckPermissionQuery>,
) -> ApiResult<Json<CheckPermissionResponse>> {
    let granted = state
        .access
        .check_permission(&user, &query.permission)
        .await?;

    Ok(Json(CheckPermissionResponse {
        permission: query.permission,
        granted,
    }))
}
