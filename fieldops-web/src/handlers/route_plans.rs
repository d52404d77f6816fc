//! Route-plan handlers

use crate::auth::{ApiError, ApiResult, AuthUser};
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use fieldops_access::{NewRoutePlan, RoutePlan};
use serde::{Deserialize, Serialize};

const DEFAULT_PER_PAGE: i64 = 25;
const MAX_PER_PAGE: i64 = 100;

#[derive(Debug, Deserialize)]
pub struct Pagination {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

impl Pagination {
    fn window(&self) -> (i64, i64) {
        let page = self.page.unwrap_or(1).max(1);
        let per_page = self
            .per_page
            .unwrap_or(DEFAULT_PER_PAGE)
            .clamp(1, MAX_PER_PAGE);
        (per_page, (page - 1) * per_page)
    }
}

#[derive(Debug, Serialize)]
pub struct RoutePlanListResponse {
    pub route_plans: Vec<RoutePlan>,
    pub page: i64,
    pub per_page: i64,
}

/// GET /api/route-plans — paginated over the caller's visible rows
pub async fn list_route_plans(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Query(pagination): Query<Pagination>,
) -> ApiResult<Json<RoutePlanListResponse>> {
    let (limit, offset) = pagination.window();
    let route_plans = state.route_plans.list(&user, limit, offset).await?;

    Ok(Json(RoutePlanListResponse {
        route_plans,
        page: pagination.page.unwrap_or(1).max(1),
        per_page: limit,
    }))
}

/// GET /api/route-plans/{id}
pub async fn get_route_plan(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    match state.route_plans.get(&user, &id).await? {
        Some(plan) => Ok(Json(plan).into_response()),
        None => Ok((
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({
                "error": "not_found",
                "message": format!("No route plan with id: {id}"),
            })),
        )
            .into_response()),
    }
}

/// POST /api/route-plans
pub async fn create_route_plan(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(new_plan): Json<NewRoutePlan>,
) -> ApiResult<(StatusCode, Json<RoutePlan>)> {
    let plan = state.route_plans.create(&user, new_plan).await?;
    Ok((StatusCode::CREATED, Json(plan)))
}
