//! Authentication extractors and error-to-status mapping

use crate::AppState;
use axum::{
    extract::{FromRef, FromRequestParts},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Json, Response},
};
use fieldops_access::User;
use fieldops_core::AccessError;
use tracing::debug;

/// API error wrapper carrying the status mapping
///
/// `Unauthenticated` is 401, `PermissionDenied` 403, `Validation` 422, and
/// internal failures 500. The 403 body is generic: which grant would have
/// satisfied the check stays in the logs, never in the response.
#[derive(Debug)]
pub struct ApiError(pub AccessError);

impl From<AccessError> for ApiError {
    fn from(error: AccessError) -> Self {
        Self(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        self.0.log();

        let (status, error, message) = match &self.0 {
            AccessError::Unauthenticated => (
                StatusCode::UNAUTHORIZED,
                "unauthenticated",
                "Authentication required".to_string(),
            ),
            AccessError::PermissionDenied { .. } => (
                StatusCode::FORBIDDEN,
                "permission_denied",
                "Permission denied".to_string(),
            ),
            AccessError::Validation { message, field } => {
                let message = match field {
                    Some(field) => format!("{message} (field: {field})"),
                    None => message.clone(),
                };
                (StatusCode::UNPROCESSABLE_ENTITY, "validation_error", message)
            }
            AccessError::Consistency { .. } | AccessError::Storage { .. } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "Internal server error".to_string(),
            ),
        };

        (
            status,
            Json(serde_json::json!({
                "error": error,
                "message": message,
            })),
        )
            .into_response()
    }
}

/// Result type for handlers
pub type ApiResult<T> = Result<T, ApiError>;

/// An authenticated request identity, resolved from the bearer token
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

impl<S> FromRequestParts<S> for AuthUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);
        let token = bearer_token(parts).ok_or(ApiError(AccessError::Unauthenticated))?;

        let user = app_state.access.validate_token(&token).await?;
        Ok(AuthUser(user))
    }
}

/// Like `AuthUser`, but resolves to `None` instead of rejecting when no
/// valid token is presented
#[derive(Debug, Clone)]
pub struct OptionalAuthUser(pub Option<User>);

impl<S> FromRequestParts<S> for OptionalAuthUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);

        let user = match bearer_token(parts) {
            Some(token) => match app_state.access.validate_token(&token).await {
                Ok(user) => Some(user),
                Err(_) => {
                    debug!("Ignoring invalid bearer token on optional-auth route");
                    None
                }
            },
            None => None,
        };

        Ok(OptionalAuthUser(user))
    }
}

/// The raw bearer token, for endpoints that operate on the token itself
/// (logout, refresh) rather than on the identity behind it
#[derive(Debug, Clone)]
pub struct BearerToken(pub String);

impl<S> FromRequestParts<S> for BearerToken
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        bearer_token(parts)
            .map(BearerToken)
            .ok_or(ApiError(AccessError::Unauthenticated))
    }
}

/// Pull the bearer token out of the Authorization header
fn bearer_token(parts: &Parts) -> Option<String> {
    parts
        .headers
        .get(axum::http::header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(|token| token.to_string())
}
