//! Access-control error taxonomy
//!
//! Authorization decisions are expressed as explicit failure kinds rather
//! than exceptions or formatted text. Callers match on the variant; the web
//! layer owns the mapping to HTTP statuses and user-facing messages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, warn};

pub type AccessResult<T> = Result<T, AccessError>;

/// Context attached to unexpected failures for debugging and log correlation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorContext {
    /// Unique error ID for tracking
    pub error_id: String,
    /// Timestamp when the error occurred
    pub timestamp: DateTime<Utc>,
    /// Component where the error originated
    pub component: String,
    /// Operation being performed when the error occurred
    pub operation: Option<String>,
}

impl ErrorContext {
    pub fn new(component: &str) -> Self {
        Self {
            error_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            component: component.to_string(),
            operation: None,
        }
    }

    pub fn with_operation(mut self, operation: &str) -> Self {
        self.operation = Some(operation.to_string());
        self
    }
}

/// Failure kinds emitted by the access-control engine
///
/// `Unauthenticated` (no valid identity) is deliberately distinct from
/// `PermissionDenied` (valid identity, insufficient grants) so clients can
/// distinguish "log in again" from "you lack access".
#[derive(Error, Debug)]
pub enum AccessError {
    /// Missing, malformed, expired, or revoked credential. Carries no
    /// detail about which of those applied.
    #[error("authentication required")]
    Unauthenticated,

    /// Valid identity with insufficient permission, role, or state scope.
    /// Only echoes what the caller already asked for.
    #[error("permission denied")]
    PermissionDenied {
        /// The permission the caller requested, if any
        permission: Option<String>,
    },

    /// Structurally invalid input to a mutating operation
    #[error("validation error: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    /// An atomic store operation partially failed. Should not occur; the
    /// store rolls back before surfacing this.
    #[error("consistency error: {message}")]
    Consistency {
        message: String,
        context: ErrorContext,
    },

    /// Underlying store failure
    #[error("storage error: {message}")]
    Storage {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        context: ErrorContext,
    },
}

impl AccessError {
    pub fn permission_denied(permission: &str) -> Self {
        Self::PermissionDenied {
            permission: Some(permission.to_string()),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            field: None,
        }
    }

    pub fn validation_field(message: impl Into<String>, field: &str) -> Self {
        Self::Validation {
            message: message.into(),
            field: Some(field.to_string()),
        }
    }

    pub fn consistency(message: impl Into<String>, component: &str) -> Self {
        Self::Consistency {
            message: message.into(),
            context: ErrorContext::new(component),
        }
    }

    pub fn storage(message: impl Into<String>, component: &str) -> Self {
        Self::Storage {
            message: message.into(),
            source: None,
            context: ErrorContext::new(component),
        }
    }

    pub fn storage_with(
        message: impl Into<String>,
        component: &str,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Storage {
            message: message.into(),
            source: Some(Box::new(source)),
            context: ErrorContext::new(component),
        }
    }

    /// Get the error context, if this kind carries one
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            AccessError::Consistency { context, .. } => Some(context),
            AccessError::Storage { context, .. } => Some(context),
            _ => None,
        }
    }

    /// True for failures that must surface as an authentication problem
    /// rather than an authorization problem
    pub fn is_authentication(&self) -> bool {
        matches!(self, AccessError::Unauthenticated)
    }

    /// Authentication and authorization failures are terminal for the
    /// current operation; nothing here is worth retrying
    pub fn is_recoverable(&self) -> bool {
        false
    }

    /// Log the error with the appropriate level
    pub fn log(&self) {
        match self {
            AccessError::Unauthenticated | AccessError::PermissionDenied { .. } => {
                warn!(error = %self, "Access denied");
            }
            AccessError::Validation { field, .. } => {
                warn!(error = %self, field = ?field, "Validation error");
            }
            AccessError::Consistency { context, .. } | AccessError::Storage { context, .. } => {
                error!(
                    error_id = %context.error_id,
                    component = %context.component,
                    error = %self,
                    "Store error"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authentication_distinct_from_authorization() {
        let unauthenticated = AccessError::Unauthenticated;
        let denied = AccessError::permission_denied("users.view");

        assert!(unauthenticated.is_authentication());
        assert!(!denied.is_authentication());
    }

    #[test]
    fn test_denied_only_echoes_requested_permission() {
        let denied = AccessError::permission_denied("route_plans.create");
        match denied {
            AccessError::PermissionDenied { permission } => {
                assert_eq!(permission.as_deref(), Some("route_plans.create"));
            }
            _ => panic!("expected PermissionDenied"),
        }
    }

    #[test]
    fn test_storage_error_has_context() {
        let err = AccessError::storage("connection lost", "token_store");
        let context = err.context().expect("storage carries context");
        assert_eq!(context.component, "token_store");
        assert!(!context.error_id.is_empty());
    }

    #[test]
    fn test_access_failures_are_terminal() {
        assert!(!AccessError::Unauthenticated.is_recoverable());
        assert!(!AccessError::permission_denied("x").is_recoverable());
    }
}
