//! FieldOps Access - authorization and scoped-access engine
//!
//! Resolves "does user U hold permission P" questions from a role/permission
//! graph with a structural admin override, issues and validates revocable
//! bearer tokens, and restricts row-level data access to a user's assigned
//! geographic states.

pub mod menu;
pub mod rbac;
pub mod records;
pub mod scope;
pub mod service;
pub mod store;
pub mod token;
pub mod users;

// Re-export main types
pub use fieldops_core::{AccessError, AccessResult};
pub use menu::{MenuEntry, MenuProjection, MENU_CATALOG};
pub use rbac::{
    is_full_access_role, AuthorizationEngine, PermissionDef, PermissionGraph, Role,
};
pub use records::{NewRoutePlan, RoutePlan, RoutePlanService, RoutePlanStore};
pub use scope::{StateScope, StateTagged};
pub use service::{AccessService, LoginResponse};
pub use store::AccessStore;
pub use token::{IssuedToken, TokenService, TokenStore};
pub use users::{PublicUser, User};
