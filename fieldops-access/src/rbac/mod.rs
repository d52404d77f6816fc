//! Role/permission graph and authorization engine

pub mod engine;
pub mod graph;
pub mod types;

pub use engine::{is_full_access_role, AuthorizationEngine};
pub use graph::PermissionGraph;
pub use types::{PermissionDef, Role};
