//! Authorization engine
//!
//! Answers "does user U hold permission P" with a structural admin
//! override. The override is checked first and unconditionally: admin and
//! super_admin are not roles that happen to hold every permission, they
//! bypass the graph entirely. This keeps new permissions from silently
//! drifting out of admin reach.

use crate::rbac::graph::PermissionGraph;
use crate::store::AccessStore;
use crate::users::User;
use fieldops_core::AccessResult;
use std::sync::Arc;
use tracing::debug;

/// The single override predicate. Every call site that needs "is this an
/// all-access role" goes through here; the role names are compared
/// case-insensitively.
pub fn is_full_access_role(role_name: &str) -> bool {
    role_name.eq_ignore_ascii_case("super_admin") || role_name.eq_ignore_ascii_case("admin")
}

/// Permission and role checks for a resolved identity
#[derive(Debug, Clone)]
pub struct AuthorizationEngine {
    graph: PermissionGraph,
}

impl AuthorizationEngine {
    pub fn new(store: Arc<AccessStore>) -> Self {
        Self {
            graph: PermissionGraph::new(store),
        }
    }

    pub fn graph(&self) -> &PermissionGraph {
        &self.graph
    }

    /// True when the user holds an all-access role and is active
    pub fn has_full_access(&self, user: &User) -> bool {
        user.active && user.roles.iter().any(|r| is_full_access_role(r))
    }

    /// Check a single permission name
    ///
    /// Safe to call with arbitrary caller-supplied strings: an unknown or
    /// empty permission name yields false, never an error. Inactive users
    /// are denied everything.
    pub async fn authorize(&self, user: &User, permission: &str) -> AccessResult<bool> {
        if !user.active || permission.trim().is_empty() {
            return Ok(false);
        }

        if self.has_full_access(user) {
            return Ok(true);
        }

        let held = self.graph.permissions_for(user).await?;
        let granted = held.contains(permission);

        if !granted {
            debug!("User {} lacks permission: {}", user.id, permission);
        }
        Ok(granted)
    }

    /// True iff at least one of the names resolves true
    pub async fn authorize_any(&self, user: &User, permissions: &[&str]) -> AccessResult<bool> {
        if !user.active {
            return Ok(false);
        }
        if self.has_full_access(user) {
            return Ok(permissions.iter().any(|p| !p.trim().is_empty()));
        }

        let held = self.graph.permissions_for(user).await?;
        Ok(permissions
            .iter()
            .any(|p| !p.trim().is_empty() && held.contains(*p)))
    }

    /// True iff every name resolves true
    pub async fn authorize_all(&self, user: &User, permissions: &[&str]) -> AccessResult<bool> {
        if !user.active {
            return Ok(false);
        }
        if self.has_full_access(user) {
            return Ok(permissions.iter().all(|p| !p.trim().is_empty()));
        }

        let held = self.graph.permissions_for(user).await?;
        Ok(permissions
            .iter()
            .all(|p| !p.trim().is_empty() && held.contains(*p)))
    }

    /// Module-level gate: override users see every module; others need at
    /// least one permission tagged with the module
    pub async fn can_access_module(&self, user: &User, module: &str) -> AccessResult<bool> {
        if !user.active || module.trim().is_empty() {
            return Ok(false);
        }

        if self.has_full_access(user) {
            return Ok(true);
        }

        let in_module = self.graph.module_permissions(user, module).await?;
        Ok(!in_module.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rbac::{PermissionDef, Role};

    async fn fixture() -> (AuthorizationEngine, Arc<AccessStore>) {
        let store = Arc::new(AccessStore::memory());
        for (name, module) in [
            ("route_plans.view", "route_plans"),
            ("route_plans.create", "route_plans"),
            ("reports.view", "reports"),
            ("users.view", "users"),
        ] {
            store
                .insert_permission(&PermissionDef::new(name, module).unwrap())
                .await
                .unwrap();
        }
        store
            .insert_role(
                &Role::new("viewer")
                    .unwrap()
                    .with_permissions(vec!["route_plans.view".to_string()]),
            )
            .await
            .unwrap();
        (AuthorizationEngine::new(store.clone()), store)
    }

    fn user_with(roles: Vec<&str>, direct: Vec<&str>) -> User {
        let mut user =
            User::new("engine@fieldops.local".to_string(), "secret123", None).unwrap();
        user.roles = roles.into_iter().map(String::from).collect();
        user.direct_permissions = direct.into_iter().map(String::from).collect();
        user
    }

    #[test]
    fn test_full_access_role_predicate() {
        assert!(is_full_access_role("admin"));
        assert!(is_full_access_role("Admin"));
        assert!(is_full_access_role("SUPER_ADMIN"));
        assert!(is_full_access_role("super_admin"));
        assert!(!is_full_access_role("viewer"));
        assert!(!is_full_access_role("administrator"));
        assert!(!is_full_access_role(""));
    }

    #[tokio::test]
    async fn test_no_grants_means_no_access() {
        let (engine, _) = fixture().await;
        let user = user_with(vec![], vec![]);

        assert!(!engine.authorize(&user, "route_plans.view").await.unwrap());
        assert!(!engine.authorize(&user, "anything.at.all").await.unwrap());
    }

    #[tokio::test]
    async fn test_admin_override_covers_unknown_permissions() {
        let (engine, _) = fixture().await;
        let admin = user_with(vec!["admin"], vec![]);

        // Override applies even to names never defined anywhere.
        assert!(engine.authorize(&admin, "route_plans.view").await.unwrap());
        assert!(engine
            .authorize(&admin, "never.defined.permission")
            .await
            .unwrap());
        assert!(engine.can_access_module(&admin, "reports").await.unwrap());
    }

    #[tokio::test]
    async fn test_viewer_scenario() {
        let (engine, _) = fixture().await;
        let alice = user_with(vec!["viewer"], vec![]);

        assert!(engine.authorize(&alice, "route_plans.view").await.unwrap());
        assert!(!engine.authorize(&alice, "route_plans.create").await.unwrap());
    }

    #[tokio::test]
    async fn test_direct_grant_module_access() {
        let (engine, _) = fixture().await;
        let bob = user_with(vec![], vec!["reports.view"]);

        assert!(engine.can_access_module(&bob, "reports").await.unwrap());
        assert!(!engine.can_access_module(&bob, "users").await.unwrap());
    }

    #[tokio::test]
    async fn test_malformed_input_yields_false() {
        let (engine, _) = fixture().await;
        let admin = user_with(vec!["admin"], vec![]);

        assert!(!engine.authorize(&admin, "").await.unwrap());
        assert!(!engine.authorize(&admin, "   ").await.unwrap());
        assert!(!engine.can_access_module(&admin, "").await.unwrap());
    }

    #[tokio::test]
    async fn test_inactive_user_denied_everything() {
        let (engine, _) = fixture().await;
        let mut admin = user_with(vec!["super_admin"], vec![]);
        admin.active = false;

        assert!(!engine.authorize(&admin, "route_plans.view").await.unwrap());
        assert!(!engine.can_access_module(&admin, "route_plans").await.unwrap());
    }

    #[tokio::test]
    async fn test_authorize_any_and_all() {
        let (engine, _) = fixture().await;
        let alice = user_with(vec!["viewer"], vec![]);

        assert!(engine
            .authorize_any(&alice, &["route_plans.create", "route_plans.view"])
            .await
            .unwrap());
        assert!(!engine
            .authorize_all(&alice, &["route_plans.create", "route_plans.view"])
            .await
            .unwrap());
        assert!(engine
            .authorize_all(&alice, &["route_plans.view"])
            .await
            .unwrap());
        assert!(!engine.authorize_any(&alice, &[]).await.unwrap());
        assert!(engine.authorize_all(&alice, &[]).await.unwrap());
    }

    #[tokio::test]
    async fn test_revocation_is_immediately_visible() {
        let (engine, store) = fixture().await;
        let mut user = user_with(vec![], vec!["reports.view"]);
        store.insert_user(&user).await.unwrap();

        assert!(engine.authorize(&user, "reports.view").await.unwrap());

        user.direct_permissions.clear();
        store.update_user(&user).await.unwrap();
        let reloaded = store.get_user_by_id(&user.id).await.unwrap().unwrap();

        assert!(!engine.authorize(&reloaded, "reports.view").await.unwrap());
    }
}
