//! Role/permission graph queries
//!
//! Read-only resolution of the Users -> Roles -> Permissions graph plus
//! direct User -> Permission grants. Every call reads the committed tables
//! through the store; there is no graph-level cache, so a grant or revoke
//! is reflected by the very next query.

use crate::rbac::Role;
use crate::store::AccessStore;
use crate::users::User;
use fieldops_core::AccessResult;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

/// Query-only view of the role/permission graph
#[derive(Debug, Clone)]
pub struct PermissionGraph {
    store: Arc<AccessStore>,
}

impl PermissionGraph {
    pub fn new(store: Arc<AccessStore>) -> Self {
        Self { store }
    }

    /// Union of role-derived and directly-granted permission names
    ///
    /// A user with no roles and no direct grants resolves to the empty
    /// set. Role names with no matching role are skipped, not errors.
    pub async fn permissions_for(&self, user: &User) -> AccessResult<HashSet<String>> {
        let mut permissions: HashSet<String> =
            user.direct_permissions.iter().cloned().collect();

        for role_name in &user.roles {
            match self.store.get_role(role_name).await? {
                Some(role) => permissions.extend(role.permissions.iter().cloned()),
                None => debug!("User {} holds unknown role: {}", user.id, role_name),
            }
        }

        Ok(permissions)
    }

    /// Roles held by the user, resolved against the role catalog
    pub async fn roles_for(&self, user: &User) -> AccessResult<Vec<Role>> {
        let mut roles = Vec::with_capacity(user.roles.len());
        for role_name in &user.roles {
            if let Some(role) = self.store.get_role(role_name).await? {
                roles.push(role);
            }
        }
        Ok(roles)
    }

    /// Subset of the user's permissions whose definition carries the given
    /// module tag. Granted names without a definition are excluded, since
    /// their module is unknown.
    pub async fn module_permissions(
        &self,
        user: &User,
        module: &str,
    ) -> AccessResult<HashSet<String>> {
        let held = self.permissions_for(user).await?;
        let mut in_module = HashSet::new();

        for name in held {
            if let Some(def) = self.store.get_permission(&name).await? {
                if def.module == module {
                    in_module.insert(name);
                }
            }
        }

        Ok(in_module)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rbac::PermissionDef;

    async fn store_with_viewer_role() -> Arc<AccessStore> {
        let store = Arc::new(AccessStore::memory());
        store
            .insert_permission(&PermissionDef::new("route_plans.view", "route_plans").unwrap())
            .await
            .unwrap();
        store
            .insert_permission(&PermissionDef::new("reports.view", "reports").unwrap())
            .await
            .unwrap();
        store
            .insert_role(
                &Role::new("viewer")
                    .unwrap()
                    .with_permissions(vec!["route_plans.view".to_string()]),
            )
            .await
            .unwrap();
        store
    }

    fn user_with(roles: Vec<&str>, direct: Vec<&str>) -> User {
        let mut user =
            User::new("graph@fieldops.local".to_string(), "secret123", None).unwrap();
        user.roles = roles.into_iter().map(String::from).collect();
        user.direct_permissions = direct.into_iter().map(String::from).collect();
        user
    }

    #[tokio::test]
    async fn test_union_of_role_and_direct_grants() {
        let store = store_with_viewer_role().await;
        let graph = PermissionGraph::new(store);

        let user = user_with(vec!["viewer"], vec!["reports.view"]);
        let permissions = graph.permissions_for(&user).await.unwrap();

        assert!(permissions.contains("route_plans.view"));
        assert!(permissions.contains("reports.view"));
        assert_eq!(permissions.len(), 2);
    }

    #[tokio::test]
    async fn test_no_grants_resolves_to_empty_set() {
        let store = store_with_viewer_role().await;
        let graph = PermissionGraph::new(store);

        let user = user_with(vec![], vec![]);
        let permissions = graph.permissions_for(&user).await.unwrap();
        assert!(permissions.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_role_is_skipped() {
        let store = store_with_viewer_role().await;
        let graph = PermissionGraph::new(store);

        let user = user_with(vec!["ghost_role"], vec![]);
        let permissions = graph.permissions_for(&user).await.unwrap();
        assert!(permissions.is_empty());
    }

    #[tokio::test]
    async fn test_module_permissions_filters_by_tag() {
        let store = store_with_viewer_role().await;
        let graph = PermissionGraph::new(store);

        let user = user_with(vec!["viewer"], vec!["reports.view"]);
        let reports = graph.module_permissions(&user, "reports").await.unwrap();
        assert_eq!(reports.len(), 1);
        assert!(reports.contains("reports.view"));

        let users_module = graph.module_permissions(&user, "users").await.unwrap();
        assert!(users_module.is_empty());
    }

    #[tokio::test]
    async fn test_undefined_permission_has_no_module() {
        let store = store_with_viewer_role().await;
        let graph = PermissionGraph::new(store);

        // Granted but never defined: held, but counted in no module.
        let user = user_with(vec![], vec!["phantom.capability"]);
        assert!(graph
            .permissions_for(&user)
            .await
            .unwrap()
            .contains("phantom.capability"));
        assert!(graph
            .module_permissions(&user, "phantom")
            .await
            .unwrap()
            .is_empty());
    }
}
