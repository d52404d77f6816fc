//! Menu and capability resolution
//!
//! Projects a user's effective grants onto the static capability catalog
//! so clients can render exactly the surfaces the user may enter. The
//! catalog is fixed at compile time; what varies per user is which
//! entries survive the projection.

use crate::rbac::engine::is_full_access_role;
use crate::rbac::graph::PermissionGraph;
use crate::users::User;
use fieldops_core::AccessResult;
use serde::Serialize;

/// One navigable capability and the permission that unlocks it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MenuEntry {
    pub capability: &'static str,
    pub label: &'static str,
    pub required_permission: &'static str,
    pub module: &'static str,
}

/// The full capability catalog, in display order
pub const MENU_CATALOG: &[MenuEntry] = &[
    MenuEntry {
        capability: "dashboard",
        label: "Dashboard",
        required_permission: "dashboard.view",
        module: "dashboard",
    },
    MenuEntry {
        capability: "promoters",
        label: "Promoters",
        required_permission: "promoters.view",
        module: "promoters",
    },
    MenuEntry {
        capability: "route_plans",
        label: "Route Plans",
        required_permission: "route_plans.view",
        module: "route_plans",
    },
    MenuEntry {
        capability: "activities",
        label: "Activities",
        required_permission: "activities.view",
        module: "activities",
    },
    MenuEntry {
        capability: "reports",
        label: "Reports",
        required_permission: "reports.view",
        module: "reports",
    },
    MenuEntry {
        capability: "users",
        label: "User Management",
        required_permission: "users.view",
        module: "users",
    },
    MenuEntry {
        capability: "roles",
        label: "Roles & Permissions",
        required_permission: "roles.view",
        module: "roles",
    },
];

/// Per-user view of the catalog plus the grants that produced it
#[derive(Debug, Clone, Serialize)]
pub struct MenuProjection {
    pub entries: Vec<MenuEntry>,
    /// Effective permission names, sorted for stable output
    pub permissions: Vec<String>,
    pub roles: Vec<String>,
}

/// Resolve the capability catalog for one user
///
/// Full-access users see the whole catalog regardless of what the graph
/// holds for them. Inactive users resolve to an empty projection.
pub async fn resolve(user: &User, graph: &PermissionGraph) -> AccessResult<MenuProjection> {
    if !user.active {
        return Ok(MenuProjection {
            entries: Vec::new(),
            permissions: Vec::new(),
            roles: user.roles.clone(),
        });
    }

    let held = graph.permissions_for(user).await?;
    let mut permissions: Vec<String> = held.iter().cloned().collect();
    permissions.sort();

    let full_access = user.roles.iter().any(|r| is_full_access_role(r));
    let entries = MENU_CATALOG
        .iter()
        .filter(|entry| full_access || held.contains(entry.required_permission))
        .cloned()
        .collect();

    Ok(MenuProjection {
        entries,
        permissions,
        roles: user.roles.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rbac::Role;
    use crate::store::AccessStore;
    use std::sync::Arc;

    async fn graph_with_viewer_role() -> (PermissionGraph, Arc<AccessStore>) {
        let store = Arc::new(AccessStore::memory());
        let role = Role::new("viewer")
            .unwrap()
            .with_permissions(vec!["dashboard.view".to_string(), "reports.view".to_string()]);
        store.insert_role(&role).await.unwrap();
        (PermissionGraph::new(store.clone()), store)
    }

    fn user_with_roles(roles: &[&str]) -> User {
        let mut user = User::new("menu@fieldops.local".to_string(), "secret123", None).unwrap();
        user.roles = roles.iter().map(|r| r.to_string()).collect();
        user
    }

    #[tokio::test]
    async fn test_admin_sees_full_catalog() {
        let (graph, _) = graph_with_viewer_role().await;
        let user = user_with_roles(&["Admin"]);

        let projection = resolve(&user, &graph).await.unwrap();
        assert_eq!(projection.entries.len(), MENU_CATALOG.len());
    }

    #[tokio::test]
    async fn test_viewer_sees_only_granted_entries() {
        let (graph, _) = graph_with_viewer_role().await;
        let user = user_with_roles(&["viewer"]);

        let projection = resolve(&user, &graph).await.unwrap();
        let capabilities: Vec<&str> =
            projection.entries.iter().map(|e| e.capability).collect();
        assert_eq!(capabilities, vec!["dashboard", "reports"]);
        assert_eq!(
            projection.permissions,
            vec!["dashboard.view", "reports.view"]
        );
    }

    #[tokio::test]
    async fn test_no_grants_empty_projection() {
        let (graph, _) = graph_with_viewer_role().await;
        let user = user_with_roles(&[]);

        let projection = resolve(&user, &graph).await.unwrap();
        assert!(projection.entries.is_empty());
        assert!(projection.permissions.is_empty());
    }

    #[tokio::test]
    async fn test_direct_grant_unlocks_entry() {
        let (graph, _) = graph_with_viewer_role().await;
        let mut user = user_with_roles(&[]);
        user.direct_permissions = vec!["route_plans.view".to_string()];

        let projection = resolve(&user, &graph).await.unwrap();
        assert_eq!(projection.entries.len(), 1);
        assert_eq!(projection.entries[0].capability, "route_plans");
    }

    #[tokio::test]
    async fn test_inactive_user_resolves_empty() {
        let (graph, _) = graph_with_viewer_role().await;
        let mut user = user_with_roles(&["Admin"]);
        user.active = false;

        let projection = resolve(&user, &graph).await.unwrap();
        assert!(projection.entries.is_empty());
    }
}
