//! Access service facade
//!
//! Single entry point tying the store, the token service, and the
//! authorization engine together. The web layer talks to this type only;
//! it never reaches into the stores directly.

use crate::menu::{self, MenuProjection};
use crate::rbac::{AuthorizationEngine, PermissionDef, Role};
use crate::store::AccessStore;
use crate::token::{IssuedToken, TokenService, TokenStore};
use crate::users::{PublicUser, User};
use chrono::{DateTime, Utc};
use fieldops_core::{AccessError, AccessResult};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Successful login payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub user: PublicUser,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Authorization, identity, and token operations behind one facade
#[derive(Clone)]
pub struct AccessService {
    store: Arc<AccessStore>,
    tokens: TokenService,
    engine: AuthorizationEngine,
}

impl AccessService {
    pub fn new(store: Arc<AccessStore>, token_store: Arc<dyn TokenStore>) -> Self {
        let tokens = TokenService::new(token_store, store.clone());
        let engine = AuthorizationEngine::new(store.clone());
        Self {
            store,
            tokens,
            engine,
        }
    }

    pub fn store(&self) -> &AccessStore {
        &self.store
    }

    pub fn engine(&self) -> &AuthorizationEngine {
        &self.engine
    }

    /// Seed the role and permission catalog plus the bootstrap admin
    /// account. Idempotent: existing rows are left alone.
    pub async fn seed_defaults(&self) -> AccessResult<()> {
        for name in ["super_admin", "admin"] {
            if self.store.get_role(name).await?.is_none() {
                let role = Role::new(name)?
                    .with_description("Full access to every module and record");
                self.store.insert_role(&role).await?;
            }
        }

        for def in permission_catalog()? {
            if self.store.get_permission(&def.name).await?.is_none() {
                self.store.insert_permission(&def).await?;
            }
        }

        self.ensure_default_admin().await
    }

    /// Create the bootstrap admin account when no user owns its email.
    /// Credentials come from FIELDOPS_ADMIN_EMAIL / FIELDOPS_ADMIN_PASSWORD
    /// with development defaults.
    async fn ensure_default_admin(&self) -> AccessResult<()> {
        let email = std::env::var("FIELDOPS_ADMIN_EMAIL")
            .unwrap_or_else(|_| "admin@fieldops.local".to_string());
        let password =
            std::env::var("FIELDOPS_ADMIN_PASSWORD").unwrap_or_else(|_| "admin123".to_string());

        if self.store.get_user_by_email(&email).await?.is_some() {
            return Ok(());
        }

        let mut user = User::new(email.clone(), &password, Some("Administrator".to_string()))?;
        user.roles = vec!["super_admin".to_string()];
        self.store.insert_user(&user).await?;

        warn!(
            "Created default admin account: {} (change the password in production)",
            email
        );
        Ok(())
    }

    /// Authenticate with email and password, issuing a fresh bearer token
    ///
    /// Wrong email, wrong password, and deactivated account all fail the
    /// same way.
    pub async fn login(&self, email: &str, password: &str) -> AccessResult<LoginResponse> {
        let user = self
            .store
            .get_user_by_email(email)
            .await?
            .ok_or(AccessError::Unauthenticated)?;

        if !user.active || !user.verify_password(password) {
            debug!("Failed login attempt for: {}", email);
            return Err(AccessError::Unauthenticated);
        }

        let issued = self.tokens.issue(&user).await?;
        info!("User logged in: {}", user.email);

        Ok(LoginResponse {
            user: user.to_public(),
            token: issued.token,
            expires_at: issued.expires_at,
        })
    }

    /// Resolve a bearer token to its user
    pub async fn validate_token(&self, token: &str) -> AccessResult<User> {
        self.tokens.validate(token).await
    }

    /// Revoke the presented token
    pub async fn logout(&self, token: &str) -> AccessResult<()> {
        self.tokens.revoke(token).await
    }

    /// Revoke every token held by the user, on every device
    pub async fn logout_all(&self, user_id: &str) -> AccessResult<u64> {
        self.tokens.revoke_all(user_id).await
    }

    /// Exchange the presented token for a fresh one, atomically
    pub async fn refresh(&self, token: &str) -> AccessResult<IssuedToken> {
        self.tokens.refresh(token).await
    }

    /// Answer a single permission question for the user
    pub async fn check_permission(&self, user: &User, permission: &str) -> AccessResult<bool> {
        self.engine.authorize(user, permission).await
    }

    /// Resolve the capability catalog for the user
    pub async fn accessible_menus(&self, user: &User) -> AccessResult<MenuProjection> {
        menu::resolve(user, self.engine.graph()).await
    }

    /// Register a new user account with no grants
    pub async fn register_user(
        &self,
        email: &str,
        password: &str,
        display_name: Option<String>,
    ) -> AccessResult<PublicUser> {
        let user = User::new(email.to_string(), password, display_name)?;
        self.store.insert_user(&user).await?;
        info!("Registered user: {}", user.email);
        Ok(user.to_public())
    }

    pub async fn create_role(&self, role: Role) -> AccessResult<()> {
        self.store.insert_role(&role).await?;
        info!("Created role: {}", role.name);
        Ok(())
    }

    pub async fn define_permission(&self, def: PermissionDef) -> AccessResult<()> {
        self.store.insert_permission(&def).await?;
        info!("Defined permission: {} [{}]", def.name, def.module);
        Ok(())
    }

    /// Add a permission name to a role; every holder gains it immediately
    pub async fn attach_permission_to_role(
        &self,
        role_name: &str,
        permission: &str,
    ) -> AccessResult<()> {
        let mut role = self
            .store
            .get_role(role_name)
            .await?
            .ok_or_else(|| AccessError::validation_field("unknown role", "role"))?;

        if !role.permissions.iter().any(|p| p == permission) {
            role.permissions.push(permission.to_string());
            self.store.update_role(&role).await?;
        }
        Ok(())
    }

    /// Remove a permission name from a role
    pub async fn detach_permission_from_role(
        &self,
        role_name: &str,
        permission: &str,
    ) -> AccessResult<()> {
        let mut role = self
            .store
            .get_role(role_name)
            .await?
            .ok_or_else(|| AccessError::validation_field("unknown role", "role"))?;

        role.permissions.retain(|p| p != permission);
        self.store.update_role(&role).await
    }

    /// Put the user into a role. The role must exist in the catalog.
    pub async fn assign_role(&self, user_id: &str, role_name: &str) -> AccessResult<()> {
        if self.store.get_role(role_name).await?.is_none() {
            return Err(AccessError::validation_field("unknown role", "role"));
        }

        self.mutate_user(user_id, |user| {
            if !user.roles.iter().any(|r| r.eq_ignore_ascii_case(role_name)) {
                user.roles.push(role_name.to_string());
            }
        })
        .await
    }

    pub async fn unassign_role(&self, user_id: &str, role_name: &str) -> AccessResult<()> {
        self.mutate_user(user_id, |user| {
            user.roles.retain(|r| !r.eq_ignore_ascii_case(role_name));
        })
        .await
    }

    /// Grant a permission directly, independent of any role
    pub async fn grant_permission(&self, user_id: &str, permission: &str) -> AccessResult<()> {
        let permission = permission.to_string();
        self.mutate_user(user_id, move |user| {
            if !user.direct_permissions.contains(&permission) {
                user.direct_permissions.push(permission);
            }
        })
        .await
    }

    /// Revoke a direct grant. The change is visible to the very next
    /// permission check.
    pub async fn revoke_permission(&self, user_id: &str, permission: &str) -> AccessResult<()> {
        self.mutate_user(user_id, |user| {
            user.direct_permissions.retain(|p| p != permission);
        })
        .await
    }

    /// Replace the user's assigned geographic states
    pub async fn set_assigned_states(
        &self,
        user_id: &str,
        states: Vec<String>,
    ) -> AccessResult<()> {
        self.mutate_user(user_id, move |user| {
            user.assigned_states = states;
        })
        .await
    }

    /// Activate or deactivate the account. Deactivation does not revoke
    /// tokens, but validation rejects tokens of inactive users.
    pub async fn set_active(&self, user_id: &str, active: bool) -> AccessResult<()> {
        self.mutate_user(user_id, move |user| {
            user.active = active;
        })
        .await
    }

    async fn mutate_user<F>(&self, user_id: &str, mutate: F) -> AccessResult<()>
    where
        F: FnOnce(&mut User),
    {
        let mut user = self
            .store
            .get_user_by_id(user_id)
            .await?
            .ok_or_else(|| AccessError::validation_field("unknown user", "user_id"))?;

        mutate(&mut user);
        self.store.update_user(&user).await
    }
}

/// The seeded permission catalog, one entry per module capability
fn permission_catalog() -> AccessResult<Vec<PermissionDef>> {
    let mut defs = Vec::new();

    for module in ["promoters", "route_plans", "activities", "users", "roles"] {
        for action in ["view", "create", "edit", "delete"] {
            defs.push(PermissionDef::new(format!("{module}.{action}"), module)?);
        }
    }
    defs.push(PermissionDef::new("dashboard.view", "dashboard")?);
    defs.push(PermissionDef::new("reports.view", "reports")?);

    Ok(defs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::MemoryTokenStore;

    async fn seeded_service() -> AccessService {
        let service = AccessService::new(
            Arc::new(AccessStore::memory()),
            Arc::new(MemoryTokenStore::new()),
        );
        service.seed_defaults().await.unwrap();
        service
    }

    #[tokio::test]
    async fn test_seeding_is_idempotent() {
        let service = seeded_service().await;
        service.seed_defaults().await.unwrap();

        assert!(service.store.get_role("super_admin").await.unwrap().is_some());
        assert!(service
            .store
            .get_permission("route_plans.view")
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_default_admin_can_login() {
        let service = seeded_service().await;
        let response = service.login("admin@fieldops.local", "admin123").await.unwrap();

        assert!(response.user.roles.contains(&"super_admin".to_string()));
        let user = service.validate_token(&response.token).await.unwrap();
        assert_eq!(user.email, "admin@fieldops.local");
    }

    #[tokio::test]
    async fn test_bad_credentials_fail_uniformly() {
        let service = seeded_service().await;

        let wrong_password = service.login("admin@fieldops.local", "nope99").await;
        let wrong_email = service.login("ghost@fieldops.local", "admin123").await;
        assert!(matches!(wrong_password, Err(AccessError::Unauthenticated)));
        assert!(matches!(wrong_email, Err(AccessError::Unauthenticated)));
    }

    #[tokio::test]
    async fn test_logout_revokes_only_that_session() {
        let service = seeded_service().await;
        let first = service.login("admin@fieldops.local", "admin123").await.unwrap();
        let second = service.login("admin@fieldops.local", "admin123").await.unwrap();

        service.logout(&first.token).await.unwrap();
        assert!(service.validate_token(&first.token).await.is_err());
        assert!(service.validate_token(&second.token).await.is_ok());
    }

    #[tokio::test]
    async fn test_logout_all_revokes_every_session() {
        let service = seeded_service().await;
        let first = service.login("admin@fieldops.local", "admin123").await.unwrap();
        let second = service.login("admin@fieldops.local", "admin123").await.unwrap();

        let revoked = service.logout_all(&first.user.id).await.unwrap();
        assert_eq!(revoked, 2);
        assert!(service.validate_token(&first.token).await.is_err());
        assert!(service.validate_token(&second.token).await.is_err());
    }

    #[tokio::test]
    async fn test_grant_and_revoke_visible_immediately() {
        let service = seeded_service().await;
        let bob = service
            .register_user("bob@fieldops.local", "secret123", None)
            .await
            .unwrap();
        let user = service.store.get_user_by_id(&bob.id).await.unwrap().unwrap();

        assert!(!service.check_permission(&user, "reports.view").await.unwrap());

        service.grant_permission(&bob.id, "reports.view").await.unwrap();
        let user = service.store.get_user_by_id(&bob.id).await.unwrap().unwrap();
        assert!(service.check_permission(&user, "reports.view").await.unwrap());

        service.revoke_permission(&bob.id, "reports.view").await.unwrap();
        let user = service.store.get_user_by_id(&bob.id).await.unwrap().unwrap();
        assert!(!service.check_permission(&user, "reports.view").await.unwrap());
    }

    #[tokio::test]
    async fn test_role_attachment_reaches_holders() {
        let service = seeded_service().await;
        let role = Role::new("auditor").unwrap();
        service.create_role(role).await.unwrap();

        let alice = service
            .register_user("alice@fieldops.local", "secret123", None)
            .await
            .unwrap();
        service.assign_role(&alice.id, "auditor").await.unwrap();
        service
            .attach_permission_to_role("auditor", "reports.view")
            .await
            .unwrap();

        let user = service.store.get_user_by_id(&alice.id).await.unwrap().unwrap();
        assert!(service.check_permission(&user, "reports.view").await.unwrap());
        assert!(!service.check_permission(&user, "reports.create").await.unwrap());
    }

    #[tokio::test]
    async fn test_assign_unknown_role_rejected() {
        let service = seeded_service().await;
        let alice = service
            .register_user("alice@fieldops.local", "secret123", None)
            .await
            .unwrap();

        let result = service.assign_role(&alice.id, "ghost_role").await;
        assert!(matches!(result, Err(AccessError::Validation { .. })));
    }

    #[tokio::test]
    async fn test_deactivation_blocks_token_validation() {
        let service = seeded_service().await;
        let maya = service
            .register_user("maya@fieldops.local", "secret123", None)
            .await
            .unwrap();
        let login = service.login("maya@fieldops.local", "secret123").await.unwrap();

        service.set_active(&maya.id, false).await.unwrap();
        assert!(matches!(
            service.validate_token(&login.token).await,
            Err(AccessError::Unauthenticated)
        ));

        // Login attempts also fail while deactivated
        assert!(service.login("maya@fieldops.local", "secret123").await.is_err());
    }

    #[tokio::test]
    async fn test_refresh_through_facade() {
        let service = seeded_service().await;
        let login = service.login("admin@fieldops.local", "admin123").await.unwrap();

        let refreshed = service.refresh(&login.token).await.unwrap();
        assert!(service.validate_token(&login.token).await.is_err());
        assert!(service.validate_token(&refreshed.token).await.is_ok());
    }

    #[tokio::test]
    async fn test_menus_follow_grants() {
        let service = seeded_service().await;
        let admin_login = service.login("admin@fieldops.local", "admin123").await.unwrap();
        let admin = service.validate_token(&admin_login.token).await.unwrap();

        let projection = service.accessible_menus(&admin).await.unwrap();
        assert_eq!(projection.entries.len(), crate::menu::MENU_CATALOG.len());

        let bob = service
            .register_user("bob@fieldops.local", "secret123", None)
            .await
            .unwrap();
        service.grant_permission(&bob.id, "reports.view").await.unwrap();
        let bob = service.store.get_user_by_id(&bob.id).await.unwrap().unwrap();

        let projection = service.accessible_menus(&bob).await.unwrap();
        assert_eq!(projection.entries.len(), 1);
        assert_eq!(projection.entries[0].capability, "reports");
    }
}
