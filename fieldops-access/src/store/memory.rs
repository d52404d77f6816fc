//! In-memory storage backend

use crate::rbac::{PermissionDef, Role};
use crate::users::User;
use fieldops_core::{AccessError, AccessResult};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// In-memory access store for development and testing
#[derive(Debug, Clone, Default)]
pub struct MemoryAccessStore {
    users: Arc<RwLock<HashMap<String, User>>>,
    users_by_email: Arc<RwLock<HashMap<String, String>>>, // email -> user_id
    roles: Arc<RwLock<HashMap<String, Role>>>,            // lowercase name -> role
    permissions: Arc<RwLock<HashMap<String, PermissionDef>>>,
}

impl MemoryAccessStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_user(&self, user: &User) -> AccessResult<()> {
        let mut users = self.users.write().await;
        let mut by_email = self.users_by_email.write().await;

        if by_email.contains_key(&user.email) {
            return Err(AccessError::validation_field(
                "email is already registered",
                "email",
            ));
        }

        by_email.insert(user.email.clone(), user.id.clone());
        users.insert(user.id.clone(), user.clone());

        debug!("Stored user: {}", user.id);
        Ok(())
    }

    pub async fn get_user_by_id(&self, user_id: &str) -> AccessResult<Option<User>> {
        let users = self.users.read().await;
        Ok(users.get(user_id).cloned())
    }

    pub async fn get_user_by_email(&self, email: &str) -> AccessResult<Option<User>> {
        // Take the locks one at a time; insert_user holds both at once.
        let user_id = {
            let by_email = self.users_by_email.read().await;
            by_email.get(email).cloned()
        };

        match user_id {
            Some(id) => self.get_user_by_id(&id).await,
            None => Ok(None),
        }
    }

    pub async fn update_user(&self, user: &User) -> AccessResult<()> {
        let mut users = self.users.write().await;
        if !users.contains_key(&user.id) {
            return Err(AccessError::storage("user not found", "access_store"));
        }
        users.insert(user.id.clone(), user.clone());
        Ok(())
    }

    pub async fn insert_role(&self, role: &Role) -> AccessResult<()> {
        let mut roles = self.roles.write().await;
        let key = role.name.to_lowercase();

        if roles.contains_key(&key) {
            return Err(AccessError::validation_field(
                "role name is already taken",
                "name",
            ));
        }

        roles.insert(key, role.clone());
        debug!("Stored role: {}", role.name);
        Ok(())
    }

    pub async fn get_role(&self, name: &str) -> AccessResult<Option<Role>> {
        let roles = self.roles.read().await;
        Ok(roles.get(&name.to_lowercase()).cloned())
    }

    pub async fn update_role(&self, role: &Role) -> AccessResult<()> {
        let mut roles = self.roles.write().await;
        let key = role.name.to_lowercase();
        if !roles.contains_key(&key) {
            return Err(AccessError::storage("role not found", "access_store"));
        }
        roles.insert(key, role.clone());
        Ok(())
    }

    pub async fn list_roles(&self) -> AccessResult<Vec<Role>> {
        let roles = self.roles.read().await;
        let mut all: Vec<Role> = roles.values().cloned().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(all)
    }

    pub async fn insert_permission(&self, permission: &PermissionDef) -> AccessResult<()> {
        let mut permissions = self.permissions.write().await;

        if permissions.contains_key(&permission.name) {
            return Err(AccessError::validation_field(
                "permission name is already taken",
                "name",
            ));
        }

        permissions.insert(permission.name.clone(), permission.clone());
        Ok(())
    }

    pub async fn get_permission(&self, name: &str) -> AccessResult<Option<PermissionDef>> {
        let permissions = self.permissions.read().await;
        Ok(permissions.get(name).cloned())
    }

    pub async fn list_permissions(&self) -> AccessResult<Vec<PermissionDef>> {
        let permissions = self.permissions.read().await;
        let mut all: Vec<PermissionDef> = permissions.values().cloned().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(all)
    }
}
