//! Durable storage for users, roles, and permission definitions
//!
//! Two backends behind one store type: in-memory for development and
//! tests, SQLite for production. Grant/revoke mutations made through the
//! store are visible to the next read; the SQLite backend invalidates its
//! row cache synchronously inside each mutation.

mod memory;
#[cfg(feature = "sqlite")]
mod sqlite;

pub use memory::MemoryAccessStore;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteAccessStore;

use crate::rbac::{PermissionDef, Role};
use crate::users::User;
use fieldops_core::AccessResult;

/// Store abstraction supporting both in-memory and database storage
#[derive(Debug, Clone)]
pub enum AccessStore {
    /// In-memory storage (for development and testing)
    Memory(MemoryAccessStore),
    /// Database storage (for production)
    #[cfg(feature = "sqlite")]
    Database(SqliteAccessStore),
}

impl Default for AccessStore {
    fn default() -> Self {
        Self::memory()
    }
}

impl AccessStore {
    /// Create an in-memory store
    pub fn memory() -> Self {
        Self::Memory(MemoryAccessStore::new())
    }

    /// Create a database-backed store
    #[cfg(feature = "sqlite")]
    pub async fn database(pool: sqlx::SqlitePool) -> AccessResult<Self> {
        Ok(Self::Database(SqliteAccessStore::new(pool).await?))
    }

    /// Insert a new user; fails with a validation error when the email is
    /// already taken
    pub async fn insert_user(&self, user: &User) -> AccessResult<()> {
        match self {
            Self::Memory(store) => store.insert_user(user).await,
            #[cfg(feature = "sqlite")]
            Self::Database(store) => store.insert_user(user).await,
        }
    }

    pub async fn get_user_by_id(&self, user_id: &str) -> AccessResult<Option<User>> {
        match self {
            Self::Memory(store) => store.get_user_by_id(user_id).await,
            #[cfg(feature = "sqlite")]
            Self::Database(store) => store.get_user_by_id(user_id).await,
        }
    }

    pub async fn get_user_by_email(&self, email: &str) -> AccessResult<Option<User>> {
        match self {
            Self::Memory(store) => store.get_user_by_email(email).await,
            #[cfg(feature = "sqlite")]
            Self::Database(store) => store.get_user_by_email(email).await,
        }
    }

    /// Overwrite an existing user row. Used by grant/revoke operations;
    /// the change is visible to the next read.
    pub async fn update_user(&self, user: &User) -> AccessResult<()> {
        match self {
            Self::Memory(store) => store.update_user(user).await,
            #[cfg(feature = "sqlite")]
            Self::Database(store) => store.update_user(user).await,
        }
    }

    /// Insert a new role; fails with a validation error when a role with
    /// the same name (case-insensitive) already exists
    pub async fn insert_role(&self, role: &Role) -> AccessResult<()> {
        match self {
            Self::Memory(store) => store.insert_role(role).await,
            #[cfg(feature = "sqlite")]
            Self::Database(store) => store.insert_role(role).await,
        }
    }

    /// Case-insensitive role lookup
    pub async fn get_role(&self, name: &str) -> AccessResult<Option<Role>> {
        match self {
            Self::Memory(store) => store.get_role(name).await,
            #[cfg(feature = "sqlite")]
            Self::Database(store) => store.get_role(name).await,
        }
    }

    pub async fn update_role(&self, role: &Role) -> AccessResult<()> {
        match self {
            Self::Memory(store) => store.update_role(role).await,
            #[cfg(feature = "sqlite")]
            Self::Database(store) => store.update_role(role).await,
        }
    }

    pub async fn list_roles(&self) -> AccessResult<Vec<Role>> {
        match self {
            Self::Memory(store) => store.list_roles().await,
            #[cfg(feature = "sqlite")]
            Self::Database(store) => store.list_roles().await,
        }
    }

    /// Insert a permission definition; the name is globally unique
    pub async fn insert_permission(&self, permission: &PermissionDef) -> AccessResult<()> {
        match self {
            Self::Memory(store) => store.insert_permission(permission).await,
            #[cfg(feature = "sqlite")]
            Self::Database(store) => store.insert_permission(permission).await,
        }
    }

    pub async fn get_permission(&self, name: &str) -> AccessResult<Option<PermissionDef>> {
        match self {
            Self::Memory(store) => store.get_permission(name).await,
            #[cfg(feature = "sqlite")]
            Self::Database(store) => store.get_permission(name).await,
        }
    }

    pub async fn list_permissions(&self) -> AccessResult<Vec<PermissionDef>> {
        match self {
            Self::Memory(store) => store.list_permissions().await,
            #[cfg(feature = "sqlite")]
            Self::Database(store) => store.list_permissions().await,
        }
    }
}
