//! SQLite storage backend

use crate::rbac::{PermissionDef, Role};
use crate::users::User;
use chrono::{DateTime, Utc};
use fieldops_core::{AccessError, AccessResult};
use sqlx::{Row, SqlitePool};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info};

/// Database user row
struct UserRow {
    id: String,
    email: String,
    display_name: Option<String>,
    password_hash: String,
    roles: String,             // JSON array
    direct_permissions: String, // JSON array
    assigned_states: String,    // JSON array
    active: bool,
    created_at: String, // RFC 3339 string
}

impl UserRow {
    fn into_user(self) -> AccessResult<User> {
        let roles: Vec<String> = serde_json::from_str(&self.roles)
            .map_err(|e| AccessError::storage_with("malformed roles column", "access_store", e))?;
        let direct_permissions: Vec<String> = serde_json::from_str(&self.direct_permissions)
            .map_err(|e| {
                AccessError::storage_with("malformed permissions column", "access_store", e)
            })?;
        let assigned_states: Vec<String> = serde_json::from_str(&self.assigned_states)
            .map_err(|e| AccessError::storage_with("malformed states column", "access_store", e))?;

        let created_at: DateTime<Utc> = self
            .created_at
            .parse()
            .map_err(|_| AccessError::storage("malformed created_at column", "access_store"))?;

        Ok(User {
            id: self.id,
            email: self.email,
            display_name: self.display_name,
            password_hash: self.password_hash,
            roles,
            direct_permissions,
            assigned_states,
            active: self.active,
            created_at,
        })
    }

    fn from_user(user: &User) -> AccessResult<Self> {
        Ok(Self {
            id: user.id.clone(),
            email: user.email.clone(),
            display_name: user.display_name.clone(),
            password_hash: user.password_hash.clone(),
            roles: serde_json::to_string(&user.roles)
                .map_err(|e| AccessError::storage_with("encode roles", "access_store", e))?,
            direct_permissions: serde_json::to_string(&user.direct_permissions)
                .map_err(|e| AccessError::storage_with("encode permissions", "access_store", e))?,
            assigned_states: serde_json::to_string(&user.assigned_states)
                .map_err(|e| AccessError::storage_with("encode states", "access_store", e))?,
            active: user.active,
            created_at: user.created_at.to_rfc3339(),
        })
    }

    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Self {
        Self {
            id: row.get("id"),
            email: row.get("email"),
            display_name: row.get("display_name"),
            password_hash: row.get("password_hash"),
            roles: row.get("roles"),
            direct_permissions: row.get("direct_permissions"),
            assigned_states: row.get("assigned_states"),
            active: row.get("active"),
            created_at: row.get("created_at"),
        }
    }
}

/// Database-backed access store
///
/// Caches user rows by id. Every mutation evicts the affected entry before
/// returning, so a grant or revoke is visible to the next read with no
/// time-based staleness window.
#[derive(Debug, Clone)]
pub struct SqliteAccessStore {
    pool: SqlitePool,
    user_cache: Arc<RwLock<HashMap<String, User>>>,
}

impl SqliteAccessStore {
    pub async fn new(pool: SqlitePool) -> AccessResult<Self> {
        let store = Self {
            pool,
            user_cache: Arc::new(RwLock::new(HashMap::new())),
        };

        store.create_tables().await?;
        Ok(store)
    }

    async fn create_tables(&self) -> AccessResult<()> {
        let query = r#"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                email TEXT UNIQUE NOT NULL,
                display_name TEXT,
                password_hash TEXT NOT NULL,
                roles TEXT NOT NULL DEFAULT '[]',
                direct_permissions TEXT NOT NULL DEFAULT '[]',
                assigned_states TEXT NOT NULL DEFAULT '[]',
                active BOOLEAN NOT NULL DEFAULT TRUE,
                created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_users_email ON users(email);

            CREATE TABLE IF NOT EXISTS roles (
                name TEXT PRIMARY KEY COLLATE NOCASE,
                description TEXT,
                permissions TEXT NOT NULL DEFAULT '[]'
            );

            CREATE TABLE IF NOT EXISTS permissions (
                name TEXT PRIMARY KEY,
                module TEXT NOT NULL,
                description TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_permissions_module ON permissions(module);
        "#;

        sqlx::query(query).execute(&self.pool).await.map_err(|e| {
            error!("Failed to create access tables: {}", e);
            AccessError::storage_with("failed to create tables", "access_store", e)
        })?;

        info!("Access tables created successfully");
        Ok(())
    }

    pub async fn insert_user(&self, user: &User) -> AccessResult<()> {
        let existing = sqlx::query("SELECT COUNT(*) as count FROM users WHERE email = ?")
            .bind(&user.email)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AccessError::storage_with("email lookup failed", "access_store", e))?;

        let count: i64 = existing.get("count");
        if count > 0 {
            return Err(AccessError::validation_field(
                "email is already registered",
                "email",
            ));
        }

        let row = UserRow::from_user(user)?;
        sqlx::query(
            r#"
            INSERT INTO users
                (id, email, display_name, password_hash, roles, direct_permissions, assigned_states, active, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&row.id)
        .bind(&row.email)
        .bind(&row.display_name)
        .bind(&row.password_hash)
        .bind(&row.roles)
        .bind(&row.direct_permissions)
        .bind(&row.assigned_states)
        .bind(row.active)
        .bind(&row.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to insert user: {}", e);
            AccessError::storage_with("failed to insert user", "access_store", e)
        })?;

        debug!("User inserted successfully: {}", user.id);
        Ok(())
    }

    pub async fn get_user_by_id(&self, user_id: &str) -> AccessResult<Option<User>> {
        {
            let cache = self.user_cache.read().await;
            if let Some(user) = cache.get(user_id) {
                return Ok(Some(user.clone()));
            }
        }

        let row = sqlx::query("SELECT * FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AccessError::storage_with("user lookup failed", "access_store", e))?;

        if let Some(row) = row {
            let user = UserRow::from_row(&row).into_user()?;

            let mut cache = self.user_cache.write().await;
            cache.insert(user.id.clone(), user.clone());

            Ok(Some(user))
        } else {
            Ok(None)
        }
    }

    pub async fn get_user_by_email(&self, email: &str) -> AccessResult<Option<User>> {
        let row = sqlx::query("SELECT * FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AccessError::storage_with("user lookup failed", "access_store", e))?;

        match row {
            Some(row) => Ok(Some(UserRow::from_row(&row).into_user()?)),
            None => Ok(None),
        }
    }

    pub async fn update_user(&self, user: &User) -> AccessResult<()> {
        let row = UserRow::from_user(user)?;
        let result = sqlx::query(
            r#"
            UPDATE users
            SET display_name = ?, password_hash = ?, roles = ?,
                direct_permissions = ?, assigned_states = ?, active = ?
            WHERE id = ?
            "#,
        )
        .bind(&row.display_name)
        .bind(&row.password_hash)
        .bind(&row.roles)
        .bind(&row.direct_permissions)
        .bind(&row.assigned_states)
        .bind(row.active)
        .bind(&row.id)
        .execute(&self.pool)
        .await
        .map_err(|e| AccessError::storage_with("failed to update user", "access_store", e))?;

        if result.rows_affected() == 0 {
            return Err(AccessError::storage("user not found", "access_store"));
        }

        // Evict before returning: the next permissions_for must see this
        // grant state, never the cached one.
        let mut cache = self.user_cache.write().await;
        cache.remove(&user.id);

        debug!("Updated user: {}", user.id);
        Ok(())
    }

    pub async fn insert_role(&self, role: &Role) -> AccessResult<()> {
        let permissions = serde_json::to_string(&role.permissions)
            .map_err(|e| AccessError::storage_with("encode permissions", "access_store", e))?;

        // COLLATE NOCASE on the primary key makes this reject
        // case-insensitive duplicates.
        let result = sqlx::query(
            "INSERT OR IGNORE INTO roles (name, description, permissions) VALUES (?, ?, ?)",
        )
        .bind(&role.name)
        .bind(&role.description)
        .bind(&permissions)
        .execute(&self.pool)
        .await
        .map_err(|e| AccessError::storage_with("failed to insert role", "access_store", e))?;

        if result.rows_affected() == 0 {
            return Err(AccessError::validation_field(
                "role name is already taken",
                "name",
            ));
        }

        debug!("Role inserted successfully: {}", role.name);
        Ok(())
    }

    pub async fn get_role(&self, name: &str) -> AccessResult<Option<Role>> {
        let row = sqlx::query("SELECT * FROM roles WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AccessError::storage_with("role lookup failed", "access_store", e))?;

        match row {
            Some(row) => Ok(Some(role_from_row(&row)?)),
            None => Ok(None),
        }
    }

    pub async fn update_role(&self, role: &Role) -> AccessResult<()> {
        let permissions = serde_json::to_string(&role.permissions)
            .map_err(|e| AccessError::storage_with("encode permissions", "access_store", e))?;

        let result = sqlx::query("UPDATE roles SET description = ?, permissions = ? WHERE name = ?")
            .bind(&role.description)
            .bind(&permissions)
            .bind(&role.name)
            .execute(&self.pool)
            .await
            .map_err(|e| AccessError::storage_with("failed to update role", "access_store", e))?;

        if result.rows_affected() == 0 {
            return Err(AccessError::storage("role not found", "access_store"));
        }

        Ok(())
    }

    pub async fn list_roles(&self) -> AccessResult<Vec<Role>> {
        let rows = sqlx::query("SELECT * FROM roles ORDER BY name")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AccessError::storage_with("role listing failed", "access_store", e))?;

        rows.iter().map(role_from_row).collect()
    }

    pub async fn insert_permission(&self, permission: &PermissionDef) -> AccessResult<()> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO permissions (name, module, description) VALUES (?, ?, ?)",
        )
        .bind(&permission.name)
        .bind(&permission.module)
        .bind(&permission.description)
        .execute(&self.pool)
        .await
        .map_err(|e| AccessError::storage_with("failed to insert permission", "access_store", e))?;

        if result.rows_affected() == 0 {
            return Err(AccessError::validation_field(
                "permission name is already taken",
                "name",
            ));
        }

        Ok(())
    }

    pub async fn get_permission(&self, name: &str) -> AccessResult<Option<PermissionDef>> {
        let row = sqlx::query("SELECT * FROM permissions WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AccessError::storage_with("permission lookup failed", "access_store", e))?;

        Ok(row.map(|row| PermissionDef {
            name: row.get("name"),
            module: row.get("module"),
            description: row.get("description"),
        }))
    }

    pub async fn list_permissions(&self) -> AccessResult<Vec<PermissionDef>> {
        let rows = sqlx::query("SELECT * FROM permissions ORDER BY name")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AccessError::storage_with("permission listing failed", "access_store", e))?;

        Ok(rows
            .iter()
            .map(|row| PermissionDef {
                name: row.get("name"),
                module: row.get("module"),
                description: row.get("description"),
            })
            .collect())
    }
}

fn role_from_row(row: &sqlx::sqlite::SqliteRow) -> AccessResult<Role> {
    let permissions_json: String = row.get("permissions");
    let permissions: Vec<String> = serde_json::from_str(&permissions_json)
        .map_err(|e| AccessError::storage_with("malformed permissions column", "access_store", e))?;

    Ok(Role {
        name: row.get("name"),
        description: row.get("description"),
        permissions,
    })
}
