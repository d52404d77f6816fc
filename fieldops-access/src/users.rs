//! User records and credential handling

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{DateTime, Utc};
use fieldops_core::{AccessError, AccessResult};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Internal user data with password hash
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub display_name: Option<String>,
    pub password_hash: String,
    /// Role names held by this user
    pub roles: Vec<String>,
    /// Permission names granted directly, independent of any role
    pub direct_permissions: Vec<String>,
    /// Geographic states this user may see. Empty means no row-level
    /// access for non-admin users.
    pub assigned_states: Vec<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Create a new user with a hashed password
    pub fn new(email: String, password: &str, display_name: Option<String>) -> AccessResult<Self> {
        if email.is_empty() {
            return Err(AccessError::validation_field("email is required", "email"));
        }
        if password.len() < 6 {
            return Err(AccessError::validation_field(
                "password must be at least 6 characters",
                "password",
            ));
        }

        let password_hash = hash_password(password)?;

        Ok(Self {
            id: Uuid::new_v4().to_string(),
            email,
            display_name,
            password_hash,
            roles: Vec::new(),
            direct_permissions: Vec::new(),
            assigned_states: Vec::new(),
            active: true,
            created_at: Utc::now(),
        })
    }

    /// Verify password against the stored hash
    pub fn verify_password(&self, password: &str) -> bool {
        verify_password(password, &self.password_hash).unwrap_or(false)
    }

    /// Convert to public user info
    pub fn to_public(&self) -> PublicUser {
        PublicUser {
            id: self.id.clone(),
            email: self.email.clone(),
            display_name: self.display_name.clone(),
            roles: self.roles.clone(),
            direct_permissions: self.direct_permissions.clone(),
            assigned_states: self.assigned_states.clone(),
            active: self.active,
            created_at: self.created_at,
        }
    }
}

/// Public user information, safe to return to clients
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicUser {
    pub id: String,
    pub email: String,
    pub display_name: Option<String>,
    pub roles: Vec<String>,
    pub direct_permissions: Vec<String>,
    pub assigned_states: Vec<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

/// Hash password using Argon2
pub(crate) fn hash_password(password: &str) -> AccessResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AccessError::storage("password hashing failed", "credentials"))
}

/// Verify password against a hash
pub(crate) fn verify_password(password: &str, hash: &str) -> AccessResult<bool> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|_| AccessError::storage("malformed password hash", "credentials"))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}
