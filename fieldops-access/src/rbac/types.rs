//! Role and permission definitions

use fieldops_core::{AccessError, AccessResult};
use serde::{Deserialize, Serialize};

/// Named role with its associated permission names
///
/// Role names are unique under case-insensitive comparison; "Admin" and
/// "admin" are the same role.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Role {
    pub name: String,
    pub description: Option<String>,
    /// Permission names granted through this role
    pub permissions: Vec<String>,
}

impl Role {
    pub fn new(name: impl Into<String>) -> AccessResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(AccessError::validation_field("role name is required", "name"));
        }

        Ok(Self {
            name,
            description: None,
            permissions: Vec::new(),
        })
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_permissions(mut self, permissions: Vec<String>) -> Self {
        self.permissions = permissions;
        self
    }

    /// Case-insensitive name comparison, the same rule the store uses for
    /// uniqueness
    pub fn name_matches(&self, other: &str) -> bool {
        self.name.eq_ignore_ascii_case(other)
    }
}

/// Named capability scoped to a module tag
///
/// Permission names are globally unique (e.g. "users.view"); the module
/// tag classifies them for menu grouping and module-level access checks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionDef {
    pub name: String,
    pub module: String,
    pub description: Option<String>,
}

impl PermissionDef {
    pub fn new(name: impl Into<String>, module: impl Into<String>) -> AccessResult<Self> {
        let name = name.into();
        let module = module.into();

        if name.trim().is_empty() {
            return Err(AccessError::validation_field(
                "permission name is required",
                "name",
            ));
        }
        if module.trim().is_empty() {
            return Err(AccessError::validation_field(
                "permission module is required",
                "module",
            ));
        }

        Ok(Self {
            name,
            module,
            description: None,
        })
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_name_match_is_case_insensitive() {
        let role = Role::new("Super_Admin").unwrap();
        assert!(role.name_matches("super_admin"));
        assert!(role.name_matches("SUPER_ADMIN"));
        assert!(!role.name_matches("admin"));
    }

    #[test]
    fn test_empty_role_name_rejected() {
        assert!(matches!(Role::new("  "), Err(AccessError::Validation { .. })));
    }

    #[test]
    fn test_permission_requires_module() {
        assert!(PermissionDef::new("users.view", "users").is_ok());
        assert!(matches!(
            PermissionDef::new("users.view", ""),
            Err(AccessError::Validation { .. })
        ));
    }
}
