//! State-scope filtering
//!
//! Row-level access control by assigned geographic state. The scope is a
//! predicate stage: data-access code derives it once per identity and
//! composes it with its own query constraints before pagination, rather
//! than filtering fetched rows after the fact.
//!
//! State names match exactly, case-sensitively, between user assignment
//! and record field. "Gujarat" and "GUJARAT" are different states as far
//! as this filter is concerned; normalization would change behavior for
//! existing data and is deliberately not done here.

use crate::rbac::is_full_access_role;
use crate::users::User;
use serde::{Deserialize, Serialize};

/// Record types that carry a state tag
pub trait StateTagged {
    fn state(&self) -> &str;
}

/// The state scope derived from an identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StateScope {
    /// Admin override: every state is visible
    All,
    /// Only these states are visible. An empty list denies every row.
    States(Vec<String>),
}

impl StateScope {
    /// Derive the scope for a user. Full-access roles see everything;
    /// everyone else sees exactly their assigned states. An inactive user
    /// gets the empty scope regardless of role.
    pub fn for_user(user: &User) -> Self {
        if !user.active {
            return Self::States(Vec::new());
        }
        if user.roles.iter().any(|r| is_full_access_role(r)) {
            Self::All
        } else {
            Self::States(user.assigned_states.clone())
        }
    }

    /// Single-record check (exact, case-sensitive match)
    pub fn allows(&self, state: &str) -> bool {
        match self {
            Self::All => true,
            Self::States(states) => states.iter().any(|s| s == state),
        }
    }

    /// True when this scope cannot match any row. Callers use this to
    /// short-circuit to an empty result without touching the store.
    pub fn denies_all(&self) -> bool {
        matches!(self, Self::States(states) if states.is_empty())
    }

    /// Filter an owned record set down to the visible rows. For the
    /// in-memory backend and small sets only; database-backed listings
    /// push the scope into the query instead.
    pub fn filter<T: StateTagged>(&self, records: Vec<T>) -> Vec<T> {
        match self {
            Self::All => records,
            Self::States(_) => records
                .into_iter()
                .filter(|r| self.allows(r.state()))
                .collect(),
        }
    }

    /// The state list for query composition, None for the unfiltered scope
    pub fn states(&self) -> Option<&[String]> {
        match self {
            Self::All => None,
            Self::States(states) => Some(states),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Row {
        state: String,
    }

    impl StateTagged for Row {
        fn state(&self) -> &str {
            &self.state
        }
    }

    fn rows(states: &[&str]) -> Vec<Row> {
        states
            .iter()
            .map(|s| Row {
                state: s.to_string(),
            })
            .collect()
    }

    fn user_with_states(states: Vec<&str>) -> User {
        let mut user =
            User::new("scope@fieldops.local".to_string(), "secret123", None).unwrap();
        user.assigned_states = states.into_iter().map(String::from).collect();
        user
    }

    #[test]
    fn test_admin_sees_full_record_set() {
        let mut admin = user_with_states(vec![]);
        admin.roles.push("Super_Admin".to_string());

        let scope = StateScope::for_user(&admin);
        assert_eq!(scope, StateScope::All);

        let input = rows(&["Gujarat", "Punjab", "Kerala"]);
        assert_eq!(scope.filter(input).len(), 3);
        assert!(scope.allows("Anywhere"));
    }

    #[test]
    fn test_empty_assignment_fails_closed() {
        let user = user_with_states(vec![]);
        let scope = StateScope::for_user(&user);

        assert!(scope.denies_all());
        assert!(!scope.allows("Gujarat"));
        assert!(scope.filter(rows(&["Gujarat", "Punjab"])).is_empty());
    }

    #[test]
    fn test_assigned_states_filter() {
        let carol = user_with_states(vec!["Gujarat", "Punjab"]);
        let scope = StateScope::for_user(&carol);

        let input = rows(&["Gujarat", "Punjab", "Kerala", "Gujarat", "Assam"]);
        let visible = scope.filter(input);

        assert_eq!(visible.len(), 3);
        assert!(visible.iter().all(|r| r.state == "Gujarat" || r.state == "Punjab"));
    }

    #[test]
    fn test_match_is_case_sensitive() {
        let user = user_with_states(vec!["Gujarat"]);
        let scope = StateScope::for_user(&user);

        assert!(scope.allows("Gujarat"));
        assert!(!scope.allows("GUJARAT"));
        assert!(!scope.allows("gujarat"));
    }

    #[test]
    fn test_inactive_user_scope_is_empty() {
        let mut admin = user_with_states(vec!["Gujarat"]);
        admin.roles.push("admin".to_string());
        admin.active = false;

        let scope = StateScope::for_user(&admin);
        assert!(scope.denies_all());
    }
}
