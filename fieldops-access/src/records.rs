//! Route-plan records
//!
//! A small data-access surface for the route-plan domain showing how the
//! state scope composes with real queries: listings push the scope into
//! the query before pagination, single-record reads check the scope per
//! row, and writes refuse states outside the caller's scope.

use crate::rbac::AuthorizationEngine;
use crate::scope::{StateScope, StateTagged};
use crate::users::User;
use chrono::{DateTime, NaiveDate, Utc};
use fieldops_core::{AccessError, AccessResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

#[cfg(feature = "sqlite")]
use sqlx::{Row, SqlitePool};

/// One day's planned route for a field promoter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutePlan {
    pub id: String,
    pub title: String,
    /// Geographic state the route runs in; drives row-level visibility
    pub state: String,
    pub assignee: String,
    pub plan_date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

impl StateTagged for RoutePlan {
    fn state(&self) -> &str {
        &self.state
    }
}

/// Fields supplied by the caller when creating a route plan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRoutePlan {
    pub title: String,
    pub state: String,
    pub assignee: String,
    pub plan_date: NaiveDate,
}

impl NewRoutePlan {
    fn into_route_plan(self) -> AccessResult<RoutePlan> {
        if self.title.trim().is_empty() {
            return Err(AccessError::validation_field("title is required", "title"));
        }
        if self.state.trim().is_empty() {
            return Err(AccessError::validation_field("state is required", "state"));
        }

        Ok(RoutePlan {
            id: Uuid::new_v4().to_string(),
            title: self.title,
            state: self.state,
            assignee: self.assignee,
            plan_date: self.plan_date,
            created_at: Utc::now(),
        })
    }
}

/// Store abstraction supporting both in-memory and database storage
#[derive(Debug, Clone)]
pub enum RoutePlanStore {
    Memory(MemoryRoutePlanStore),
    #[cfg(feature = "sqlite")]
    Database(SqliteRoutePlanStore),
}

impl Default for RoutePlanStore {
    fn default() -> Self {
        Self::memory()
    }
}

impl RoutePlanStore {
    pub fn memory() -> Self {
        Self::Memory(MemoryRoutePlanStore::new())
    }

    #[cfg(feature = "sqlite")]
    pub async fn database(pool: SqlitePool) -> AccessResult<Self> {
        Ok(Self::Database(SqliteRoutePlanStore::new(pool).await?))
    }

    pub async fn insert(&self, plan: &RoutePlan) -> AccessResult<()> {
        match self {
            Self::Memory(store) => store.insert(plan).await,
            #[cfg(feature = "sqlite")]
            Self::Database(store) => store.insert(plan).await,
        }
    }

    pub async fn get(&self, id: &str) -> AccessResult<Option<RoutePlan>> {
        match self {
            Self::Memory(store) => store.get(id).await,
            #[cfg(feature = "sqlite")]
            Self::Database(store) => store.get(id).await,
        }
    }

    /// Scoped, paginated listing. The scope constrains the query itself,
    /// so the limit/offset window is taken over visible rows only.
    pub async fn list(
        &self,
        scope: &StateScope,
        limit: i64,
        offset: i64,
    ) -> AccessResult<Vec<RoutePlan>> {
        if scope.denies_all() {
            return Ok(Vec::new());
        }
        match self {
            Self::Memory(store) => store.list(scope, limit, offset).await,
            #[cfg(feature = "sqlite")]
            Self::Database(store) => store.list(scope, limit, offset).await,
        }
    }
}

/// In-memory route-plan storage
#[derive(Debug, Clone, Default)]
pub struct MemoryRoutePlanStore {
    plans: Arc<RwLock<HashMap<String, RoutePlan>>>,
}

impl MemoryRoutePlanStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn insert(&self, plan: &RoutePlan) -> AccessResult<()> {
        self.plans
            .write()
            .await
            .insert(plan.id.clone(), plan.clone());
        Ok(())
    }

    async fn get(&self, id: &str) -> AccessResult<Option<RoutePlan>> {
        Ok(self.plans.read().await.get(id).cloned())
    }

    async fn list(
        &self,
        scope: &StateScope,
        limit: i64,
        offset: i64,
    ) -> AccessResult<Vec<RoutePlan>> {
        let all: Vec<RoutePlan> = self.plans.read().await.values().cloned().collect();
        let mut visible = scope.filter(all);
        visible.sort_by(|a, b| {
            b.plan_date
                .cmp(&a.plan_date)
                .then_with(|| a.id.cmp(&b.id))
        });

        Ok(visible
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }
}

/// SQLite route-plan storage
#[cfg(feature = "sqlite")]
#[derive(Debug, Clone)]
pub struct SqliteRoutePlanStore {
    pool: SqlitePool,
}

#[cfg(feature = "sqlite")]
impl SqliteRoutePlanStore {
    pub async fn new(pool: SqlitePool) -> AccessResult<Self> {
        let store = Self { pool };
        store.create_tables().await?;
        Ok(store)
    }

    async fn create_tables(&self) -> AccessResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS route_plans (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                state TEXT NOT NULL,
                assignee TEXT NOT NULL,
                plan_date TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_route_plans_state ON route_plans(state);
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AccessError::storage_with("create route_plans table", "route_plan_store", e))?;

        Ok(())
    }

    async fn insert(&self, plan: &RoutePlan) -> AccessResult<()> {
        sqlx::query(
            r#"
            INSERT INTO route_plans (id, title, state, assignee, plan_date, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&plan.id)
        .bind(&plan.title)
        .bind(&plan.state)
        .bind(&plan.assignee)
        .bind(plan.plan_date.to_string())
        .bind(plan.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| AccessError::storage_with("insert route plan", "route_plan_store", e))?;

        Ok(())
    }

    async fn get(&self, id: &str) -> AccessResult<Option<RoutePlan>> {
        let row = sqlx::query("SELECT * FROM route_plans WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AccessError::storage_with("load route plan", "route_plan_store", e))?;

        row.map(|r| plan_from_row(&r)).transpose()
    }

    async fn list(
        &self,
        scope: &StateScope,
        limit: i64,
        offset: i64,
    ) -> AccessResult<Vec<RoutePlan>> {
        // The scope becomes a WHERE clause so pagination windows over
        // visible rows, not over rows the caller may not see.
        let mut sql = String::from("SELECT * FROM route_plans");
        if let Some(states) = scope.states() {
            let placeholders = vec!["?"; states.len()].join(", ");
            sql.push_str(&format!(" WHERE state IN ({placeholders})"));
        }
        sql.push_str(" ORDER BY plan_date DESC, id ASC LIMIT ? OFFSET ?");

        let mut query = sqlx::query(&sql);
        if let Some(states) = scope.states() {
            for state in states {
                query = query.bind(state);
            }
        }
        let rows = query
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AccessError::storage_with("list route plans", "route_plan_store", e))?;

        rows.iter().map(plan_from_row).collect()
    }
}

#[cfg(feature = "sqlite")]
fn plan_from_row(row: &sqlx::sqlite::SqliteRow) -> AccessResult<RoutePlan> {
    let plan_date: String = row.get("plan_date");
    let created_at: String = row.get("created_at");

    Ok(RoutePlan {
        id: row.get("id"),
        title: row.get("title"),
        state: row.get("state"),
        assignee: row.get("assignee"),
        plan_date: plan_date
            .parse()
            .map_err(|_| AccessError::storage("malformed plan_date column", "route_plan_store"))?,
        created_at: created_at
            .parse()
            .map_err(|_| AccessError::storage("malformed created_at column", "route_plan_store"))?,
    })
}

/// Permission- and scope-gated access to route plans
#[derive(Clone)]
pub struct RoutePlanService {
    store: RoutePlanStore,
    engine: AuthorizationEngine,
}

impl RoutePlanService {
    pub fn new(store: RoutePlanStore, engine: AuthorizationEngine) -> Self {
        Self { store, engine }
    }

    /// List the route plans visible to the caller, most recent plan date
    /// first
    pub async fn list(
        &self,
        user: &User,
        limit: i64,
        offset: i64,
    ) -> AccessResult<Vec<RoutePlan>> {
        if !self.engine.authorize(user, "route_plans.view").await? {
            return Err(AccessError::permission_denied("route_plans.view"));
        }

        let scope = StateScope::for_user(user);
        self.store.list(&scope, limit, offset).await
    }

    /// Fetch a single route plan. A plan outside the caller's state scope
    /// is denied, not hidden behind a not-found.
    pub async fn get(&self, user: &User, id: &str) -> AccessResult<Option<RoutePlan>> {
        if !self.engine.authorize(user, "route_plans.view").await? {
            return Err(AccessError::permission_denied("route_plans.view"));
        }

        let Some(plan) = self.store.get(id).await? else {
            return Ok(None);
        };

        let scope = StateScope::for_user(user);
        if !scope.allows(&plan.state) {
            debug!("User {} denied out-of-scope route plan {}", user.id, id);
            return Err(AccessError::permission_denied("route_plans.view"));
        }

        Ok(Some(plan))
    }

    /// Create a route plan in a state the caller is scoped to
    pub async fn create(&self, user: &User, new_plan: NewRoutePlan) -> AccessResult<RoutePlan> {
        if !self.engine.authorize(user, "route_plans.create").await? {
            return Err(AccessError::permission_denied("route_plans.create"));
        }

        let scope = StateScope::for_user(user);
        if !scope.allows(&new_plan.state) {
            return Err(AccessError::validation_field(
                "state is outside your assigned scope",
                "state",
            ));
        }

        let plan = new_plan.into_route_plan()?;
        self.store.insert(&plan).await?;
        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rbac::Role;
    use crate::store::AccessStore;

    fn plan(state: &str, day: u32) -> NewRoutePlan {
        NewRoutePlan {
            title: format!("{state} market sweep"),
            state: state.to_string(),
            assignee: "promoter-7".to_string(),
            plan_date: NaiveDate::from_ymd_opt(2026, 3, day).unwrap(),
        }
    }

    async fn service_with_planner_role() -> (RoutePlanService, Arc<AccessStore>) {
        let access = Arc::new(AccessStore::memory());
        let role = Role::new("planner").unwrap().with_permissions(vec![
            "route_plans.view".to_string(),
            "route_plans.create".to_string(),
        ]);
        access.insert_role(&role).await.unwrap();

        let engine = AuthorizationEngine::new(access.clone());
        (
            RoutePlanService::new(RoutePlanStore::memory(), engine),
            access,
        )
    }

    fn planner(states: &[&str]) -> User {
        let mut user = User::new("carol@fieldops.local".to_string(), "secret123", None).unwrap();
        user.roles = vec!["planner".to_string()];
        user.assigned_states = states.iter().map(|s| s.to_string()).collect();
        user
    }

    fn admin() -> User {
        let mut user = User::new("root@fieldops.local".to_string(), "secret123", None).unwrap();
        user.roles = vec!["super_admin".to_string()];
        user
    }

    #[tokio::test]
    async fn test_listing_is_scoped_to_assigned_states() {
        let (service, _) = service_with_planner_role().await;
        let boss = admin();
        for (state, day) in [
            ("Gujarat", 1),
            ("Punjab", 2),
            ("Kerala", 3),
            ("Gujarat", 4),
            ("Assam", 5),
        ] {
            service.create(&boss, plan(state, day)).await.unwrap();
        }

        let carol = planner(&["Gujarat", "Punjab"]);
        let visible = service.list(&carol, 50, 0).await.unwrap();
        assert_eq!(visible.len(), 3);
        assert!(visible
            .iter()
            .all(|p| p.state == "Gujarat" || p.state == "Punjab"));

        let everything = service.list(&boss, 50, 0).await.unwrap();
        assert_eq!(everything.len(), 5);
    }

    #[tokio::test]
    async fn test_no_assigned_states_sees_nothing() {
        let (service, _) = service_with_planner_role().await;
        let boss = admin();
        service.create(&boss, plan("Gujarat", 1)).await.unwrap();

        let stranded = planner(&[]);
        let visible = service.list(&stranded, 50, 0).await.unwrap();
        assert!(visible.is_empty());
    }

    #[tokio::test]
    async fn test_missing_view_permission_is_denied() {
        let (service, _) = service_with_planner_role().await;
        let mut user = planner(&["Gujarat"]);
        user.roles.clear();

        let result = service.list(&user, 50, 0).await;
        assert!(matches!(result, Err(AccessError::PermissionDenied { .. })));
    }

    #[tokio::test]
    async fn test_out_of_scope_record_is_denied_not_hidden() {
        let (service, _) = service_with_planner_role().await;
        let boss = admin();
        let kerala = service.create(&boss, plan("Kerala", 1)).await.unwrap();

        let carol = planner(&["Gujarat"]);
        let result = service.get(&carol, &kerala.id).await;
        assert!(matches!(result, Err(AccessError::PermissionDenied { .. })));

        // Unknown ids are still a plain None, not a denial
        assert!(service.get(&carol, "no-such-plan").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_create_outside_scope_rejected() {
        let (service, _) = service_with_planner_role().await;
        let carol = planner(&["Gujarat"]);

        let result = service.create(&carol, plan("Kerala", 1)).await;
        assert!(matches!(result, Err(AccessError::Validation { .. })));

        let created = service.create(&carol, plan("Gujarat", 2)).await.unwrap();
        assert_eq!(created.state, "Gujarat");
    }

    #[tokio::test]
    async fn test_state_match_is_case_sensitive() {
        let (service, _) = service_with_planner_role().await;
        let boss = admin();
        service.create(&boss, plan("GUJARAT", 1)).await.unwrap();

        let carol = planner(&["Gujarat"]);
        let visible = service.list(&carol, 50, 0).await.unwrap();
        assert!(visible.is_empty());
    }

    #[tokio::test]
    async fn test_pagination_windows_over_visible_rows() {
        let (service, _) = service_with_planner_role().await;
        let boss = admin();
        for day in 1..=4 {
            service.create(&boss, plan("Gujarat", day)).await.unwrap();
            service.create(&boss, plan("Kerala", day)).await.unwrap();
        }

        let carol = planner(&["Gujarat"]);
        let page = service.list(&carol, 2, 2).await.unwrap();
        assert_eq!(page.len(), 2);
        assert!(page.iter().all(|p| p.state == "Gujarat"));
    }
}
