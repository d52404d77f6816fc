//! Application state

use crate::{WebConfig, WebError, WebResult};
use fieldops_access::token::MemoryTokenStore;
use fieldops_access::{
    AccessService, AccessStore, RoutePlanService, RoutePlanStore, TokenStore,
};
use std::sync::Arc;
use tracing::{info, warn};

#[cfg(feature = "sqlite")]
use fieldops_access::token::SqliteTokenStore;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    /// Configuration
    pub config: WebConfig,
    /// Authorization, identity, and token operations
    pub access: Arc<AccessService>,
    /// Route-plan data access, scope- and permission-gated
    pub route_plans: Arc<RoutePlanService>,
}

impl AppState {
    /// Create a new application state
    ///
    /// Connects the configured database when one is given, falling back to
    /// in-memory stores when the connection fails. The role/permission
    /// catalog and bootstrap admin are seeded either way.
    pub async fn new(config: WebConfig) -> WebResult<Self> {
        let (store, token_store, plan_store) = Self::build_stores(&config).await;

        let store = Arc::new(store);
        let access = Arc::new(AccessService::new(store, token_store));
        access.seed_defaults().await?;

        let route_plans = Arc::new(RoutePlanService::new(
            plan_store,
            access.engine().clone(),
        ));

        Ok(Self {
            config,
            access,
            route_plans,
        })
    }

    #[cfg(feature = "sqlite")]
    async fn build_stores(
        config: &WebConfig,
    ) -> (AccessStore, Arc<dyn TokenStore>, RoutePlanStore) {
        if let Some(database_url) = &config.database_url {
            match Self::connect_database(database_url).await {
                Ok(stores) => {
                    info!("Database initialized: {}", database_url);
                    return stores;
                }
                Err(e) => {
                    warn!("Failed to initialize database, using in-memory stores: {e}");
                }
            }
        }
        (
            AccessStore::memory(),
            Arc::new(MemoryTokenStore::new()),
            RoutePlanStore::memory(),
        )
    }

    #[cfg(feature = "sqlite")]
    async fn connect_database(
        database_url: &str,
    ) -> WebResult<(AccessStore, Arc<dyn TokenStore>, RoutePlanStore)> {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .map_err(|e| WebError::Config(format!("database connection failed: {e}")))?;

        let store = AccessStore::database(pool.clone()).await?;
        let tokens: Arc<dyn TokenStore> = Arc::new(SqliteTokenStore::new(pool.clone()).await?);
        let plans = RoutePlanStore::database(pool).await?;
        Ok((store, tokens, plans))
    }

    #[cfg(not(feature = "sqlite"))]
    async fn build_stores(
        config: &WebConfig,
    ) -> (AccessStore, Arc<dyn TokenStore>, RoutePlanStore) {
        if config.database_url.is_some() {
            warn!("Built without the sqlite feature; using in-memory stores");
        }
        (
            AccessStore::memory(),
            Arc::new(MemoryTokenStore::new()),
            RoutePlanStore::memory(),
        )
    }
}
