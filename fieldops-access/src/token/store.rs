//! Token storage backends
//!
//! Tokens are stored by hash only; the opaque string never touches the
//! store. Revoke and refresh are atomic per token: the memory backend
//! holds one write lock across the whole operation, the SQLite backend
//! wraps it in a transaction.

use chrono::{DateTime, Utc};
use fieldops_core::{AccessError, AccessResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Persisted token record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenRecord {
    pub id: String,
    /// SHA-256 hex of the opaque token string
    pub token_hash: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub revoked: bool,
}

impl TokenRecord {
    /// Valid means not revoked and not past expiry
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        !self.revoked && now < self.expires_at
    }
}

/// Token storage abstraction
#[async_trait::async_trait]
pub trait TokenStore: Send + Sync {
    /// Persist a freshly issued token
    async fn insert(&self, record: &TokenRecord) -> AccessResult<()>;

    /// Look up a token by hash, valid or not
    async fn find_by_hash(&self, token_hash: &str) -> AccessResult<Option<TokenRecord>>;

    /// Mark a single token revoked. Idempotent: revoking an unknown or
    /// already-revoked token is not an error.
    async fn revoke_by_hash(&self, token_hash: &str) -> AccessResult<()>;

    /// Revoke every token bound to a user
    async fn revoke_all_for_user(&self, user_id: &str) -> AccessResult<u64>;

    /// Atomically revoke the old token and insert its replacement for the
    /// same user. Fails with `Unauthenticated` when the old token is
    /// missing, revoked, or expired; on any failure the old token's state
    /// is left untouched. Returns the completed replacement record.
    async fn swap(&self, old_hash: &str, replacement: TokenRecord) -> AccessResult<TokenRecord>;
}

/// In-memory token storage
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    tokens: Arc<RwLock<HashMap<String, TokenRecord>>>, // hash -> record
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl TokenStore for MemoryTokenStore {
    async fn insert(&self, record: &TokenRecord) -> AccessResult<()> {
        let mut tokens = self.tokens.write().await;
        tokens.insert(record.token_hash.clone(), record.clone());
        debug!("Stored token {} for user {}", record.id, record.user_id);
        Ok(())
    }

    async fn find_by_hash(&self, token_hash: &str) -> AccessResult<Option<TokenRecord>> {
        let tokens = self.tokens.read().await;
        Ok(tokens.get(token_hash).cloned())
    }

    async fn revoke_by_hash(&self, token_hash: &str) -> AccessResult<()> {
        let mut tokens = self.tokens.write().await;
        if let Some(record) = tokens.get_mut(token_hash) {
            record.revoked = true;
        }
        Ok(())
    }

    async fn revoke_all_for_user(&self, user_id: &str) -> AccessResult<u64> {
        let mut tokens = self.tokens.write().await;
        let mut revoked = 0;
        for record in tokens.values_mut() {
            if record.user_id == user_id && !record.revoked {
                record.revoked = true;
                revoked += 1;
            }
        }
        Ok(revoked)
    }

    async fn swap(&self, old_hash: &str, replacement: TokenRecord) -> AccessResult<TokenRecord> {
        // One write lock across the check, revoke, and insert: a validate
        // racing this swap sees either the old token valid or the swap
        // fully applied, never a half state.
        let mut tokens = self.tokens.write().await;

        let user_id = match tokens.get(old_hash) {
            Some(record) if record.is_valid(Utc::now()) => record.user_id.clone(),
            _ => return Err(AccessError::Unauthenticated),
        };

        if let Some(record) = tokens.get_mut(old_hash) {
            record.revoked = true;
        }

        let replacement = TokenRecord {
            user_id,
            ..replacement
        };
        tokens.insert(replacement.token_hash.clone(), replacement.clone());

        Ok(replacement)
    }
}

/// SQLite token storage
#[cfg(feature = "sqlite")]
#[derive(Debug, Clone)]
pub struct SqliteTokenStore {
    pool: sqlx::SqlitePool,
}

#[cfg(feature = "sqlite")]
impl SqliteTokenStore {
    pub async fn new(pool: sqlx::SqlitePool) -> AccessResult<Self> {
        let store = Self { pool };
        store.create_tables().await?;
        Ok(store)
    }

    async fn create_tables(&self) -> AccessResult<()> {
        let query = r#"
            CREATE TABLE IF NOT EXISTS tokens (
                id TEXT PRIMARY KEY,
                token_hash TEXT UNIQUE NOT NULL,
                user_id TEXT NOT NULL,
                created_at TEXT NOT NULL,
                expires_at TEXT NOT NULL,
                revoked BOOLEAN NOT NULL DEFAULT FALSE
            );

            CREATE INDEX IF NOT EXISTS idx_tokens_user ON tokens(user_id);
        "#;

        sqlx::query(query)
            .execute(&self.pool)
            .await
            .map_err(|e| AccessError::storage_with("failed to create tables", "token_store", e))?;

        Ok(())
    }

    fn record_from_row(row: &sqlx::sqlite::SqliteRow) -> AccessResult<TokenRecord> {
        use sqlx::Row;

        let created_at: String = row.get("created_at");
        let expires_at: String = row.get("expires_at");

        Ok(TokenRecord {
            id: row.get("id"),
            token_hash: row.get("token_hash"),
            user_id: row.get("user_id"),
            created_at: created_at
                .parse()
                .map_err(|_| AccessError::storage("malformed created_at column", "token_store"))?,
            expires_at: expires_at
                .parse()
                .map_err(|_| AccessError::storage("malformed expires_at column", "token_store"))?,
            revoked: row.get("revoked"),
        })
    }
}

#[cfg(feature = "sqlite")]
#[async_trait::async_trait]
impl TokenStore for SqliteTokenStore {
    async fn insert(&self, record: &TokenRecord) -> AccessResult<()> {
        sqlx::query(
            r#"
            INSERT INTO tokens (id, token_hash, user_id, created_at, expires_at, revoked)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.id)
        .bind(&record.token_hash)
        .bind(&record.user_id)
        .bind(record.created_at.to_rfc3339())
        .bind(record.expires_at.to_rfc3339())
        .bind(record.revoked)
        .execute(&self.pool)
        .await
        .map_err(|e| AccessError::storage_with("failed to insert token", "token_store", e))?;

        debug!("Stored token {} for user {}", record.id, record.user_id);
        Ok(())
    }

    async fn find_by_hash(&self, token_hash: &str) -> AccessResult<Option<TokenRecord>> {
        let row = sqlx::query("SELECT * FROM tokens WHERE token_hash = ?")
            .bind(token_hash)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AccessError::storage_with("token lookup failed", "token_store", e))?;

        match row {
            Some(row) => Ok(Some(Self::record_from_row(&row)?)),
            None => Ok(None),
        }
    }

    async fn revoke_by_hash(&self, token_hash: &str) -> AccessResult<()> {
        sqlx::query("UPDATE tokens SET revoked = TRUE WHERE token_hash = ?")
            .bind(token_hash)
            .execute(&self.pool)
            .await
            .map_err(|e| AccessError::storage_with("token revoke failed", "token_store", e))?;
        Ok(())
    }

    async fn revoke_all_for_user(&self, user_id: &str) -> AccessResult<u64> {
        let result =
            sqlx::query("UPDATE tokens SET revoked = TRUE WHERE user_id = ? AND revoked = FALSE")
                .bind(user_id)
                .execute(&self.pool)
                .await
                .map_err(|e| {
                    AccessError::storage_with("bulk token revoke failed", "token_store", e)
                })?;
        Ok(result.rows_affected())
    }

    async fn swap(&self, old_hash: &str, replacement: TokenRecord) -> AccessResult<TokenRecord> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AccessError::storage_with("transaction begin failed", "token_store", e))?;

        // Revoke only if currently valid; zero rows means the presented
        // token was already unusable.
        let now = Utc::now().to_rfc3339();
        let revoked = sqlx::query(
            r#"
            UPDATE tokens SET revoked = TRUE
            WHERE token_hash = ? AND revoked = FALSE AND expires_at > ?
            "#,
        )
        .bind(old_hash)
        .bind(&now)
        .execute(&mut *tx)
        .await
        .map_err(|e| AccessError::storage_with("token revoke failed", "token_store", e))?;

        if revoked.rows_affected() == 0 {
            // Rollback on drop leaves the old token untouched.
            return Err(AccessError::Unauthenticated);
        }

        let row = sqlx::query("SELECT user_id FROM tokens WHERE token_hash = ?")
            .bind(old_hash)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| AccessError::storage_with("token lookup failed", "token_store", e))?;

        use sqlx::Row;
        let user_id: String = row.get("user_id");
        let replacement = TokenRecord {
            user_id,
            ..replacement
        };

        sqlx::query(
            r#"
            INSERT INTO tokens (id, token_hash, user_id, created_at, expires_at, revoked)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&replacement.id)
        .bind(&replacement.token_hash)
        .bind(&replacement.user_id)
        .bind(replacement.created_at.to_rfc3339())
        .bind(replacement.expires_at.to_rfc3339())
        .bind(replacement.revoked)
        .execute(&mut *tx)
        .await
        .map_err(|e| AccessError::storage_with("failed to insert token", "token_store", e))?;

        tx.commit().await.map_err(|e| {
            AccessError::Consistency {
                message: format!("token refresh commit failed: {}", e),
                context: fieldops_core::ErrorContext::new("token_store")
                    .with_operation("swap"),
            }
        })?;

        Ok(replacement)
    }
}
