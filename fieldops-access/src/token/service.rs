//! Token service
//!
//! Issues opaque bearer tokens bound to a user identity, validates them on
//! inbound requests, and handles single-token, all-device, and refresh
//! revocation. Every invalid-token path resolves to the same
//! `Unauthenticated` failure; callers cannot tell "unknown" from
//! "revoked" from "expired".

use crate::store::AccessStore;
use crate::token::store::{TokenRecord, TokenStore};
use crate::users::User;
use chrono::{DateTime, Duration, Utc};
use fieldops_core::{AccessError, AccessResult};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// Rolling validity window applied at issuance. A refresh issues a fresh
/// 24-hour token; it does not extend the old one.
pub const TOKEN_TTL_HOURS: i64 = 24;

/// A freshly issued token: the only place the opaque string exists in
/// plaintext
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Token issuance and validation service
#[derive(Clone)]
pub struct TokenService {
    store: Arc<dyn TokenStore>,
    users: Arc<AccessStore>,
}

impl TokenService {
    pub fn new(store: Arc<dyn TokenStore>, users: Arc<AccessStore>) -> Self {
        Self { store, users }
    }

    /// Create a new token bound to the user, valid for 24 hours
    pub async fn issue(&self, user: &User) -> AccessResult<IssuedToken> {
        let (raw, record) = new_token_record(&user.id);
        self.store.insert(&record).await?;

        info!("Issued token for user: {}", user.id);
        Ok(IssuedToken {
            token: raw,
            expires_at: record.expires_at,
        })
    }

    /// Resolve a bearer token string to its bound identity
    ///
    /// Unknown, revoked, and expired tokens, and tokens bound to a
    /// missing or deactivated user, all fail identically.
    pub async fn validate(&self, token: &str) -> AccessResult<User> {
        let record = self
            .store
            .find_by_hash(&hash_token(token))
            .await?
            .ok_or(AccessError::Unauthenticated)?;

        if !record.is_valid(Utc::now()) {
            debug!("Rejected token {} for user {}", record.id, record.user_id);
            return Err(AccessError::Unauthenticated);
        }

        let user = self
            .users
            .get_user_by_id(&record.user_id)
            .await?
            .ok_or(AccessError::Unauthenticated)?;

        if !user.active {
            return Err(AccessError::Unauthenticated);
        }

        Ok(user)
    }

    /// Revoke a single token. Idempotent: revoking twice is not an error.
    pub async fn revoke(&self, token: &str) -> AccessResult<()> {
        self.store.revoke_by_hash(&hash_token(token)).await
    }

    /// Revoke every token bound to the user ("logout everywhere")
    pub async fn revoke_all(&self, user_id: &str) -> AccessResult<u64> {
        let revoked = self.store.revoke_all_for_user(user_id).await?;
        info!("Revoked {} tokens for user: {}", revoked, user_id);
        Ok(revoked)
    }

    /// Atomically revoke the presented token and issue a replacement for
    /// the same identity. Fails `Unauthenticated` when the presented
    /// token is already invalid or its user is deactivated; a partial
    /// failure leaves the original token valid.
    pub async fn refresh(&self, token: &str) -> AccessResult<IssuedToken> {
        // Full validation first: a deactivated user must not be able to
        // keep exchanging tokens, even for tokens that would never
        // validate.
        self.validate(token).await?;

        let old_hash = hash_token(token);
        // user_id is resolved inside the store's atomic section
        let (raw, record) = new_token_record("");
        let record = self.store.swap(&old_hash, record).await?;

        info!("Refreshed token for user: {}", record.user_id);
        Ok(IssuedToken {
            token: raw,
            expires_at: record.expires_at,
        })
    }
}

/// Generate a raw opaque token and its store record
fn new_token_record(user_id: &str) -> (String, TokenRecord) {
    let raw = format!("fa_{}", Uuid::new_v4().simple());
    let now = Utc::now();

    let record = TokenRecord {
        id: Uuid::new_v4().to_string(),
        token_hash: hash_token(&raw),
        user_id: user_id.to_string(),
        created_at: now,
        expires_at: now + Duration::hours(TOKEN_TTL_HOURS),
        revoked: false,
    };

    (raw, record)
}

/// Hash a token string for storage
fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}
