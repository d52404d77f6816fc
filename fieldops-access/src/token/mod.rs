//! Bearer token issuance, validation, and revocation

pub mod service;
pub mod store;

pub use service::{IssuedToken, TokenService, TOKEN_TTL_HOURS};
pub use store::{MemoryTokenStore, TokenRecord, TokenStore};

#[cfg(feature = "sqlite")]
pub use store::SqliteTokenStore;
