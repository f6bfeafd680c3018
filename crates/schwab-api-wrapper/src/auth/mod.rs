//! OAuth session handling: the authorization-code flow, token persistence
//! and the refresh lifecycle.
//!
//! ```text
//! Unauthenticated ──code exchange──▶ Authenticated
//!                                      │  access token ages
//!                                      ▼
//!                              RefreshRequired ──refresh──▶ Refreshing ──ok──▶ Authenticated
//!                                      │                         │
//!                                      └── 7 days ──▶ Expired ◀──┘ rejected
//! ```

mod cipher;
mod manager;
mod oauth;
mod store;
mod token;

use thiserror::Error;

pub use cipher::TokenCipher;
pub use manager::{Clock, TokenManager};
pub use oauth::OAuthClient;
pub use store::{
    open_store, FileTokenStore, MemoryTokenStore, RedisTokenStore, StoreFuture, TokenStore,
};
pub use token::{
    TokenResponse, TokenSet, TokenState, TokenStatus, DEFAULT_ACCESS_TOKEN_LIFETIME_SECS,
    REFRESH_TOKEN_LIFETIME,
};

#[derive(Debug, Error)]
pub enum TokenStoreError {
    #[error("token store I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("token payload is not valid JSON: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("failed to encrypt tokens: {0}")]
    Encrypt(String),
    #[error("failed to decrypt tokens: {0}")]
    Decrypt(String),
    #[error("token store misconfigured: {0}")]
    Misconfigured(String),
}
