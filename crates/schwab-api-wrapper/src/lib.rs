//! # Schwab API Wrapper
//!
//! Typed async client for the Charles Schwab Trader and Market Data HTTP
//! APIs.
//!
//! ## Overview
//!
//! - **OAuth session handling**: authorization-code login, automatic access
//!   token refresh, and a seven-day refresh token lifecycle
//! - **Token persistence** in memory, on disk (optionally AES-GCM
//!   encrypted) or in Redis, shared safely between processes
//! - **Typed models** for quotes, price history, option chains, accounts,
//!   orders and transactions
//! - **Resilience**: request throttling, retries with backoff, per-surface
//!   circuit breakers and a TTL cache for market data
//! - **Fixture tooling** to sanitize recorded responses and replay them
//!   offline
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`auth`] | OAuth client, token manager and token stores |
//! | [`cache`] | TTL response cache |
//! | [`circuit_breaker`] | Circuit breaker per API surface |
//! | [`client`] | [`SchwabClient`] and request parameters |
//! | [`config`] | YAML configuration with environment overrides |
//! | [`domain`] | Response and request models |
//! | [`error`] | Validation and API error types |
//! | [`fixtures`] | Sanitized sample responses and an offline transport |
//! | [`http_client`] | HTTP transport abstraction |
//! | [`retry`] | Backoff policies |
//! | [`sanitize`] | Redaction of recorded responses |
//! | [`throttling`] | Request rate limiting |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//!
//! use schwab_api_wrapper::{auth, ClientConfig, QuoteField, SchwabClient, Symbol};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig::load("config.yaml")?;
//!     let store = auth::open_store(&config.token_store, &config.client_id).await?;
//!     let client = SchwabClient::builder(config).token_store(store).build();
//!
//!     let symbols = Symbol::parse_many(["AAPL", "MSFT"])?;
//!     let quotes = client.quotes(&symbols, &[QuoteField::Quote], false).await?;
//!     for (symbol, entry) in &quotes.quotes {
//!         println!("{symbol}: {:?}", entry.quote.as_ref().and_then(|q| q.last_price));
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │  SchwabClient   │
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐     ┌──────────────────┐
//! │ Throttle/Cache  │────▶│ Circuit Breaker  │
//! └────────┬────────┘     └──────────────────┘
//!          │
//!          ▼
//! ┌─────────────────┐     ┌──────────────────┐
//! │  TokenManager   │────▶│ TokenStore       │
//! │  (OAuth)        │     │ (memory/file/    │
//! └────────┬────────┘     │  redis)          │
//!          │              └──────────────────┘
//!          ▼
//! ┌─────────────────┐
//! │ HttpClient      │
//! │ (reqwest)       │
//! └─────────────────┘
//! ```
//!
//! ## Error Handling
//!
//! Calls return [`ApiError`], classified by [`ApiErrorKind`]:
//!
//! ```rust
//! use schwab_api_wrapper::{ApiError, ApiErrorKind};
//!
//! fn handle_error(error: ApiError) {
//!     match error.kind() {
//!         ApiErrorKind::ReauthRequired => {
//!             // Run the login flow again
//!         }
//!         ApiErrorKind::RateLimited | ApiErrorKind::Unavailable => {
//!             // Back off and try later
//!         }
//!         ApiErrorKind::InvalidRequest => {
//!             // Report to user
//!         }
//!         _ => {}
//!     }
//! }
//! ```
//!
//! ## Security
//!
//! - Tokens and the client secret are redacted from `Debug` output and logs
//! - Account numbers are masked in logs; URLs use account hashes
//! - File token stores are written with owner-only permissions

pub mod auth;
pub mod cache;
pub mod circuit_breaker;
pub mod client;
pub mod config;
pub mod domain;
pub mod error;
pub mod fixtures;
pub mod http_client;
pub mod retry;
pub mod sanitize;
pub mod throttling;

// Authentication
pub use auth::{
    FileTokenStore, MemoryTokenStore, OAuthClient, RedisTokenStore, TokenManager, TokenSet,
    TokenState, TokenStatus, TokenStore, TokenStoreError,
};

// Caching
pub use cache::{CacheMode, CacheStats, ResponseCache};

// Circuit breaker
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};

// Client and request parameters
pub use client::{
    mask_account, ContractType, FrequencyType, MarketId, MoverIndex, MoverSort,
    OptionChainParams, OrderFilter, PeriodType, PriceHistoryParams, Projection, QuoteField,
    SchwabClient, SchwabClientBuilder, Surface, TransactionFilter,
};

// Configuration
pub use config::{ClientConfig, ConfigError, TokenStoreConfig, TokenStoreKind};

// Domain models
pub use domain::{
    Account, Instruction, Order, OrderStatus, OrderType, QuoteResponse, Symbol, Transaction,
    TransactionType, UtcDateTime,
};

// Error types
pub use error::{ApiError, ApiErrorKind, ValidationError};

// HTTP client types
pub use http_client::{
    HttpAuth, HttpClient, HttpError, HttpMethod, HttpRequest, HttpResponse, ReqwestHttpClient,
    ScriptedHttpClient,
};

// Retry logic
pub use retry::{Backoff, RetryConfig};

// Throttling
pub use throttling::RequestThrottle;
