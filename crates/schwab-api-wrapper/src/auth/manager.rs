use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use super::{OAuthClient, TokenSet, TokenState, TokenStatus, TokenStore};
use crate::{ApiError, ApiErrorKind, UtcDateTime};

/// Source of "now"; tests substitute a fixed or advancing clock.
pub type Clock = Arc<dyn Fn() -> UtcDateTime + Send + Sync>;

/// Owns the OAuth session for one client id.
///
/// Keeps an in-process view of the token set in front of a shared
/// [`TokenStore`]. The view is authoritative while its access token is
/// valid. Otherwise the store is consulted first (another process may
/// already have refreshed), and only then is a refresh performed. Refreshes
/// are single-flight: concurrent callers queue on one lock and re-check the
/// view once they hold it, so a burst of expired calls costs one token
/// request.
pub struct TokenManager {
    oauth: OAuthClient,
    store: Arc<dyn TokenStore>,
    view: RwLock<Option<TokenSet>>,
    refresh_lock: Mutex<()>,
    refreshing: AtomicBool,
    skew: Duration,
    clock: Clock,
}

impl TokenManager {
    pub fn new(oauth: OAuthClient, store: Arc<dyn TokenStore>, skew: Duration) -> Self {
        Self {
            oauth,
            store,
            view: RwLock::new(None),
            refresh_lock: Mutex::new(()),
            refreshing: AtomicBool::new(false),
            skew,
            clock: Arc::new(UtcDateTime::now),
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn oauth(&self) -> &OAuthClient {
        &self.oauth
    }

    fn now(&self) -> UtcDateTime {
        (self.clock)()
    }

    /// Bearer token for the next API call, refreshing when needed.
    pub async fn access_token(&self) -> Result<String, ApiError> {
        let now = self.now();
        if let Some(tokens) = self.view.read().await.as_ref() {
            if tokens.access_valid_at(now, self.skew) {
                return Ok(tokens.access_token.clone());
            }
        }

        if let Some(stored) = self.load_from_store().await {
            if self.adopt(stored).await {
                let view = self.view.read().await;
                if let Some(tokens) = view.as_ref().filter(|t| t.access_valid_at(now, self.skew)) {
                    debug!(store = %self.store.describe(), "adopted token from store");
                    return Ok(tokens.access_token.clone());
                }
            }
        }

        self.refresh(false).await.map(|tokens| tokens.access_token)
    }

    /// Refreshes regardless of the access token's remaining lifetime.
    pub async fn force_refresh(&self) -> Result<TokenSet, ApiError> {
        if self.view.read().await.is_none() {
            if let Some(stored) = self.load_from_store().await {
                self.adopt(stored).await;
            }
        }
        self.refresh(true).await
    }

    async fn refresh(&self, force: bool) -> Result<TokenSet, ApiError> {
        let _guard = self.refresh_lock.lock().await;

        let now = self.now();
        let current = self.view.read().await.clone().ok_or_else(|| {
            ApiError::reauth_required("not logged in; run `schwab auth login`")
        })?;

        if !force && current.access_valid_at(now, self.skew) {
            return Ok(current);
        }
        if !current.refresh_valid_at(now) {
            return Err(ApiError::reauth_required(format!(
                "refresh token expired at {}; run `schwab auth login`",
                current.refresh_expires_at
            )));
        }

        let result = {
            let _flag = RefreshingFlag::raise(&self.refreshing);
            self.oauth.refresh(&current, now).await
        };

        match result {
            Ok(fresh) => {
                info!(
                    access_expires_at = %fresh.access_expires_at,
                    "access token refreshed"
                );
                self.persist(&fresh).await;
                *self.view.write().await = Some(fresh.clone());
                Ok(fresh)
            }
            Err(error) => {
                if error.kind() == ApiErrorKind::ReauthRequired {
                    warn!(error = %error, "refresh token rejected");
                    if let Some(tokens) = self.view.write().await.as_mut() {
                        tokens.refresh_expires_at = now;
                    }
                }
                Err(error)
            }
        }
    }

    /// Finishes the authorization-code flow from the pasted redirect URL.
    pub async fn complete_login(&self, redirect_url: &str) -> Result<TokenSet, ApiError> {
        let code = OAuthClient::extract_code(redirect_url)?;
        let _guard = self.refresh_lock.lock().await;
        let tokens = self.oauth.exchange_code(&code, self.now()).await?;

        *self.view.write().await = Some(tokens.clone());
        self.store.save(&tokens).await.map_err(|error| {
            ApiError::internal(format!(
                "logged in but failed to persist tokens to {}: {error}",
                self.store.describe()
            ))
        })?;
        Ok(tokens)
    }

    /// Called after a 401: drops the access token if it is still the one
    /// that was rejected, so the next [`Self::access_token`] refreshes.
    pub async fn invalidate_access(&self, rejected_token: &str) {
        let mut view = self.view.write().await;
        if let Some(tokens) = view.as_mut() {
            if tokens.access_token == rejected_token {
                debug!("access token rejected upstream, forcing refresh");
                tokens.expire_access();
            }
        }
    }

    pub async fn logout(&self) -> Result<(), ApiError> {
        let _guard = self.refresh_lock.lock().await;
        *self.view.write().await = None;
        self.store.clear().await.map_err(|error| {
            ApiError::internal(format!(
                "failed to clear tokens from {}: {error}",
                self.store.describe()
            ))
        })
    }

    pub async fn state(&self) -> TokenState {
        self.status().await.state
    }

    pub async fn status(&self) -> TokenStatus {
        if self.refreshing.load(Ordering::SeqCst) {
            let view = self.view.read().await;
            return TokenStatus {
                state: TokenState::Refreshing,
                access_expires_at: view.as_ref().map(|tokens| tokens.access_expires_at),
                refresh_expires_at: view.as_ref().map(|tokens| tokens.refresh_expires_at),
            };
        }

        if self.view.read().await.is_none() {
            if let Some(stored) = self.load_from_store().await {
                self.adopt(stored).await;
            }
        }

        let now = self.now();
        match self.view.read().await.as_ref() {
            None => TokenStatus {
                state: TokenState::Unauthenticated,
                access_expires_at: None,
                refresh_expires_at: None,
            },
            Some(tokens) => TokenStatus {
                state: tokens.state_at(now, self.skew),
                access_expires_at: Some(tokens.access_expires_at),
                refresh_expires_at: Some(tokens.refresh_expires_at),
            },
        }
    }

    /// Copy of the in-process view.
    pub async fn tokens(&self) -> Option<TokenSet> {
        self.view.read().await.clone()
    }

    async fn load_from_store(&self) -> Option<TokenSet> {
        match self.store.load().await {
            Ok(tokens) => tokens,
            Err(error) => {
                warn!(store = %self.store.describe(), error = %error, "failed to load tokens");
                None
            }
        }
    }

    /// Replaces the view only with a strictly newer token set.
    async fn adopt(&self, stored: TokenSet) -> bool {
        let mut view = self.view.write().await;
        let newer = view
            .as_ref()
            .map_or(true, |current| stored.issued_at > current.issued_at);
        if newer {
            *view = Some(stored);
        }
        newer
    }

    async fn persist(&self, tokens: &TokenSet) {
        if let Err(error) = self.store.save(tokens).await {
            warn!(
                store = %self.store.describe(),
                error = %error,
                "failed to persist refreshed tokens; continuing with in-memory copy"
            );
        }
    }
}

/// Marks a refresh in flight; lowered on drop so a cancelled caller
/// cannot leave the manager reporting `Refreshing`.
struct RefreshingFlag<'a>(&'a AtomicBool);

impl<'a> RefreshingFlag<'a> {
    fn raise(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag)
    }
}

impl Drop for RefreshingFlag<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl std::fmt::Debug for TokenManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenManager")
            .field("store", &self.store.describe())
            .field("skew", &self.skew)
            .finish_non_exhaustive()
    }
}
