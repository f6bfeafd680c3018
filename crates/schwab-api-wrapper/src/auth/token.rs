use std::fmt::{Debug, Formatter};

use serde::{Deserialize, Serialize};
use time::Duration;

use crate::UtcDateTime;

/// Schwab refresh tokens expire seven days after the authorization-code
/// exchange, regardless of how often they are used.
pub const REFRESH_TOKEN_LIFETIME: Duration = Duration::days(7);

/// Access token lifetime Schwab documents when `expires_in` is absent.
pub const DEFAULT_ACCESS_TOKEN_LIFETIME_SECS: i64 = 1_800;

/// Lifecycle state of the OAuth session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenState {
    Unauthenticated,
    Authenticated,
    RefreshRequired,
    Refreshing,
    Expired,
}

impl TokenState {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unauthenticated => "unauthenticated",
            Self::Authenticated => "authenticated",
            Self::RefreshRequired => "refresh_required",
            Self::Refreshing => "refreshing",
            Self::Expired => "expired",
        }
    }
}

/// Body of a successful `POST /v1/oauth/token`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default = "default_expires_in")]
    pub expires_in: i64,
    #[serde(default)]
    pub scope: String,
    #[serde(default)]
    pub id_token: Option<String>,
}

fn default_token_type() -> String {
    String::from("Bearer")
}

const fn default_expires_in() -> i64 {
    DEFAULT_ACCESS_TOKEN_LIFETIME_SECS
}

impl Debug for TokenResponse {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenResponse")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

/// Persisted OAuth token pair with absolute expiry times.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSet {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    #[serde(default)]
    pub scope: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
    pub issued_at: UtcDateTime,
    pub access_expires_at: UtcDateTime,
    pub refresh_expires_at: UtcDateTime,
}

impl TokenSet {
    /// Builds the first token set of a session from a code exchange.
    /// Returns `None` when Schwab omitted the refresh token.
    pub fn from_code_exchange(response: TokenResponse, now: UtcDateTime) -> Option<Self> {
        let refresh_token = response.refresh_token?;
        let refresh_expires_at = now.checked_add(REFRESH_TOKEN_LIFETIME).unwrap_or(now);
        Some(Self::assemble(
            response.access_token,
            refresh_token,
            response.token_type,
            response.scope,
            response.id_token,
            response.expires_in,
            now,
            refresh_expires_at,
        ))
    }

    /// Builds the successor of `previous` from a refresh response. The
    /// refresh deadline is carried over; a rotated refresh token replaces
    /// the old one.
    pub fn from_refresh(response: TokenResponse, previous: &TokenSet, now: UtcDateTime) -> Self {
        let refresh_token = response
            .refresh_token
            .unwrap_or_else(|| previous.refresh_token.clone());
        Self::assemble(
            response.access_token,
            refresh_token,
            response.token_type,
            response.scope,
            response.id_token.or_else(|| previous.id_token.clone()),
            response.expires_in,
            now,
            previous.refresh_expires_at,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn assemble(
        access_token: String,
        refresh_token: String,
        token_type: String,
        scope: String,
        id_token: Option<String>,
        expires_in: i64,
        now: UtcDateTime,
        refresh_expires_at: UtcDateTime,
    ) -> Self {
        let access_expires_at = now
            .checked_add(Duration::seconds(expires_in.max(0)))
            .unwrap_or(now);
        Self {
            access_token,
            refresh_token,
            token_type,
            scope,
            id_token,
            issued_at: now,
            access_expires_at,
            refresh_expires_at,
        }
    }

    /// True when the access token remains valid for longer than `skew`.
    pub fn access_valid_at(&self, now: UtcDateTime, skew: Duration) -> bool {
        now.until(self.access_expires_at) > skew
    }

    pub fn refresh_valid_at(&self, now: UtcDateTime) -> bool {
        now < self.refresh_expires_at
    }

    pub fn state_at(&self, now: UtcDateTime, skew: Duration) -> TokenState {
        if !self.refresh_valid_at(now) {
            TokenState::Expired
        } else if self.access_valid_at(now, skew) {
            TokenState::Authenticated
        } else {
            TokenState::RefreshRequired
        }
    }

    /// Marks the access token as unusable so the next call refreshes.
    pub fn expire_access(&mut self) {
        self.access_expires_at = self.issued_at;
    }
}

impl Debug for TokenSet {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSet")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("token_type", &self.token_type)
            .field("scope", &self.scope)
            .field("issued_at", &self.issued_at)
            .field("access_expires_at", &self.access_expires_at)
            .field("refresh_expires_at", &self.refresh_expires_at)
            .finish()
    }
}

/// Snapshot reported by `schwab auth status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenStatus {
    pub state: TokenState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_expires_at: Option<UtcDateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_expires_at: Option<UtcDateTime>,
}
