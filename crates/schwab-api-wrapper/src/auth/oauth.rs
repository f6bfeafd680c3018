use std::sync::Arc;

use tracing::{debug, info};

use super::{TokenResponse, TokenSet};
use crate::config::ClientConfig;
use crate::error::describe_error_body;
use crate::http_client::{HttpAuth, HttpClient, HttpRequest, HttpResponse};
use crate::{ApiError, UtcDateTime, ValidationError};

/// OAuth 2.0 authorization-code client for `api.schwabapi.com/v1/oauth`.
#[derive(Clone)]
pub struct OAuthClient {
    http: Arc<dyn HttpClient>,
    base_url: String,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    timeout_ms: u64,
}

impl OAuthClient {
    pub fn new(config: &ClientConfig, http: Arc<dyn HttpClient>) -> Self {
        Self {
            http,
            base_url: config.oauth_base_url.trim_end_matches('/').to_owned(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            redirect_uri: config.redirect_uri.clone(),
            timeout_ms: config.timeout_ms,
        }
    }

    /// Page the user opens to sign in and approve the app.
    pub fn authorization_url(&self) -> String {
        format!(
            "{}/authorize?client_id={}&redirect_uri={}",
            self.base_url,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(&self.redirect_uri)
        )
    }

    /// Authorization code from the URL the browser was redirected to.
    /// Schwab codes end in `%40`, which decodes to `@`.
    pub fn extract_code(redirect_url: &str) -> Result<String, ValidationError> {
        let trimmed = redirect_url.trim();
        let query = trimmed
            .split_once('?')
            .map(|(_, query)| query)
            .ok_or(ValidationError::MissingAuthorizationCode)?;
        let query = query.split('#').next().unwrap_or(query);

        let raw = query
            .split('&')
            .filter_map(|pair| pair.split_once('='))
            .find(|(key, _)| *key == "code")
            .map(|(_, value)| value)
            .filter(|value| !value.is_empty())
            .ok_or(ValidationError::MissingAuthorizationCode)?;

        urlencoding::decode(raw)
            .map(|code| code.into_owned())
            .map_err(|_| ValidationError::InvalidUrl {
                value: String::from("authorization code is not valid UTF-8"),
            })
    }

    fn token_request(&self, form: &[(&str, &str)]) -> HttpRequest {
        HttpRequest::post(format!("{}/token", self.base_url))
            .with_auth(&HttpAuth::Basic {
                username: self.client_id.clone(),
                password: self.client_secret.clone(),
            })
            .with_header("accept", "application/json")
            .with_form(form)
            .with_timeout_ms(self.timeout_ms)
    }

    async fn post_token(&self, request: HttpRequest) -> Result<TokenResponse, ApiError> {
        let response: HttpResponse = self.http.execute(request).await.map_err(|error| {
            ApiError::unavailable(format!("token endpoint unreachable: {}", error.message()))
        })?;

        if !response.is_success() {
            return Err(ApiError::from_status(
                response.status,
                describe_error_body(response.status, &response.body),
            ));
        }

        serde_json::from_str(&response.body)
            .map_err(|error| ApiError::decode(format!("invalid token response: {error}")))
    }

    /// Trades an authorization code for the first token pair.
    pub async fn exchange_code(
        &self,
        code: &str,
        now: UtcDateTime,
    ) -> Result<TokenSet, ApiError> {
        debug!("exchanging authorization code");
        let request = self.token_request(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", &self.redirect_uri),
        ]);
        let response = self.post_token(request).await?;

        let tokens = TokenSet::from_code_exchange(response, now).ok_or_else(|| {
            ApiError::decode("token response did not include a refresh token")
        })?;
        info!(
            refresh_expires_at = %tokens.refresh_expires_at,
            "authorization code exchanged"
        );
        Ok(tokens)
    }

    /// Obtains a new access token stamped as issued at `now`. A rejected refresh token (400/401) means
    /// the user must authorize again.
    pub async fn refresh(
        &self,
        current: &TokenSet,
        now: UtcDateTime,
    ) -> Result<TokenSet, ApiError> {
        let request = self.token_request(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", &current.refresh_token),
        ]);

        let response = self.post_token(request).await.map_err(|error| {
            match error.status() {
                Some(400) | Some(401) => ApiError::reauth_required(format!(
                    "refresh token rejected: {}",
                    error.message()
                ))
                .with_status(error.status().unwrap_or(401)),
                _ => error,
            }
        })?;

        Ok(TokenSet::from_refresh(response, current, now))
    }
}

impl std::fmt::Debug for OAuthClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthClient")
            .field("base_url", &self.base_url)
            .field("client_id", &self.client_id)
            .field("redirect_uri", &self.redirect_uri)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http_client::ScriptedHttpClient;
    use crate::ApiErrorKind;

    fn client(http: Arc<ScriptedHttpClient>) -> OAuthClient {
        OAuthClient::new(&ClientConfig::new("app key", "app-secret"), http)
    }

    #[test]
    fn authorization_url_encodes_parameters() {
        let oauth = client(Arc::new(ScriptedHttpClient::new()));
        assert_eq!(
            oauth.authorization_url(),
            "https://api.schwabapi.com/v1/oauth/authorize?client_id=app%20key&redirect_uri=https%3A%2F%2F127.0.0.1"
        );
    }

    #[test]
    fn extracts_and_decodes_code() {
        let code = OAuthClient::extract_code(
            "https://127.0.0.1/?code=C0.b2F1dGgy%40&session=abc-123",
        )
        .expect("code present");
        assert_eq!(code, "C0.b2F1dGgy@");

        assert_eq!(
            OAuthClient::extract_code("https://127.0.0.1/?session=abc"),
            Err(ValidationError::MissingAuthorizationCode)
        );
        assert_eq!(
            OAuthClient::extract_code("not a url"),
            Err(ValidationError::MissingAuthorizationCode)
        );
    }

    #[tokio::test]
    async fn rejected_refresh_requires_reauthorization() {
        let http = Arc::new(ScriptedHttpClient::new().respond_json(
            400,
            r#"{"error":"invalid_grant","error_description":"expired"}"#,
        ));
        let oauth = client(Arc::clone(&http));
        let current = TokenSet::from_code_exchange(
            TokenResponse {
                access_token: String::from("a"),
                refresh_token: Some(String::from("r")),
                token_type: String::from("Bearer"),
                expires_in: 1_800,
                scope: String::new(),
                id_token: None,
            },
            UtcDateTime::now(),
        )
        .expect("tokens");

        let error = oauth
            .refresh(&current, UtcDateTime::now())
            .await
            .expect_err("must fail");
        assert_eq!(error.kind(), ApiErrorKind::ReauthRequired);
        assert_eq!(error.status(), Some(400));
    }
}
