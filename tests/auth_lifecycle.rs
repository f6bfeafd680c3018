//! Behavior tests for the OAuth session lifecycle
//!
//! These tests drive [`TokenManager`] against a scripted token endpoint and
//! an in-memory store, checking when the network is (and is not) touched.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use schwab_api_wrapper::auth::{Clock, TokenResponse};
use schwab_api_wrapper::{
    ApiErrorKind, ClientConfig, HttpMethod, MemoryTokenStore, OAuthClient, ScriptedHttpClient,
    TokenManager, TokenSet, TokenState, TokenStore, UtcDateTime,
};
use serde_json::json;
use time::Duration;

fn tokens_issued(ago: Duration, access_token: &str) -> TokenSet {
    let issued_at = UtcDateTime::now()
        .checked_sub(ago)
        .expect("timestamp in range");
    TokenSet::from_code_exchange(
        TokenResponse {
            access_token: access_token.to_owned(),
            refresh_token: Some(String::from("refresh-1")),
            token_type: String::from("Bearer"),
            expires_in: 1_800,
            scope: String::from("api"),
            id_token: None,
        },
        issued_at,
    )
    .expect("refresh token present")
}

fn token_body(access_token: &str) -> String {
    json!({
        "access_token": access_token,
        "refresh_token": "refresh-2",
        "token_type": "Bearer",
        "expires_in": 1800,
        "scope": "api",
    })
    .to_string()
}

fn manager(http: Arc<ScriptedHttpClient>, store: Arc<MemoryTokenStore>) -> TokenManager {
    let config = ClientConfig::new("app-key", "app-secret");
    TokenManager::new(OAuthClient::new(&config, http), store, Duration::seconds(60))
}

// =============================================================================
// Access Token Reuse
// =============================================================================

#[tokio::test]
async fn when_access_token_is_fresh_no_token_request_is_made() {
    // Given: A stored session issued a minute ago
    let http = Arc::new(ScriptedHttpClient::new());
    let store = Arc::new(MemoryTokenStore::with_tokens(tokens_issued(
        Duration::minutes(1),
        "access-1",
    )));
    let manager = manager(Arc::clone(&http), store);

    // When: Two calls ask for a bearer token
    let first = manager.access_token().await.expect("token");
    let second = manager.access_token().await.expect("token");

    // Then: The stored token is served and the endpoint is never called
    assert_eq!(first, "access-1");
    assert_eq!(second, "access-1");
    assert_eq!(http.request_count(), 0);
    assert_eq!(manager.state().await, TokenState::Authenticated);
}

#[tokio::test]
async fn when_another_process_refreshed_the_store_its_token_is_adopted() {
    // Given: This process holds an expired access token
    let http = Arc::new(ScriptedHttpClient::new());
    let store = Arc::new(MemoryTokenStore::with_tokens(tokens_issued(
        Duration::hours(1),
        "access-stale",
    )));
    let manager = manager(Arc::clone(&http), Arc::clone(&store));
    assert_eq!(manager.state().await, TokenState::RefreshRequired);

    // When: Another process writes a fresh token set to the shared store
    store
        .save(&tokens_issued(Duration::seconds(5), "access-other"))
        .await
        .expect("save");
    let token = manager.access_token().await.expect("token");

    // Then: The fresh token is used without refreshing again
    assert_eq!(token, "access-other");
    assert_eq!(http.request_count(), 0);
}

// =============================================================================
// Refresh
// =============================================================================

#[tokio::test]
async fn when_access_token_expired_it_is_refreshed_and_persisted() {
    // Given: A session whose access token expired half an hour ago
    let original = tokens_issued(Duration::hours(1), "access-1");
    let http = Arc::new(ScriptedHttpClient::new().respond_json(200, token_body("access-2")));
    let store = Arc::new(MemoryTokenStore::with_tokens(original.clone()));
    let manager = manager(Arc::clone(&http), Arc::clone(&store));

    // When: A bearer token is requested
    let token = manager.access_token().await.expect("refreshed token");

    // Then: One refresh_token grant is sent with client credentials
    assert_eq!(token, "access-2");
    let requests = http.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, HttpMethod::Post);
    assert!(requests[0].url.ends_with("/v1/oauth/token"));
    let body = requests[0].body.clone().unwrap_or_default();
    assert!(body.contains("grant_type=refresh_token"));
    assert!(body.contains("refresh_token=refresh-1"));
    assert!(requests[0]
        .headers
        .get("authorization")
        .is_some_and(|value| value.starts_with("Basic ")));

    // And: The new set is stored, keeping the original refresh deadline
    let stored = store.load().await.expect("load").expect("tokens stored");
    assert_eq!(stored.access_token, "access-2");
    assert_eq!(stored.refresh_token, "refresh-2");
    assert_eq!(stored.refresh_expires_at, original.refresh_expires_at);
}

#[tokio::test]
async fn when_many_callers_need_a_refresh_only_one_request_is_sent() {
    // Given: An expired access token and a slow token endpoint
    let http = Arc::new(
        ScriptedHttpClient::new()
            .with_delay(StdDuration::from_millis(50))
            .respond_json(200, token_body("access-2")),
    );
    let store = Arc::new(MemoryTokenStore::with_tokens(tokens_issued(
        Duration::hours(1),
        "access-1",
    )));
    let manager = Arc::new(manager(Arc::clone(&http), store));

    // When: Five tasks ask for a token at the same time
    let handles: Vec<_> = (0..5)
        .map(|_| {
            let manager = Arc::clone(&manager);
            tokio::spawn(async move { manager.access_token().await })
        })
        .collect();
    let mut tokens = Vec::new();
    for handle in handles {
        tokens.push(handle.await.expect("task").expect("token"));
    }

    // Then: All of them receive the refreshed token from a single request
    assert!(tokens.iter().all(|token| token == "access-2"));
    assert_eq!(http.request_count(), 1);
}

#[tokio::test]
async fn when_a_refreshing_caller_is_cancelled_the_state_recovers() {
    // Given: An expired access token and a token endpoint slower than the caller
    let http = Arc::new(
        ScriptedHttpClient::new()
            .with_delay(StdDuration::from_millis(200))
            .respond_json(200, token_body("access-2")),
    );
    let store = Arc::new(MemoryTokenStore::with_tokens(tokens_issued(
        Duration::hours(1),
        "access-1",
    )));
    let manager = Arc::new(manager(Arc::clone(&http), store));

    // When: The refresh is in flight
    let task = {
        let manager = Arc::clone(&manager);
        tokio::spawn(async move { manager.access_token().await })
    };
    tokio::time::sleep(StdDuration::from_millis(20)).await;
    assert_eq!(manager.state().await, TokenState::Refreshing);

    // And: The caller gives up before the endpoint answers
    let timed_out =
        tokio::time::timeout(StdDuration::from_millis(20), manager.access_token()).await;
    assert!(timed_out.is_err());
    task.abort();
    let _ = task.await;
    tokio::time::sleep(StdDuration::from_millis(250)).await;

    // Then: The manager no longer reports a refresh in flight
    assert_eq!(manager.state().await, TokenState::RefreshRequired);
}

#[tokio::test]
async fn when_a_clock_is_injected_refreshed_tokens_are_stamped_with_it() {
    // Given: A manager whose clock runs three days behind the wall clock
    let now = UtcDateTime::now()
        .checked_sub(Duration::days(3))
        .expect("timestamp in range");
    let issued = now
        .checked_sub(Duration::hours(1))
        .expect("timestamp in range");
    let current = TokenSet::from_code_exchange(
        TokenResponse {
            access_token: String::from("access-1"),
            refresh_token: Some(String::from("refresh-1")),
            token_type: String::from("Bearer"),
            expires_in: 1_800,
            scope: String::from("api"),
            id_token: None,
        },
        issued,
    )
    .expect("refresh token present");
    let http = Arc::new(ScriptedHttpClient::new().respond_json(200, token_body("access-2")));
    let store = Arc::new(MemoryTokenStore::with_tokens(current));
    let clock: Clock = Arc::new(move || now);
    let manager = manager(Arc::clone(&http), store).with_clock(clock);

    // When: The access token is refreshed
    let fresh = manager.force_refresh().await.expect("refreshed");

    // Then: Issue and expiry times follow the injected clock
    assert_eq!(fresh.issued_at, now);
    assert_eq!(
        fresh.access_expires_at,
        now.checked_add(Duration::seconds(1_800)).expect("in range")
    );
    assert_eq!(manager.state().await, TokenState::Authenticated);
}

#[tokio::test]
async fn when_refresh_token_is_past_seven_days_login_is_required() {
    // Given: A session issued eight days ago
    let http = Arc::new(ScriptedHttpClient::new());
    let store = Arc::new(MemoryTokenStore::with_tokens(tokens_issued(
        Duration::days(8),
        "access-1",
    )));
    let manager = manager(Arc::clone(&http), store);

    // When: A bearer token is requested
    let error = manager.access_token().await.expect_err("session expired");

    // Then: Reauthorization is required and nothing was sent
    assert_eq!(error.kind(), ApiErrorKind::ReauthRequired);
    assert_eq!(http.request_count(), 0);
    assert_eq!(manager.state().await, TokenState::Expired);
}

#[tokio::test]
async fn when_refresh_is_rejected_the_session_is_marked_expired() {
    // Given: The token endpoint rejects the refresh token
    let http = Arc::new(
        ScriptedHttpClient::new()
            .respond_json(400, r#"{"error":"invalid_grant","error_description":"expired"}"#),
    );
    let store = Arc::new(MemoryTokenStore::with_tokens(tokens_issued(
        Duration::hours(1),
        "access-1",
    )));
    let manager = manager(Arc::clone(&http), store);

    // When: A bearer token is requested
    let error = manager.access_token().await.expect_err("refresh rejected");

    // Then: The caller must log in again and later calls fail fast
    assert_eq!(error.kind(), ApiErrorKind::ReauthRequired);
    assert_eq!(manager.state().await, TokenState::Expired);

    let again = manager.access_token().await.expect_err("still expired");
    assert_eq!(again.kind(), ApiErrorKind::ReauthRequired);
    assert_eq!(http.request_count(), 1);
}

// =============================================================================
// Login and Logout
// =============================================================================

#[tokio::test]
async fn when_login_completes_tokens_are_saved() {
    // Given: A fresh manager and a token endpoint accepting the code
    let http = Arc::new(ScriptedHttpClient::new().respond_json(200, token_body("access-login")));
    let store = Arc::new(MemoryTokenStore::new());
    let manager = manager(Arc::clone(&http), Arc::clone(&store));
    assert_eq!(manager.state().await, TokenState::Unauthenticated);

    // When: The redirect URL from the browser is submitted
    manager
        .complete_login("https://127.0.0.1/?code=C0.b2F1dGg%40&session=abc")
        .await
        .expect("login");

    // Then: The code is exchanged and the session is stored
    let body = http.requests()[0].body.clone().unwrap_or_default();
    assert!(body.contains("grant_type=authorization_code"));
    assert!(body.contains("code=C0.b2F1dGg%40"));
    let stored = store.load().await.expect("load").expect("tokens stored");
    assert_eq!(stored.access_token, "access-login");
    assert_eq!(manager.state().await, TokenState::Authenticated);
}

#[tokio::test]
async fn when_redirect_url_has_no_code_nothing_is_sent() {
    // Given: A redirect URL without a code parameter
    let http = Arc::new(ScriptedHttpClient::new());
    let manager = manager(Arc::clone(&http), Arc::new(MemoryTokenStore::new()));

    // When: It is submitted
    let error = manager
        .complete_login("https://127.0.0.1/?session=abc")
        .await
        .expect_err("no code");

    // Then: The request is rejected locally
    assert_eq!(error.kind(), ApiErrorKind::InvalidRequest);
    assert_eq!(http.request_count(), 0);
}

#[tokio::test]
async fn when_logging_out_the_store_is_cleared() {
    // Given: An authenticated session
    let http = Arc::new(ScriptedHttpClient::new());
    let store = Arc::new(MemoryTokenStore::with_tokens(tokens_issued(
        Duration::minutes(1),
        "access-1",
    )));
    let manager = manager(http, Arc::clone(&store));
    assert_eq!(manager.state().await, TokenState::Authenticated);

    // When: The user logs out
    manager.logout().await.expect("logout");

    // Then: Nothing remains in the store or in memory
    assert!(store.load().await.expect("load").is_none());
    assert_eq!(manager.state().await, TokenState::Unauthenticated);
    let error = manager.access_token().await.expect_err("logged out");
    assert_eq!(error.kind(), ApiErrorKind::ReauthRequired);
}
