//! Behavior tests for the request pipeline of `SchwabClient`
//!
//! A scripted transport stands in for Schwab so every test can check
//! exactly which requests were sent and how responses were classified.

use std::sync::Arc;
use std::time::Duration;

use schwab_api_wrapper::fixtures::{self, demo_tokens, DEMO_ACCOUNT};
use schwab_api_wrapper::{
    ApiErrorKind, CacheMode, CircuitBreakerConfig, CircuitState, ClientConfig, HttpError,
    HttpMethod, HttpResponse, Instruction, MemoryTokenStore, MoverIndex, Order, OrderFilter,
    PriceHistoryParams, QuoteField, RetryConfig, SchwabClient, ScriptedHttpClient, Surface,
    Symbol, TransactionFilter, UtcDateTime,
};
use serde_json::json;

fn client_with(http: Arc<ScriptedHttpClient>, retry: RetryConfig) -> SchwabClient {
    let store = MemoryTokenStore::with_tokens(demo_tokens(UtcDateTime::now()));
    SchwabClient::builder(ClientConfig::new("app-key", "app-secret"))
        .http_client(http)
        .token_store(Arc::new(store))
        .retry(retry)
        .build()
}

fn client(http: Arc<ScriptedHttpClient>) -> SchwabClient {
    client_with(http, RetryConfig::fixed(Duration::from_millis(1), 2))
}

fn symbols(raw: &[&str]) -> Vec<Symbol> {
    Symbol::parse_many(raw).expect("valid symbols")
}

fn account_numbers_then(response: HttpResponse) -> Arc<ScriptedHttpClient> {
    Arc::new(
        ScriptedHttpClient::new()
            .respond_json(200, fixtures::ACCOUNT_NUMBERS)
            .respond(response),
    )
}

// =============================================================================
// Request Shape
// =============================================================================

#[tokio::test]
async fn when_quotes_are_requested_the_request_carries_auth_and_query() {
    // Given: A client with a valid session
    let http = Arc::new(ScriptedHttpClient::new().respond_json(200, fixtures::QUOTES));
    let client = client(Arc::clone(&http));

    // When: Two symbols are quoted with two field blocks
    let response = client
        .quotes(
            &symbols(&["AAPL", "FXAIX"]),
            &[QuoteField::Quote, QuoteField::Fundamental],
            false,
        )
        .await
        .expect("quotes");

    // Then: The sample response decodes
    assert!(response.quotes.contains_key("AAPL"));

    // And: The request targets the market data API with the expected query
    let request = &http.requests()[0];
    assert_eq!(request.method, HttpMethod::Get);
    assert!(request.url.starts_with("https://api.schwabapi.com/marketdata/v1/quotes?"));
    assert_eq!(request.query_param("symbols").as_deref(), Some("AAPL,FXAIX"));
    assert_eq!(request.query_param("fields").as_deref(), Some("quote,fundamental"));
    assert_eq!(request.query_param("indicative").as_deref(), Some("false"));
    assert_eq!(
        request.headers.get("authorization").map(String::as_str),
        Some("Bearer demo-access-token")
    );
    assert_eq!(
        request.headers.get("accept").map(String::as_str),
        Some("application/json")
    );
    assert!(request.headers.contains_key("schwab-client-correlid"));
}

#[tokio::test]
async fn when_symbol_list_is_empty_nothing_is_sent() {
    // Given: A client
    let http = Arc::new(ScriptedHttpClient::new());
    let client = client(Arc::clone(&http));

    // When: An empty symbol list is quoted
    let error = client.quotes(&[], &[], false).await.expect_err("empty list");

    // Then: The call is rejected locally
    assert_eq!(error.kind(), ApiErrorKind::InvalidRequest);
    assert_eq!(error.status(), None);
    assert_eq!(http.request_count(), 0);
}

// =============================================================================
// Status Mapping
// =============================================================================

#[tokio::test]
async fn when_schwab_returns_an_error_status_it_is_classified() {
    let cases = [
        (400, ApiErrorKind::InvalidRequest),
        (403, ApiErrorKind::Forbidden),
        (404, ApiErrorKind::NotFound),
    ];

    for (status, kind) in cases {
        // Given: Schwab answers with an error body
        let http = Arc::new(ScriptedHttpClient::new().respond_json(
            status,
            json!({"message": "request rejected", "errors": ["symbol is invalid"]}).to_string(),
        ));
        let client = client(Arc::clone(&http));

        // When: A quote is requested
        let error = client
            .quote(&Symbol::parse("AAPL").expect("valid"), &[])
            .await
            .expect_err("error status");

        // Then: Kind, status and message reflect the response, with no retry
        assert_eq!(error.kind(), kind, "status {status}");
        assert_eq!(error.status(), Some(status));
        assert!(error.message().contains("request rejected"));
        assert!(!error.retryable());
        assert_eq!(http.request_count(), 1);
    }
}

#[tokio::test]
async fn when_body_does_not_match_the_model_a_decode_error_is_returned() {
    // Given: A price history with a candle whose high is below its low
    let body = json!({
        "symbol": "AAPL",
        "empty": false,
        "candles": [{"open": 10.0, "high": 9.0, "low": 11.0, "close": 10.0,
                     "volume": 5, "datetime": 1704106800000_i64}]
    })
    .to_string();
    let http = Arc::new(ScriptedHttpClient::new().respond_json(200, body));
    let client = client(Arc::clone(&http));

    // When: Price history is requested
    let params = PriceHistoryParams::new(Symbol::parse("AAPL").expect("valid"));
    let error = client.price_history(&params).await.expect_err("bad candle");

    // Then: The response is reported as undecodable
    assert_eq!(error.kind(), ApiErrorKind::Decode);
}

#[tokio::test]
async fn when_a_field_has_the_wrong_type_the_decode_error_names_its_path() {
    // Given: A quote whose last price is a string
    let body = json!({
        "AAPL": {
            "assetMainType": "EQUITY",
            "symbol": "AAPL",
            "quote": {"lastPrice": "one hundred"}
        }
    })
    .to_string();
    let http = Arc::new(ScriptedHttpClient::new().respond_json(200, body));
    let client = client(Arc::clone(&http));

    // When: The quote is requested
    let error = client
        .quotes(&symbols(&["AAPL"]), &[QuoteField::Quote], false)
        .await
        .expect_err("string price");

    // Then: The error points at the offending field
    assert_eq!(error.kind(), ApiErrorKind::Decode);
    assert!(
        error.message().contains("AAPL.quote.lastPrice"),
        "{}",
        error.message()
    );
}

// =============================================================================
// Retries and 401 Handling
// =============================================================================

#[tokio::test]
async fn when_schwab_is_briefly_unavailable_the_call_is_retried() {
    // Given: One 503 followed by a success
    let http = Arc::new(
        ScriptedHttpClient::new()
            .respond_json(503, r#"{"message":"try again"}"#)
            .respond_json(200, fixtures::QUOTES),
    );
    let client = client(Arc::clone(&http));

    // When: Quotes are requested
    let result = client.quotes(&symbols(&["AAPL"]), &[], false).await;

    // Then: The retry succeeds
    assert!(result.is_ok());
    assert_eq!(http.request_count(), 2);
}

#[tokio::test]
async fn when_rate_limited_the_retry_after_header_is_honoured() {
    // Given: A 429 asking to retry immediately
    let http = Arc::new(
        ScriptedHttpClient::new()
            .respond(HttpResponse::new(429, "").with_header("retry-after", "0"))
            .respond_json(200, fixtures::MOVERS),
    );
    let client = client(Arc::clone(&http));

    // When: Movers are requested
    let movers = client
        .movers(MoverIndex::Spx, None, None)
        .await
        .expect("movers after retry");

    // Then: The second attempt is decoded
    assert!(!movers.is_empty());
    assert_eq!(http.request_count(), 2);
}

#[tokio::test]
async fn when_retries_are_exhausted_the_last_error_is_returned() {
    // Given: Schwab keeps failing
    let http = Arc::new(
        ScriptedHttpClient::new()
            .respond_json(500, "{}")
            .respond_json(502, "{}")
            .respond_json(503, "{}"),
    );
    let client = client(Arc::clone(&http));

    // When: Quotes are requested with two retries allowed
    let error = client
        .quotes(&symbols(&["AAPL"]), &[], false)
        .await
        .expect_err("all attempts fail");

    // Then: Three attempts were made and the error is retryable
    assert_eq!(http.request_count(), 3);
    assert_eq!(error.kind(), ApiErrorKind::Unavailable);
    assert_eq!(error.status(), Some(503));
    assert!(error.retryable());
}

#[tokio::test]
async fn when_access_token_is_rejected_it_is_refreshed_once() {
    // Given: A 401, a successful refresh, then data
    let http = Arc::new(
        ScriptedHttpClient::new()
            .respond_json(401, r#"{"message":"token invalid"}"#)
            .respond_json(
                200,
                json!({"access_token": "access-2", "refresh_token": "refresh-2",
                       "token_type": "Bearer", "expires_in": 1800, "scope": "api"})
                .to_string(),
            )
            .respond_json(200, fixtures::QUOTES),
    );
    let client = client(Arc::clone(&http));

    // When: Quotes are requested
    client
        .quotes(&symbols(&["AAPL"]), &[], false)
        .await
        .expect("quotes after refresh");

    // Then: The retried request uses the new token
    let requests = http.requests();
    assert_eq!(requests.len(), 3);
    assert!(requests[1].url.ends_with("/oauth/token"));
    assert_eq!(
        requests[2].headers.get("authorization").map(String::as_str),
        Some("Bearer access-2")
    );
}

#[tokio::test]
async fn when_refreshed_token_is_also_rejected_the_call_fails() {
    // Given: Two 401s around a successful refresh
    let http = Arc::new(
        ScriptedHttpClient::new()
            .respond_json(401, "{}")
            .respond_json(
                200,
                json!({"access_token": "access-2", "expires_in": 1800}).to_string(),
            )
            .respond_json(401, r#"{"message":"still invalid"}"#),
    );
    let client = client(Arc::clone(&http));

    // When: Quotes are requested
    let error = client
        .quotes(&symbols(&["AAPL"]), &[], false)
        .await
        .expect_err("unauthorized");

    // Then: The second 401 is surfaced without another refresh
    assert_eq!(error.kind(), ApiErrorKind::Unauthorized);
    assert_eq!(http.request_count(), 3);
}

// =============================================================================
// Circuit Breaker
// =============================================================================

#[tokio::test]
async fn when_market_data_keeps_failing_its_circuit_opens() {
    // Given: A breaker tripping after two failures and no retries
    let http = Arc::new(
        ScriptedHttpClient::new()
            .respond_json(500, "{}")
            .respond_json(500, "{}"),
    );
    let store = MemoryTokenStore::with_tokens(demo_tokens(UtcDateTime::now()));
    let client = SchwabClient::builder(ClientConfig::new("app-key", "app-secret"))
        .http_client(http.clone())
        .token_store(Arc::new(store))
        .retry(RetryConfig::no_retry())
        .circuit_breaker(CircuitBreakerConfig {
            failure_threshold: 2,
            open_timeout: Duration::from_secs(60),
        })
        .build();
    let aapl = symbols(&["AAPL"]);

    // When: Two calls fail and a third is attempted
    for _ in 0..2 {
        let _ = client.quotes(&aapl, &[], false).await;
    }
    let error = client
        .quotes(&aapl, &[], false)
        .await
        .expect_err("circuit open");

    // Then: The third call never reaches the network
    assert_eq!(error.kind(), ApiErrorKind::Unavailable);
    assert_eq!(http.request_count(), 2);
    assert_eq!(client.breaker(Surface::MarketData).state(), CircuitState::Open);
    assert_eq!(client.breaker(Surface::Trader).state(), CircuitState::Closed);
}

// =============================================================================
// Cache
// =============================================================================

#[tokio::test]
async fn when_the_same_quote_is_requested_twice_the_cache_answers() {
    // Given: A single scripted response
    let http = Arc::new(
        ScriptedHttpClient::new()
            .respond_json(200, fixtures::QUOTES)
            .respond_json(200, fixtures::QUOTES),
    );
    let client = client(Arc::clone(&http));
    let aapl = symbols(&["AAPL"]);

    // When: The same quotes are requested twice
    client.quotes(&aapl, &[], false).await.expect("first");
    client.quotes(&aapl, &[], false).await.expect("second");

    // Then: Only one request was sent
    assert_eq!(http.request_count(), 1);
    assert_eq!(client.cache_stats().await.hits, 1);

    // When: The cache is bypassed
    client
        .with_cache_mode(CacheMode::Bypass)
        .quotes(&aapl, &[], false)
        .await
        .expect("bypass");

    // Then: The network is used again
    assert_eq!(http.request_count(), 2);
}

// =============================================================================
// Trader: Account Hashes and Orders
// =============================================================================

#[tokio::test]
async fn when_account_number_is_used_its_hash_is_resolved_once() {
    // Given: Account numbers followed by two order listings
    let http = Arc::new(
        ScriptedHttpClient::new()
            .respond_json(200, fixtures::ACCOUNT_NUMBERS)
            .respond_json(200, fixtures::ORDERS)
            .respond_json(200, fixtures::ORDERS),
    );
    let client = client(Arc::clone(&http));
    let filter = OrderFilter::last_days(7);

    // When: Orders are listed twice for the same account
    let orders = client.orders(DEMO_ACCOUNT, &filter).await.expect("orders");
    client.orders(DEMO_ACCOUNT, &filter).await.expect("orders again");

    // Then: Hashes were fetched once and the URL uses the hash
    assert_eq!(orders.len(), 2);
    let requests = http.requests();
    assert_eq!(requests.len(), 3);
    assert!(requests[0].url.ends_with("/trader/v1/accounts/accountNumbers"));
    assert!(requests[1]
        .path()
        .ends_with("/trader/v1/accounts/demo-account-hash/orders"));
    assert!(!requests[1].url.contains(DEMO_ACCOUNT));
    assert!(requests[1].query_param("fromEnteredTime").is_some());
}

#[tokio::test]
async fn when_account_is_not_linked_not_found_is_returned() {
    // Given: Account numbers that do not include the requested one
    let http = Arc::new(ScriptedHttpClient::new().respond_json(200, fixtures::ACCOUNT_NUMBERS));
    let client = client(Arc::clone(&http));

    // When: An unknown account is queried
    let error = client
        .account("99999999", false)
        .await
        .expect_err("unknown account");

    // Then: The error is NotFound and does not echo the full number
    assert_eq!(error.kind(), ApiErrorKind::NotFound);
    assert!(!error.message().contains("99999999"));
    assert_eq!(http.request_count(), 1);
}

#[tokio::test]
async fn when_filters_are_invalid_nothing_is_sent() {
    // Given: A client
    let http = Arc::new(ScriptedHttpClient::new());
    let client = client(Arc::clone(&http));

    // When: Filters with an inverted range, too many results or no types are used
    let now = UtcDateTime::now();
    let earlier = now
        .checked_sub(time::Duration::days(1))
        .expect("timestamp in range");
    let inverted = OrderFilter::new(now, earlier);
    let too_many = OrderFilter::last_days(1).with_max_results(3_001);
    let too_wide = OrderFilter::new(
        now.checked_sub(time::Duration::days(400))
            .expect("timestamp in range"),
        now,
    );
    let no_types = TransactionFilter::new(earlier, now, Vec::new());

    // Then: Each is rejected locally
    for filter in [inverted, too_many, too_wide] {
        let error = client.all_orders(&filter).await.expect_err("invalid filter");
        assert_eq!(error.kind(), ApiErrorKind::InvalidRequest);
    }
    let error = client
        .transactions(DEMO_ACCOUNT, &no_types)
        .await
        .expect_err("no types");
    assert_eq!(error.kind(), ApiErrorKind::InvalidRequest);
    assert_eq!(http.request_count(), 0);
}

#[tokio::test]
async fn when_an_order_is_placed_its_id_comes_from_the_location_header() {
    // Given: Schwab accepts the order
    let http = account_numbers_then(HttpResponse::new(201, "").with_header(
        "location",
        "https://api.schwabapi.com/trader/v1/accounts/demo-account-hash/orders/1000001",
    ));
    let client = client(Arc::clone(&http));

    // When: A limit order is placed
    let order = Order::limit(Instruction::Buy, "AAPL", 10.0, 150.25);
    let order_id = client
        .place_order(DEMO_ACCOUNT, &order)
        .await
        .expect("placed");

    // Then: The id is returned and the body is the order JSON
    assert_eq!(order_id, 1_000_001);
    let request = &http.requests()[1];
    assert_eq!(request.method, HttpMethod::Post);
    let body: serde_json::Value =
        serde_json::from_str(request.body.as_deref().unwrap_or_default()).expect("json body");
    assert_eq!(body["orderType"], "LIMIT");
    assert_eq!(body["price"], 150.25);
    assert_eq!(body["orderLegCollection"][0]["instruction"], "BUY");
}

#[tokio::test]
async fn when_order_placement_gets_a_server_error_it_is_not_resent() {
    // Given: Schwab answers the order POST with 504, then would accept a resend
    let http = Arc::new(
        ScriptedHttpClient::new()
            .respond_json(200, fixtures::ACCOUNT_NUMBERS)
            .respond_json(504, r#"{"message":"gateway timeout"}"#)
            .respond(HttpResponse::new(201, "").with_header(
                "location",
                "https://api.schwabapi.com/trader/v1/accounts/demo-account-hash/orders/1000001",
            )),
    );
    let client = client(Arc::clone(&http));

    // When: An order is placed with retries enabled
    let order = Order::limit(Instruction::Buy, "AAPL", 10.0, 150.25);
    let error = client
        .place_order(DEMO_ACCOUNT, &order)
        .await
        .expect_err("504 surfaces");

    // Then: Exactly one POST was sent and the failure is reported as unavailable
    assert_eq!(error.kind(), ApiErrorKind::Unavailable);
    assert_eq!(error.status(), Some(504));
    let posts = http
        .requests()
        .iter()
        .filter(|request| request.method == HttpMethod::Post)
        .count();
    assert_eq!(posts, 1);
    assert_eq!(http.remaining(), 1);
}

#[tokio::test]
async fn when_order_request_times_out_it_is_not_resent() {
    // Given: The order POST times out after leaving the process
    let http = Arc::new(
        ScriptedHttpClient::new()
            .respond_json(200, fixtures::ACCOUNT_NUMBERS)
            .fail(HttpError::new("request timeout"))
            .respond(HttpResponse::new(201, "").with_header("location", "/orders/1")),
    );
    let client = client(Arc::clone(&http));

    // When: An order is cancelled
    let error = client
        .cancel_order(DEMO_ACCOUNT, 1)
        .await
        .expect_err("timeout surfaces");

    // Then: The DELETE was sent once
    assert_eq!(error.kind(), ApiErrorKind::Unavailable);
    assert_eq!(http.request_count(), 2);
}

#[tokio::test]
async fn when_order_connection_is_refused_it_is_sent_again() {
    // Given: The first connection attempt never reaches Schwab
    let http = Arc::new(
        ScriptedHttpClient::new()
            .respond_json(200, fixtures::ACCOUNT_NUMBERS)
            .fail(HttpError::connect("connection refused"))
            .respond(HttpResponse::new(201, "").with_header(
                "location",
                "https://api.schwabapi.com/trader/v1/accounts/demo-account-hash/orders/1000002",
            )),
    );
    let client = client(Arc::clone(&http));

    // When: An order is placed
    let order = Order::market(Instruction::Buy, "AAPL", 1.0);
    let order_id = client
        .place_order(DEMO_ACCOUNT, &order)
        .await
        .expect("placed on second attempt");

    // Then: The resend succeeded
    assert_eq!(order_id, 1_000_002);
    assert_eq!(http.request_count(), 3);
}

#[tokio::test]
async fn when_order_placement_is_rate_limited_it_is_sent_again() {
    // Given: Schwab rejects the first POST with 429
    let http = Arc::new(
        ScriptedHttpClient::new()
            .respond_json(200, fixtures::ACCOUNT_NUMBERS)
            .respond(HttpResponse::new(429, "").with_header("retry-after", "0"))
            .respond(HttpResponse::new(201, "").with_header(
                "location",
                "https://api.schwabapi.com/trader/v1/accounts/demo-account-hash/orders/1000003",
            )),
    );
    let client = client(Arc::clone(&http));

    // When: An order is placed
    let order = Order::market(Instruction::Sell, "AAPL", 1.0);
    let order_id = client
        .place_order(DEMO_ACCOUNT, &order)
        .await
        .expect("placed after 429");

    // Then: The order went through on the resend
    assert_eq!(order_id, 1_000_003);
    assert_eq!(http.request_count(), 3);
}

#[tokio::test]
async fn when_an_order_is_invalid_it_is_not_sent() {
    // Given: A limit order without a positive price
    let http = Arc::new(ScriptedHttpClient::new());
    let client = client(Arc::clone(&http));
    let order = Order::limit(Instruction::Sell, "AAPL", 10.0, 0.0);

    // When: It is placed
    let error = client
        .place_order(DEMO_ACCOUNT, &order)
        .await
        .expect_err("invalid order");

    // Then: Validation stops it before account resolution
    assert_eq!(error.kind(), ApiErrorKind::InvalidRequest);
    assert_eq!(http.request_count(), 0);
}

#[tokio::test]
async fn when_order_response_has_no_location_a_decode_error_is_returned() {
    // Given: Schwab answers 201 without a location header
    let http = account_numbers_then(HttpResponse::new(201, ""));
    let client = client(Arc::clone(&http));

    // When: A market order is placed
    let order = Order::market(Instruction::Buy, "AAPL", 1.0);
    let error = client
        .place_order(DEMO_ACCOUNT, &order)
        .await
        .expect_err("no location");

    // Then: The missing id is reported as a decode failure
    assert_eq!(error.kind(), ApiErrorKind::Decode);
}
