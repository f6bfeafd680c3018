//! Sanitized sample responses and an offline transport that serves them.
//!
//! The samples under `fixtures/` are what [`crate::sanitize`] produces from
//! recorded responses. [`FixtureHttpClient`] routes requests to them by
//! URL path so the whole client (and the CLI's `--mock` mode) can run
//! without credentials or network access.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::json;

use crate::auth::{TokenSet, DEFAULT_ACCESS_TOKEN_LIFETIME_SECS, REFRESH_TOKEN_LIFETIME};
use crate::http_client::{HttpClient, HttpError, HttpMethod, HttpRequest, HttpResponse};
use crate::UtcDateTime;

pub const QUOTES: &str = include_str!("../fixtures/quotes.json");
pub const PRICE_HISTORY: &str = include_str!("../fixtures/price_history.json");
pub const OPTION_CHAIN: &str = include_str!("../fixtures/option_chain.json");
pub const EXPIRATION_CHAIN: &str = include_str!("../fixtures/expiration_chain.json");
pub const MOVERS: &str = include_str!("../fixtures/movers.json");
pub const MARKET_HOURS: &str = include_str!("../fixtures/market_hours.json");
pub const INSTRUMENTS: &str = include_str!("../fixtures/instruments.json");
pub const ACCOUNT_NUMBERS: &str = include_str!("../fixtures/account_numbers.json");
pub const ACCOUNTS: &str = include_str!("../fixtures/accounts.json");
pub const ACCOUNT: &str = include_str!("../fixtures/account.json");
pub const ORDERS: &str = include_str!("../fixtures/orders.json");
pub const ORDER: &str = include_str!("../fixtures/order.json");
pub const ORDER_PREVIEW: &str = include_str!("../fixtures/order_preview.json");
pub const TRANSACTIONS: &str = include_str!("../fixtures/transactions.json");
pub const TRANSACTION: &str = include_str!("../fixtures/transaction.json");
pub const USER_PREFERENCE: &str = include_str!("../fixtures/user_preference.json");

/// Every sample as `(file name, body)`.
pub const ALL: [(&str, &str); 16] = [
    ("quotes.json", QUOTES),
    ("price_history.json", PRICE_HISTORY),
    ("option_chain.json", OPTION_CHAIN),
    ("expiration_chain.json", EXPIRATION_CHAIN),
    ("movers.json", MOVERS),
    ("market_hours.json", MARKET_HOURS),
    ("instruments.json", INSTRUMENTS),
    ("account_numbers.json", ACCOUNT_NUMBERS),
    ("accounts.json", ACCOUNTS),
    ("account.json", ACCOUNT),
    ("orders.json", ORDERS),
    ("order.json", ORDER),
    ("order_preview.json", ORDER_PREVIEW),
    ("transactions.json", TRANSACTIONS),
    ("transaction.json", TRANSACTION),
    ("user_preference.json", USER_PREFERENCE),
];

/// Account number used throughout the samples.
pub const DEMO_ACCOUNT: &str = "DEMO123456";

/// Token set valid for a full access-token lifetime from `now`.
pub fn demo_tokens(now: UtcDateTime) -> TokenSet {
    let access_expires_at = now
        .checked_add(time::Duration::seconds(DEFAULT_ACCESS_TOKEN_LIFETIME_SECS))
        .unwrap_or(now);
    let refresh_expires_at = now.checked_add(REFRESH_TOKEN_LIFETIME).unwrap_or(now);
    TokenSet {
        access_token: String::from("demo-access-token"),
        refresh_token: String::from("demo-refresh-token"),
        token_type: String::from("Bearer"),
        scope: String::from("api"),
        id_token: None,
        issued_at: now,
        access_expires_at,
        refresh_expires_at,
    }
}

/// Offline transport answering from the bundled samples.
#[derive(Debug)]
pub struct FixtureHttpClient {
    next_order_id: AtomicU64,
}

impl FixtureHttpClient {
    pub fn new() -> Self {
        Self {
            next_order_id: AtomicU64::new(1_000_001),
        }
    }

    fn route(&self, request: &HttpRequest) -> HttpResponse {
        let path = request.path();
        let segments: Vec<&str> = path
            .split('/')
            .skip_while(|segment| *segment != "v1")
            .skip(1)
            .collect();

        match (request.method, segments.as_slice()) {
            (HttpMethod::Post, ["oauth", "token"]) => HttpResponse::ok_json(token_body()),
            (HttpMethod::Get, ["accounts", "accountNumbers"]) => HttpResponse::ok_json(ACCOUNT_NUMBERS),
            (HttpMethod::Get, ["accounts"]) => HttpResponse::ok_json(ACCOUNTS),
            (HttpMethod::Get, ["accounts", _]) => HttpResponse::ok_json(ACCOUNT),
            (HttpMethod::Get, ["accounts", _, "orders"] | ["orders"]) => HttpResponse::ok_json(ORDERS),
            (HttpMethod::Get, ["accounts", _, "orders", _]) => HttpResponse::ok_json(ORDER),
            (HttpMethod::Post, ["accounts", _, "orders"]) | (HttpMethod::Put, ["accounts", _, "orders", _]) => {
                let order_id = self.next_order_id.fetch_add(1, Ordering::Relaxed);
                let base = path.rsplit_once("/orders").map_or(path, |(base, _)| base);
                HttpResponse::new(201, "").with_header("location", format!("{base}/orders/{order_id}"))
            }
            (HttpMethod::Delete, ["accounts", _, "orders", _]) => HttpResponse::new(200, ""),
            (HttpMethod::Post, ["accounts", _, "previewOrder"]) => HttpResponse::ok_json(ORDER_PREVIEW),
            (HttpMethod::Get, ["accounts", _, "transactions"]) => HttpResponse::ok_json(TRANSACTIONS),
            (HttpMethod::Get, ["accounts", _, "transactions", _]) => HttpResponse::ok_json(TRANSACTION),
            (HttpMethod::Get, ["userPreference"]) => HttpResponse::ok_json(USER_PREFERENCE),
            (HttpMethod::Get, ["quotes"] | [_, "quotes"]) => HttpResponse::ok_json(QUOTES),
            (HttpMethod::Get, ["chains"]) => HttpResponse::ok_json(OPTION_CHAIN),
            (HttpMethod::Get, ["expirationchain"]) => HttpResponse::ok_json(EXPIRATION_CHAIN),
            (HttpMethod::Get, ["pricehistory"]) => HttpResponse::ok_json(PRICE_HISTORY),
            (HttpMethod::Get, ["movers", _]) => HttpResponse::ok_json(MOVERS),
            (HttpMethod::Get, ["markets"] | ["markets", _]) => HttpResponse::ok_json(MARKET_HOURS),
            (HttpMethod::Get, ["instruments"] | ["instruments", _]) => HttpResponse::ok_json(INSTRUMENTS),
            _ => HttpResponse::new(
                404,
                json!({ "message": format!("no fixture for {} {path}", request.method.as_str()) })
                    .to_string(),
            ),
        }
    }
}

impl Default for FixtureHttpClient {
    fn default() -> Self {
        Self::new()
    }
}

fn token_body() -> String {
    json!({
        "access_token": "demo-access-token",
        "refresh_token": "demo-refresh-token",
        "token_type": "Bearer",
        "expires_in": DEFAULT_ACCESS_TOKEN_LIFETIME_SECS,
        "scope": "api",
    })
    .to_string()
}

impl HttpClient for FixtureHttpClient {
    fn execute<'a>(
        &'a self,
        request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>> {
        let response = self.route(&request);
        Box::pin(async move { Ok(response) })
    }
}
