//! Typed client for the Schwab Trader and Market Data APIs.
//!
//! Every call goes through the same pipeline:
//!
//! 1. wait for request budget ([`RequestThrottle`])
//! 2. check the surface's [`CircuitBreaker`]
//! 3. serve market data GETs from the [`ResponseCache`] when allowed
//! 4. attach the bearer token, `accept` and a correlation id
//! 5. on 401 refresh once and retry; retry transient statuses with backoff
//!    (writes are resent only after 429 or a failed connect)
//! 6. map failures to [`ApiError`] and decode the body

mod market_data;
mod params;
mod trader;

use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use tokio::sync::RwLock;
use tracing::{debug, warn};

pub use params::{
    ContractType, FrequencyType, MarketId, MoverIndex, MoverSort, OptionChainParams, OrderFilter,
    PeriodType, PriceHistoryParams, Projection, QuoteField, TransactionFilter,
    MAX_ORDER_RESULTS, MAX_QUERY_RANGE_YEARS, MOVER_FREQUENCIES,
};

use crate::auth::{MemoryTokenStore, OAuthClient, TokenManager, TokenStore};
use crate::cache::{CacheMode, CacheStats, ResponseCache};
use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
use crate::config::ClientConfig;
use crate::error::describe_error_body;
use crate::http_client::{
    HttpAuth, HttpClient, HttpMethod, HttpRequest, HttpResponse, ReqwestHttpClient,
};
use crate::retry::{parse_retry_after, RetryConfig};
use crate::throttling::RequestThrottle;
use crate::ApiError;

pub const CORRELATION_HEADER: &str = "schwab-client-correlid";

/// API surface a request belongs to; each has its own base URL and
/// circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Surface {
    Trader,
    MarketData,
}

impl Surface {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Trader => "trader",
            Self::MarketData => "marketdata",
        }
    }
}

impl Display for Surface {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

struct ClientInner {
    config: ClientConfig,
    http: Arc<dyn HttpClient>,
    tokens: TokenManager,
    throttle: RequestThrottle,
    trader_breaker: CircuitBreaker,
    market_breaker: CircuitBreaker,
    cache: ResponseCache,
    retry: RetryConfig,
    account_hashes: RwLock<HashMap<String, String>>,
}

/// Cheap to clone; clones share tokens, budget, breakers and cache.
#[derive(Clone)]
pub struct SchwabClient {
    inner: Arc<ClientInner>,
    cache_mode: CacheMode,
}

impl SchwabClient {
    pub fn builder(config: ClientConfig) -> SchwabClientBuilder {
        SchwabClientBuilder::new(config)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn tokens(&self) -> &TokenManager {
        &self.inner.tokens
    }

    pub fn oauth(&self) -> &OAuthClient {
        self.inner.tokens.oauth()
    }

    /// Clone of this client using `mode` for cacheable calls.
    pub fn with_cache_mode(&self, mode: CacheMode) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            cache_mode: mode,
        }
    }

    pub const fn cache_mode(&self) -> CacheMode {
        self.cache_mode
    }

    pub async fn cache_stats(&self) -> CacheStats {
        self.inner.cache.stats().await
    }

    pub fn breaker(&self, surface: Surface) -> &CircuitBreaker {
        match surface {
            Surface::Trader => &self.inner.trader_breaker,
            Surface::MarketData => &self.inner.market_breaker,
        }
    }

    fn base_url(&self, surface: Surface) -> &str {
        let url = match surface {
            Surface::Trader => &self.inner.config.trader_base_url,
            Surface::MarketData => &self.inner.config.market_data_base_url,
        };
        url.trim_end_matches('/')
    }

    pub(crate) fn request(&self, surface: Surface, method: HttpMethod, path: &str) -> HttpRequest {
        HttpRequest::new(method, format!("{}{path}", self.base_url(surface)))
    }

    pub(crate) async fn get_json<T: DeserializeOwned>(
        &self,
        surface: Surface,
        request: HttpRequest,
        cache_ttl: Option<Duration>,
    ) -> Result<T, ApiError> {
        let response = self.send(surface, request, cache_ttl).await?;
        decode_body(&response.body)
    }

    /// Runs `request` through the pipeline. `cache_ttl` enables caching
    /// for GETs; the key is the full URL.
    pub(crate) async fn send(
        &self,
        surface: Surface,
        request: HttpRequest,
        cache_ttl: Option<Duration>,
    ) -> Result<HttpResponse, ApiError> {
        let cache_ttl = cache_ttl.filter(|_| request.method == HttpMethod::Get);
        if cache_ttl.is_some() && self.cache_mode.reads() {
            if let Some(body) = self.inner.cache.get(&request.url).await {
                debug!(surface = %surface, url = %request.url, "cache hit");
                return Ok(HttpResponse::ok_json(body));
            }
        }

        let response = self.send_with_retries(surface, &request).await?;

        if let Some(ttl) = cache_ttl.filter(|_| self.cache_mode.writes()) {
            self.inner
                .cache
                .put(request.url.clone(), response.body.clone(), ttl)
                .await;
        }
        Ok(response)
    }

    async fn send_with_retries(
        &self,
        surface: Surface,
        request: &HttpRequest,
    ) -> Result<HttpResponse, ApiError> {
        let breaker = self.breaker(surface);
        let retry = &self.inner.retry;
        let mut attempt: u32 = 0;
        let mut refreshed_after_401 = false;

        loop {
            if !breaker.allow_request() {
                return Err(ApiError::unavailable(format!(
                    "{surface} API circuit is open; not sending request"
                )));
            }
            self.inner.throttle.wait().await;

            let token = self.inner.tokens.access_token().await?;
            let correlation_id = uuid::Uuid::new_v4().to_string();
            let outgoing = request
                .clone()
                .with_auth(&HttpAuth::BearerToken(token.clone()))
                .with_header("accept", "application/json")
                .with_header(CORRELATION_HEADER, correlation_id.as_str())
                .with_timeout_ms(self.inner.config.timeout_ms);

            debug!(
                surface = %surface,
                method = request.method.as_str(),
                url = %request.url,
                attempt,
                correlation_id = %correlation_id,
                "sending request"
            );

            let (retry_after, failure) = match self.inner.http.execute(outgoing).await {
                Ok(response) if response.is_success() => {
                    breaker.record_success();
                    return Ok(response);
                }
                Ok(response) if response.status == 401 && !refreshed_after_401 => {
                    refreshed_after_401 = true;
                    self.inner.tokens.invalidate_access(&token).await;
                    continue;
                }
                Ok(response) => {
                    let status = response.status;
                    if status >= 500 {
                        breaker.record_failure();
                    } else {
                        breaker.record_success();
                    }
                    let error =
                        ApiError::from_status(status, describe_error_body(status, &response.body));
                    if !retry.should_retry_status(status) || !may_resend(request.method, status) {
                        return Err(error);
                    }
                    let retry_after = response
                        .header("retry-after")
                        .and_then(parse_retry_after);
                    (retry_after, error)
                }
                Err(error) => {
                    breaker.record_failure();
                    let failure = ApiError::unavailable(format!(
                        "{surface} request failed: {}",
                        error.message()
                    ));
                    if !error.retryable() || (error.request_sent() && !request.method.is_read()) {
                        return Err(failure);
                    }
                    (None, failure)
                }
            };

            if attempt >= retry.max_retries {
                return Err(failure);
            }
            let delay = retry.delay_for_attempt(attempt, retry_after);
            warn!(
                surface = %surface,
                url = %request.url,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %failure,
                "retrying request"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

/// A write that got a server answer is resent only after 429, which
/// Schwab returns before acting on the request.
fn may_resend(method: HttpMethod, status: u16) -> bool {
    method.is_read() || status == 429
}

/// Decodes a response body. Failures name the JSON path that did not fit.
pub(crate) fn decode_body<T: DeserializeOwned>(body: &str) -> Result<T, ApiError> {
    let mut deserializer = serde_json::Deserializer::from_str(body);
    let value = serde_path_to_error::deserialize(&mut deserializer).map_err(|error| {
        ApiError::decode(format!(
            "unexpected response shape at '{}': {}",
            error.path(),
            error.inner()
        ))
    })?;
    deserializer
        .end()
        .map_err(|error| ApiError::decode(format!("trailing data after response: {error}")))?;
    Ok(value)
}

/// Hides all but the last four characters of an account number.
pub fn mask_account(number: &str) -> String {
    let visible = number.len().saturating_sub(4);
    match number.get(visible..) {
        Some(tail) if visible > 0 => format!("{}{tail}", "*".repeat(visible.min(4))),
        _ => number.to_owned(),
    }
}

impl std::fmt::Debug for SchwabClient {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchwabClient")
            .field("config", &self.inner.config)
            .field("cache_mode", &self.cache_mode)
            .finish_non_exhaustive()
    }
}

/// Assembles a [`SchwabClient`]. Defaults: reqwest transport and an
/// in-memory token store.
pub struct SchwabClientBuilder {
    config: ClientConfig,
    http: Option<Arc<dyn HttpClient>>,
    store: Option<Arc<dyn TokenStore>>,
    retry: Option<RetryConfig>,
    breaker: CircuitBreakerConfig,
    cache_mode: CacheMode,
    clock: Option<crate::auth::Clock>,
}

impl SchwabClientBuilder {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            http: None,
            store: None,
            retry: None,
            breaker: CircuitBreakerConfig::default(),
            cache_mode: CacheMode::Use,
            clock: None,
        }
    }

    pub fn http_client(mut self, http: Arc<dyn HttpClient>) -> Self {
        self.http = Some(http);
        self
    }

    pub fn token_store(mut self, store: Arc<dyn TokenStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Overrides the retry policy derived from the config.
    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.retry = Some(retry);
        self
    }

    pub fn circuit_breaker(mut self, config: CircuitBreakerConfig) -> Self {
        self.breaker = config;
        self
    }

    pub fn cache_mode(mut self, mode: CacheMode) -> Self {
        self.cache_mode = mode;
        self
    }

    pub fn clock(mut self, clock: crate::auth::Clock) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn build(self) -> SchwabClient {
        let http: Arc<dyn HttpClient> = self
            .http
            .unwrap_or_else(|| Arc::new(ReqwestHttpClient::new()));
        let store: Arc<dyn TokenStore> = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryTokenStore::new()));

        let oauth = OAuthClient::new(&self.config, Arc::clone(&http));
        let mut tokens = TokenManager::new(oauth, store, self.config.refresh_skew());
        if let Some(clock) = self.clock {
            tokens = tokens.with_clock(clock);
        }

        let retry = self
            .retry
            .unwrap_or_else(|| self.config.retry.to_retry_config());
        let throttle = RequestThrottle::per_minute(self.config.rate_limit.requests_per_minute);

        SchwabClient {
            inner: Arc::new(ClientInner {
                http,
                tokens,
                throttle,
                trader_breaker: CircuitBreaker::new(Surface::Trader.as_str(), self.breaker),
                market_breaker: CircuitBreaker::new(Surface::MarketData.as_str(), self.breaker),
                cache: ResponseCache::with_capacity(self.config.cache.max_entries),
                retry,
                account_hashes: RwLock::new(HashMap::new()),
                config: self.config,
            }),
            cache_mode: self.cache_mode,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masks_account_numbers() {
        assert_eq!(mask_account("12345678"), "****5678");
        assert_eq!(mask_account("123"), "123");
    }

    #[test]
    fn request_joins_base_url_and_path() {
        let mut config = ClientConfig::new("id", "secret");
        config.market_data_base_url = String::from("https://md.example/v1/");
        let client = SchwabClient::builder(config).build();

        let request = client.request(Surface::MarketData, HttpMethod::Get, "/quotes");
        assert_eq!(request.url, "https://md.example/v1/quotes");
    }
}
