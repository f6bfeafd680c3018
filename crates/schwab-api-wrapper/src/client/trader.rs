use serde::Deserialize;
use tracing::{debug, instrument};

use super::{decode_body, mask_account, OrderFilter, SchwabClient, Surface, TransactionFilter};
use crate::domain::{
    Account, AccountNumberHash, Order, OrderPreview, Transaction, UserPreference,
};
use crate::http_client::{HttpMethod, HttpRequest, HttpResponse};
use crate::ApiError;

/// `GET /accounts/{hash}/transactions/{id}` has been observed returning
/// both a bare object and a one-element array.
#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl SchwabClient {
    /// Account numbers with their hashes. Refreshes the hash cache used by
    /// every other trader call.
    #[instrument(skip(self))]
    pub async fn account_numbers(&self) -> Result<Vec<AccountNumberHash>, ApiError> {
        let request = self.request(Surface::Trader, HttpMethod::Get, "/accounts/accountNumbers");
        let pairs: Vec<AccountNumberHash> = self.get_json(Surface::Trader, request, None).await?;

        let mut hashes = self.inner.account_hashes.write().await;
        hashes.clear();
        hashes.extend(
            pairs
                .iter()
                .map(|pair| (pair.account_number.clone(), pair.hash_value.clone())),
        );
        debug!(accounts = pairs.len(), "account hashes refreshed");
        Ok(pairs)
    }

    /// Resolves an account number to the hash used in trader URLs. A value
    /// that already is a known hash is returned unchanged.
    pub async fn account_hash(&self, account: &str) -> Result<String, ApiError> {
        let account = account.trim();
        if account.is_empty() {
            return Err(ApiError::invalid_request("account number cannot be empty"));
        }

        if let Some(hash) = self.cached_hash(account).await {
            return Ok(hash);
        }
        self.account_numbers().await?;
        self.cached_hash(account).await.ok_or_else(|| {
            ApiError::not_found(format!(
                "account {} is not linked to this login",
                mask_account(account)
            ))
        })
    }

    async fn cached_hash(&self, account: &str) -> Option<String> {
        let hashes = self.inner.account_hashes.read().await;
        hashes.get(account).cloned().or_else(|| {
            hashes
                .values()
                .find(|hash| hash.as_str() == account)
                .cloned()
        })
    }

    async fn account_path(&self, account: &str, suffix: &str) -> Result<String, ApiError> {
        let hash = self.account_hash(account).await?;
        Ok(format!("/accounts/{}{suffix}", urlencoding::encode(&hash)))
    }

    #[instrument(skip(self))]
    pub async fn accounts(&self, with_positions: bool) -> Result<Vec<Account>, ApiError> {
        let request = self
            .request(Surface::Trader, HttpMethod::Get, "/accounts")
            .with_optional_query("fields", with_positions.then_some("positions"));
        self.get_json(Surface::Trader, request, None).await
    }

    #[instrument(skip(self, account), fields(account = %mask_account(account)))]
    pub async fn account(&self, account: &str, with_positions: bool) -> Result<Account, ApiError> {
        let path = self.account_path(account, "").await?;
        let request = self
            .request(Surface::Trader, HttpMethod::Get, &path)
            .with_optional_query("fields", with_positions.then_some("positions"));
        self.get_json(Surface::Trader, request, None).await
    }

    /// Orders for one account entered within the filter's window.
    #[instrument(skip(self, account, filter), fields(account = %mask_account(account)))]
    pub async fn orders(&self, account: &str, filter: &OrderFilter) -> Result<Vec<Order>, ApiError> {
        filter.validate()?;
        let path = self.account_path(account, "/orders").await?;
        let request = with_filter(
            self.request(Surface::Trader, HttpMethod::Get, &path),
            filter.query(),
        );
        self.get_json(Surface::Trader, request, None).await
    }

    /// Orders across every linked account.
    #[instrument(skip(self, filter))]
    pub async fn all_orders(&self, filter: &OrderFilter) -> Result<Vec<Order>, ApiError> {
        filter.validate()?;
        let request = with_filter(
            self.request(Surface::Trader, HttpMethod::Get, "/orders"),
            filter.query(),
        );
        self.get_json(Surface::Trader, request, None).await
    }

    #[instrument(skip(self, account), fields(account = %mask_account(account)))]
    pub async fn order(&self, account: &str, order_id: i64) -> Result<Order, ApiError> {
        let path = self.account_path(account, &format!("/orders/{order_id}")).await?;
        let request = self.request(Surface::Trader, HttpMethod::Get, &path);
        self.get_json(Surface::Trader, request, None).await
    }

    /// Submits `order` and returns the id Schwab assigned to it.
    #[instrument(skip(self, account, order), fields(account = %mask_account(account)))]
    pub async fn place_order(&self, account: &str, order: &Order) -> Result<i64, ApiError> {
        order.validate()?;
        let path = self.account_path(account, "/orders").await?;
        let request = self
            .request(Surface::Trader, HttpMethod::Post, &path)
            .with_json_body(encode_order(order)?);

        let response = self.send(Surface::Trader, request, None).await?;
        order_id_from_location(&response)
    }

    /// Replaces an open order. Schwab cancels `order_id` and creates a new
    /// order, whose id is returned.
    #[instrument(skip(self, account, order), fields(account = %mask_account(account)))]
    pub async fn replace_order(
        &self,
        account: &str,
        order_id: i64,
        order: &Order,
    ) -> Result<i64, ApiError> {
        order.validate()?;
        let path = self.account_path(account, &format!("/orders/{order_id}")).await?;
        let request = self
            .request(Surface::Trader, HttpMethod::Put, &path)
            .with_json_body(encode_order(order)?);

        let response = self.send(Surface::Trader, request, None).await?;
        order_id_from_location(&response)
    }

    #[instrument(skip(self, account), fields(account = %mask_account(account)))]
    pub async fn cancel_order(&self, account: &str, order_id: i64) -> Result<(), ApiError> {
        let path = self.account_path(account, &format!("/orders/{order_id}")).await?;
        let request = self.request(Surface::Trader, HttpMethod::Delete, &path);
        self.send(Surface::Trader, request, None).await?;
        Ok(())
    }

    /// Runs Schwab's order checks without placing the order.
    #[instrument(skip(self, account, order), fields(account = %mask_account(account)))]
    pub async fn preview_order(
        &self,
        account: &str,
        order: &Order,
    ) -> Result<OrderPreview, ApiError> {
        order.validate()?;
        let path = self.account_path(account, "/previewOrder").await?;
        let request = self
            .request(Surface::Trader, HttpMethod::Post, &path)
            .with_json_body(encode_order(order)?);
        self.get_json(Surface::Trader, request, None).await
    }

    #[instrument(skip(self, account, filter), fields(account = %mask_account(account)))]
    pub async fn transactions(
        &self,
        account: &str,
        filter: &TransactionFilter,
    ) -> Result<Vec<Transaction>, ApiError> {
        filter.validate()?;
        let path = self.account_path(account, "/transactions").await?;
        let request = with_filter(
            self.request(Surface::Trader, HttpMethod::Get, &path),
            filter.query(),
        );
        self.get_json(Surface::Trader, request, None).await
    }

    #[instrument(skip(self, account), fields(account = %mask_account(account)))]
    pub async fn transaction(
        &self,
        account: &str,
        transaction_id: i64,
    ) -> Result<Transaction, ApiError> {
        let path = self
            .account_path(account, &format!("/transactions/{transaction_id}"))
            .await?;
        let request = self.request(Surface::Trader, HttpMethod::Get, &path);
        let response = self.send(Surface::Trader, request, None).await?;

        match decode_body::<OneOrMany<Transaction>>(&response.body)? {
            OneOrMany::One(transaction) => Ok(transaction),
            OneOrMany::Many(transactions) => transactions.into_iter().next().ok_or_else(|| {
                ApiError::not_found(format!("transaction {transaction_id} not found"))
            }),
        }
    }

    #[instrument(skip(self))]
    pub async fn user_preference(&self) -> Result<UserPreference, ApiError> {
        let request = self.request(Surface::Trader, HttpMethod::Get, "/userPreference");
        let response = self.send(Surface::Trader, request, None).await?;

        match decode_body::<OneOrMany<UserPreference>>(&response.body)? {
            OneOrMany::One(preference) => Ok(preference),
            OneOrMany::Many(preferences) => preferences
                .into_iter()
                .next()
                .ok_or_else(|| ApiError::decode("user preference response was empty")),
        }
    }
}

fn with_filter(request: HttpRequest, query: Vec<(&'static str, String)>) -> HttpRequest {
    query
        .into_iter()
        .fold(request, |request, (name, value)| request.with_query(name, value))
}

fn encode_order(order: &Order) -> Result<String, ApiError> {
    serde_json::to_string(order)
        .map_err(|error| ApiError::internal(format!("failed to encode order: {error}")))
}

/// Order id from the last path segment of the `location` header, e.g.
/// `.../accounts/{hash}/orders/1000001`.
fn order_id_from_location(response: &HttpResponse) -> Result<i64, ApiError> {
    let location = response
        .header("location")
        .ok_or_else(|| ApiError::decode("order accepted but response has no location header"))?;
    location
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .and_then(|segment| segment.parse().ok())
        .ok_or_else(|| ApiError::decode(format!("no order id in location header '{location}'")))
}
