//! Decoding tests against the bundled sample payloads

use schwab_api_wrapper::domain::{
    AccountNumberHash, AssetMainType, Candle, ExpirationChain, InstrumentsResponse, MarketHours,
    MoversResponse, OptionChain, OrderPreview, PriceHistory, UserPreference,
};
use schwab_api_wrapper::fixtures;
use schwab_api_wrapper::{
    Account, Instruction, Order, OrderStatus, OrderType, QuoteResponse, Symbol, Transaction,
    ValidationError,
};
use serde::de::DeserializeOwned;
use serde_json::json;

fn decode<T: DeserializeOwned>(name: &str, body: &str) -> T {
    serde_json::from_str(body).unwrap_or_else(|error| panic!("{name} should decode: {error}"))
}

// =============================================================================
// Sample Payloads
// =============================================================================

#[test]
fn every_sample_payload_decodes_into_its_model() {
    let quotes: QuoteResponse = decode("quotes", fixtures::QUOTES);
    let history: PriceHistory = decode("price_history", fixtures::PRICE_HISTORY);
    let chain: OptionChain = decode("option_chain", fixtures::OPTION_CHAIN);
    let _: ExpirationChain = decode("expiration_chain", fixtures::EXPIRATION_CHAIN);
    let movers: MoversResponse = decode("movers", fixtures::MOVERS);
    let hours: MarketHours = decode("market_hours", fixtures::MARKET_HOURS);
    let _: InstrumentsResponse = decode("instruments", fixtures::INSTRUMENTS);
    let numbers: Vec<AccountNumberHash> = decode("account_numbers", fixtures::ACCOUNT_NUMBERS);
    let accounts: Vec<Account> = decode("accounts", fixtures::ACCOUNTS);
    let account: Account = decode("account", fixtures::ACCOUNT);
    let orders: Vec<Order> = decode("orders", fixtures::ORDERS);
    let _: Order = decode("order", fixtures::ORDER);
    let _: OrderPreview = decode("order_preview", fixtures::ORDER_PREVIEW);
    let transactions: Vec<Transaction> = decode("transactions", fixtures::TRANSACTIONS);
    let _: Transaction = decode("transaction", fixtures::TRANSACTION);
    let _: UserPreference = decode("user_preference", fixtures::USER_PREFERENCE);

    assert_eq!(quotes.quotes.len(), 2);
    assert!(history.validate().is_ok());
    assert!(chain.contract_count() > 0);
    assert!(!movers.screeners.is_empty());
    assert!(hours.contains_key("equity"));
    assert_eq!(numbers[0].account_number, fixtures::DEMO_ACCOUNT);
    assert!(!accounts.is_empty());
    assert_eq!(account.securities_account.account_number, fixtures::DEMO_ACCOUNT);
    assert_eq!(orders.len(), 2);
    assert_eq!(transactions.len(), 2);
}

#[test]
fn quote_sample_exposes_prices_and_fundamentals() {
    let quotes: QuoteResponse = decode("quotes", fixtures::QUOTES);
    let aapl = quotes
        .get(&Symbol::parse("AAPL").expect("valid"))
        .expect("AAPL quoted");

    assert_eq!(aapl.asset_main_type, AssetMainType::Equity);
    let detail = aapl.quote.as_ref().expect("quote block");
    assert_eq!(detail.mid(), Some(100.0));
    let fundamental = aapl.fundamental.as_ref().expect("fundamental block");
    assert_eq!(fundamental.div_freq.map(|freq| freq.per_year()), Some(4));
}

#[test]
fn order_sample_statuses_are_typed() {
    let orders: Vec<Order> = decode("orders", fixtures::ORDERS);
    let statuses: Vec<_> = orders.iter().map(|order| order.status).collect();

    assert_eq!(
        statuses,
        vec![Some(OrderStatus::Working), Some(OrderStatus::Filled)]
    );
}

// =============================================================================
// Drift Handling
// =============================================================================

#[test]
fn unknown_order_status_decodes_as_unknown() {
    let order: Order = serde_json::from_value(json!({
        "orderType": "LIMIT",
        "status": "SOMETHING_NEW",
        "orderLegCollection": []
    }))
    .expect("open enum");

    assert_eq!(order.status, Some(OrderStatus::Unknown));
    assert_eq!(order.order_type, Some(OrderType::Limit));
}

#[test]
fn invalid_dividend_frequency_is_rejected() {
    let body = json!({
        "AAPL": {
            "assetMainType": "EQUITY",
            "symbol": "AAPL",
            "fundamental": {"divFreq": 5}
        }
    });

    let error = serde_json::from_value::<QuoteResponse>(body).expect_err("5 is not a frequency");

    assert!(error.to_string().contains("dividend frequency"));
}

#[test]
fn quote_errors_list_invalid_symbols() {
    let body = json!({
        "AAPL": {"assetMainType": "EQUITY", "symbol": "AAPL"},
        "errors": {"invalidSymbols": ["NOPE"]}
    });

    let response: QuoteResponse = serde_json::from_value(body).expect("decodes");

    assert_eq!(response.quotes.len(), 1);
    assert_eq!(response.invalid_symbols(), ["NOPE"]);
}

// =============================================================================
// Candles and Orders
// =============================================================================

#[test]
fn candles_outside_their_range_are_rejected() {
    let candle = |open, high, low, close| Candle {
        open,
        high,
        low,
        close,
        volume: 10,
        datetime: 1_704_106_800_000,
    };

    assert!(candle(10.0, 11.0, 9.0, 10.5).validate().is_ok());
    assert_eq!(
        candle(10.0, 9.0, 11.0, 10.0).validate(),
        Err(ValidationError::InvalidCandleRange)
    );
    assert_eq!(
        candle(12.0, 11.0, 9.0, 10.0).validate(),
        Err(ValidationError::InvalidCandleBounds)
    );
    assert_eq!(
        candle(0.0, 11.0, 9.0, 10.0).validate(),
        Err(ValidationError::NonPositiveValue { field: "open" })
    );
}

#[test]
fn order_validation_catches_missing_prices_and_legs() {
    let stop = Order {
        order_type: Some(OrderType::Stop),
        ..Order::market(Instruction::Sell, "AAPL", 5.0)
    };
    assert_eq!(
        stop.validate(),
        Err(ValidationError::MissingOrderPrice {
            order_type: "STOP",
            field: "stopPrice",
        })
    );
    assert!(stop.with_stop_price(95.0).validate().is_ok());

    let no_legs = Order {
        order_leg_collection: Vec::new(),
        ..Order::market(Instruction::Buy, "AAPL", 1.0)
    };
    assert_eq!(no_legs.validate(), Err(ValidationError::OrderWithoutLegs));

    let zero_quantity = Order::market(Instruction::Buy, "AAPL", 0.0);
    assert_eq!(
        zero_quantity.validate(),
        Err(ValidationError::NonPositiveValue { field: "quantity" })
    );
}
