//! # Domain Models
//!
//! Typed views of the Schwab Trader and Market Data payloads.
//!
//! ## Models
//!
//! | Type | Description |
//! |------|-------------|
//! | [`QuoteResponse`] | Quotes keyed by symbol plus per-symbol errors |
//! | [`PriceHistory`] | Candles for a symbol |
//! | [`OptionChain`] | Calls and puts by expiration and strike |
//! | [`MarketHours`] | Session hours by market and product |
//! | [`Account`] | Balances and positions |
//! | [`Order`] | Order request and response body |
//! | [`Transaction`] | Account activity entry |
//! | [`UserPreference`] | Account nicknames and streamer details |
//! | [`Symbol`] | Validated symbol |
//! | [`UtcDateTime`] | UTC timestamp |
//!
//! ## Decoding rules
//!
//! Field names follow the API's camelCase. Fields Schwab omits for some
//! asset types are `Option`. Enum sets Schwab documents as open decode
//! unknown values to `Unknown`; closed sets such as dividend frequency and
//! transaction type reject unknown values so a drifted payload surfaces as
//! a decode error instead of silently wrong data.
//!
//! ```rust
//! use schwab_api_wrapper::domain::QuoteResponse;
//!
//! let body = r#"{"AAPL": {"assetMainType": "EQUITY", "symbol": "AAPL",
//!                "quote": {"bidPrice": 99.5, "askPrice": 100.5}}}"#;
//! let response: QuoteResponse = serde_json::from_str(body).unwrap();
//! assert_eq!(response.quotes["AAPL"].quote.as_ref().unwrap().mid(), Some(100.0));
//! ```

mod account;
mod market;
mod order;
mod preference;
mod quote;
mod symbol;
mod timestamp;
mod transaction;

pub use account::{
    Account, AccountNumberHash, AccountType, AssetType, Balances, Instrument, Position,
    SecuritiesAccount,
};
pub use market::{
    Candle, Expiration, ExpirationChain, Hours, InstrumentInfo, InstrumentsResponse, MarketHours,
    Mover, MoversResponse, OptionChain, OptionContract, PriceHistory, SessionWindow, StrikeMap,
};
pub use order::{
    Instruction, Order, OrderDuration, OrderLeg, OrderPreview, OrderStatus, OrderStrategyType,
    OrderType, OrderValidationDetail, OrderValidationResult, PositionEffect, Session,
};
pub use preference::{Offer, PreferenceAccount, StreamerInfo, UserPreference};
pub use quote::{
    AssetMainType, AssetSubType, DividendFrequency, Fundamental, QuoteDetail, QuoteEntry,
    QuoteErrors, QuoteResponse, Reference, RegularMarket,
};
pub use symbol::Symbol;
pub use timestamp::{format_date, parse_date, UtcDateTime};
pub use transaction::{Transaction, TransactionType, TransferItem};
