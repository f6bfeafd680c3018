use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::quote::{AssetMainType, Fundamental};
use crate::{UtcDateTime, ValidationError};

/// Response of `GET /pricehistory`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceHistory {
    pub symbol: String,
    #[serde(default)]
    pub empty: bool,
    #[serde(default)]
    pub candles: Vec<Candle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_close: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_close_date: Option<i64>,
}

impl PriceHistory {
    /// Checks every candle's OHLC invariant.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.candles.iter().try_for_each(Candle::validate)
    }
}

/// OHLCV candle; `datetime` is epoch milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
    pub datetime: i64,
}

impl Candle {
    pub fn validate(&self) -> Result<(), ValidationError> {
        for (field, value) in [
            ("open", self.open),
            ("high", self.high),
            ("low", self.low),
            ("close", self.close),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(ValidationError::NonPositiveValue { field });
            }
        }

        if self.high < self.low {
            return Err(ValidationError::InvalidCandleRange);
        }

        if self.open < self.low
            || self.open > self.high
            || self.close < self.low
            || self.close > self.high
        {
            return Err(ValidationError::InvalidCandleBounds);
        }

        Ok(())
    }

    pub fn timestamp(&self) -> Result<UtcDateTime, ValidationError> {
        UtcDateTime::from_unix_millis(self.datetime)
    }
}

/// Strike price (as the API's string key) to contracts at that strike.
pub type StrikeMap = BTreeMap<String, Vec<OptionContract>>;

/// Response of `GET /chains`. Expiration keys look like `2024-01-19:5`
/// (date and days to expiration).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionChain {
    pub symbol: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub underlying_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volatility: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number_of_contracts: Option<u32>,
    #[serde(default)]
    pub call_exp_date_map: BTreeMap<String, StrikeMap>,
    #[serde(default)]
    pub put_exp_date_map: BTreeMap<String, StrikeMap>,
}

impl OptionChain {
    pub fn contract_count(&self) -> usize {
        self.call_exp_date_map
            .values()
            .chain(self.put_exp_date_map.values())
            .flat_map(|strikes| strikes.values())
            .map(Vec::len)
            .sum()
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OptionContract {
    pub put_call: Option<String>,
    pub symbol: Option<String>,
    pub description: Option<String>,
    pub bid: Option<f64>,
    pub ask: Option<f64>,
    pub last: Option<f64>,
    pub mark: Option<f64>,
    pub bid_size: Option<u64>,
    pub ask_size: Option<u64>,
    pub total_volume: Option<u64>,
    pub open_interest: Option<u64>,
    pub volatility: Option<f64>,
    pub delta: Option<f64>,
    pub gamma: Option<f64>,
    pub theta: Option<f64>,
    pub vega: Option<f64>,
    pub rho: Option<f64>,
    pub strike_price: Option<f64>,
    pub expiration_date: Option<String>,
    pub days_to_expiration: Option<i32>,
    pub in_the_money: Option<bool>,
    pub multiplier: Option<f64>,
}

/// Response of `GET /expirationchain`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExpirationChain {
    pub expiration_list: Vec<Expiration>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Expiration {
    pub expiration_date: String,
    pub days_to_expiration: i32,
    pub expiration_type: Option<String>,
    pub settlement_type: Option<String>,
    pub option_roots: Option<String>,
    pub standard: Option<bool>,
}

/// Response of `GET /movers/{index}`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MoversResponse {
    pub screeners: Vec<Mover>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Mover {
    pub symbol: String,
    pub description: Option<String>,
    pub last_price: Option<f64>,
    pub net_change: Option<f64>,
    pub net_percent_change: Option<f64>,
    pub volume: Option<u64>,
    pub total_volume: Option<u64>,
    pub trades: Option<u64>,
}

/// Response of `GET /markets`: market id (`equity`, `option`, ...) to
/// product code to hours.
pub type MarketHours = BTreeMap<String, BTreeMap<String, Hours>>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hours {
    pub date: String,
    pub market_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exchange: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub product: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_name: Option<String>,
    pub is_open: bool,
    #[serde(default)]
    pub session_hours: BTreeMap<String, Vec<SessionWindow>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionWindow {
    pub start: String,
    pub end: String,
}

/// Response of `GET /instruments` and `GET /instruments/{cusip}`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InstrumentsResponse {
    pub instruments: Vec<InstrumentInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstrumentInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cusip: Option<String>,
    pub symbol: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exchange: Option<String>,
    pub asset_type: AssetMainType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fundamental: Option<Fundamental>,
}
