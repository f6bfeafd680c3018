use std::collections::BTreeMap;

use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};

use crate::{Symbol, ValidationError};

/// Top-level asset class reported by the market data API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssetMainType {
    Bond,
    Equity,
    Forex,
    Future,
    FutureOption,
    Index,
    MutualFund,
    Option,
    CashEquivalent,
    Currency,
    #[serde(other)]
    Unknown,
}

/// Sub-classification of equities and mutual funds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AssetSubType {
    Coe,
    Prf,
    Adr,
    Gdr,
    Cef,
    Etf,
    Etn,
    Uit,
    War,
    Rgt,
    Oef,
    Mmf,
    #[serde(other)]
    Unknown,
}

const EQUITY_SUBTYPES: &[AssetSubType] = &[
    AssetSubType::Coe,
    AssetSubType::Prf,
    AssetSubType::Adr,
    AssetSubType::Gdr,
    AssetSubType::Cef,
    AssetSubType::Etf,
    AssetSubType::Etn,
    AssetSubType::Uit,
    AssetSubType::War,
    AssetSubType::Rgt,
];

const MUTUAL_FUND_SUBTYPES: &[AssetSubType] =
    &[AssetSubType::Oef, AssetSubType::Cef, AssetSubType::Mmf];

impl AssetSubType {
    /// Subtypes Schwab documents for the given main type. Empty when the
    /// main type carries no subtype.
    pub fn valid_for(main: AssetMainType) -> &'static [AssetSubType] {
        match main {
            AssetMainType::Equity => EQUITY_SUBTYPES,
            AssetMainType::MutualFund => MUTUAL_FUND_SUBTYPES,
            _ => &[],
        }
    }

    pub fn is_valid_for(self, main: AssetMainType) -> bool {
        Self::valid_for(main).contains(&self)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Coe => "COE",
            Self::Prf => "PRF",
            Self::Adr => "ADR",
            Self::Gdr => "GDR",
            Self::Cef => "CEF",
            Self::Etf => "ETF",
            Self::Etn => "ETN",
            Self::Uit => "UIT",
            Self::War => "WAR",
            Self::Rgt => "RGT",
            Self::Oef => "OEF",
            Self::Mmf => "MMF",
            Self::Unknown => "UNKNOWN",
        }
    }
}

/// Dividend payments per year. Schwab only emits a fixed set of values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct DividendFrequency(u8);

impl DividendFrequency {
    pub const VALID: [u8; 8] = [0, 1, 2, 3, 4, 6, 11, 12];

    pub fn new(value: i64) -> Result<Self, ValidationError> {
        Self::VALID
            .iter()
            .copied()
            .find(|candidate| i64::from(*candidate) == value)
            .map(Self)
            .ok_or(ValidationError::InvalidDividendFrequency { value })
    }

    pub const fn per_year(self) -> u8 {
        self.0
    }
}

impl TryFrom<i64> for DividendFrequency {
    type Error = ValidationError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<DividendFrequency> for i64 {
    fn from(value: DividendFrequency) -> Self {
        i64::from(value.0)
    }
}

/// Response of `GET /quotes` and `GET /{symbol}/quotes`, keyed by symbol.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct QuoteResponse {
    pub quotes: BTreeMap<String, QuoteEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<QuoteErrors>,
}

impl QuoteResponse {
    pub fn get(&self, symbol: &Symbol) -> Option<&QuoteEntry> {
        self.quotes.get(symbol.as_str())
    }

    pub fn invalid_symbols(&self) -> &[String] {
        self.errors
            .as_ref()
            .map(|errors| errors.invalid_symbols.as_slice())
            .unwrap_or_default()
    }
}

impl<'de> Deserialize<'de> for QuoteResponse {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_map(QuoteResponseVisitor)
    }
}

/// Entries are decoded in place so error paths keep the symbol key.
struct QuoteResponseVisitor;

impl<'de> Visitor<'de> for QuoteResponseVisitor {
    type Value = QuoteResponse;

    fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("a map of symbol to quote")
    }

    fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut response = QuoteResponse::default();
        while let Some(key) = map.next_key::<String>()? {
            if key == "errors" {
                response.errors = Some(map.next_value()?);
            } else {
                let entry = map.next_value::<QuoteEntry>()?;
                response.quotes.insert(key, entry);
            }
        }
        Ok(response)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QuoteErrors {
    pub invalid_symbols: Vec<String>,
    pub invalid_cusips: Vec<String>,
    pub invalid_ssids: Vec<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteEntry {
    pub asset_main_type: AssetMainType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_sub_type: Option<AssetSubType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quote_type: Option<String>,
    #[serde(default)]
    pub realtime: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssid: Option<u64>,
    pub symbol: Symbol,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quote: Option<QuoteDetail>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fundamental: Option<Fundamental>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<Reference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regular: Option<RegularMarket>,
}

/// Top-of-book and session statistics.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QuoteDetail {
    #[serde(rename = "52WeekHigh")]
    pub week_52_high: Option<f64>,
    #[serde(rename = "52WeekLow")]
    pub week_52_low: Option<f64>,
    pub ask_price: Option<f64>,
    pub ask_size: Option<u64>,
    pub ask_time: Option<i64>,
    pub bid_price: Option<f64>,
    pub bid_size: Option<u64>,
    pub bid_time: Option<i64>,
    pub close_price: Option<f64>,
    pub high_price: Option<f64>,
    pub last_price: Option<f64>,
    pub last_size: Option<u64>,
    pub low_price: Option<f64>,
    pub mark: Option<f64>,
    pub mark_change: Option<f64>,
    pub mark_percent_change: Option<f64>,
    pub net_change: Option<f64>,
    pub net_percent_change: Option<f64>,
    pub open_price: Option<f64>,
    pub quote_time: Option<i64>,
    pub trade_time: Option<i64>,
    pub total_volume: Option<u64>,
    pub security_status: Option<String>,
    pub volatility: Option<f64>,
    #[serde(rename = "nAV")]
    pub nav: Option<f64>,
}

impl QuoteDetail {
    pub fn spread(&self) -> Option<f64> {
        match (self.bid_price, self.ask_price) {
            (Some(bid), Some(ask)) => Some(ask - bid),
            _ => None,
        }
    }

    pub fn mid(&self) -> Option<f64> {
        match (self.bid_price, self.ask_price) {
            (Some(bid), Some(ask)) => Some((ask + bid) / 2.0),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Fundamental {
    pub avg10_days_volume: Option<f64>,
    pub avg1_year_volume: Option<f64>,
    pub declaration_date: Option<String>,
    pub div_amount: Option<f64>,
    pub div_ex_date: Option<String>,
    pub div_freq: Option<DividendFrequency>,
    pub div_pay_amount: Option<f64>,
    pub div_pay_date: Option<String>,
    pub div_yield: Option<f64>,
    pub eps: Option<f64>,
    pub fund_leverage_factor: Option<f64>,
    pub last_earnings_date: Option<String>,
    pub next_div_ex_date: Option<String>,
    pub next_div_pay_date: Option<String>,
    pub pe_ratio: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Reference {
    pub cusip: Option<String>,
    pub description: Option<String>,
    pub exchange: Option<String>,
    pub exchange_name: Option<String>,
    pub is_hard_to_borrow: Option<bool>,
    pub is_shortable: Option<bool>,
    pub htb_rate: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RegularMarket {
    pub regular_market_last_price: Option<f64>,
    pub regular_market_last_size: Option<u64>,
    pub regular_market_net_change: Option<f64>,
    pub regular_market_percent_change: Option<f64>,
    pub regular_market_trade_time: Option<i64>,
}
