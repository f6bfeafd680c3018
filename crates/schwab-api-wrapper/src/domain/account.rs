use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Pairs a plain account number with the opaque hash used in trader URLs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountNumberHash {
    pub account_number: String,
    pub hash_value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountType {
    Cash,
    Margin,
    #[serde(other)]
    Unknown,
}

/// Asset type used on instruments inside positions, orders and
/// transactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssetType {
    Equity,
    Option,
    Index,
    MutualFund,
    CashEquivalent,
    FixedIncome,
    Currency,
    CollectiveInvestment,
    Future,
    Forex,
    Product,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instrument {
    pub asset_type: AssetType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cusip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instrument_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub net_change: Option<f64>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub put_call: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub underlying_symbol: Option<String>,
}

impl Instrument {
    pub fn equity(symbol: impl Into<String>) -> Self {
        Self {
            asset_type: AssetType::Equity,
            cusip: None,
            symbol: Some(symbol.into()),
            description: None,
            instrument_id: None,
            net_change: None,
            kind: None,
            put_call: None,
            underlying_symbol: None,
        }
    }
}

/// Response item of `GET /accounts` and `GET /accounts/{hash}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub securities_account: SecuritiesAccount,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecuritiesAccount {
    #[serde(rename = "type")]
    pub account_type: AccountType,
    pub account_number: String,
    #[serde(default)]
    pub round_trips: u32,
    #[serde(default)]
    pub is_day_trader: bool,
    #[serde(default)]
    pub is_closing_only_restricted: bool,
    #[serde(default)]
    pub pfcb_flag: bool,
    #[serde(default)]
    pub positions: Vec<Position>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_balances: Option<Balances>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_balances: Option<Balances>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub projected_balances: Option<Balances>,
}

impl SecuritiesAccount {
    /// Sum of position market values.
    pub fn positions_market_value(&self) -> f64 {
        self.positions
            .iter()
            .filter_map(|position| position.market_value)
            .sum()
    }

    pub fn position(&self, symbol: &str) -> Option<&Position> {
        self.positions
            .iter()
            .find(|position| position.instrument.symbol.as_deref() == Some(symbol))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    #[serde(default)]
    pub short_quantity: f64,
    #[serde(default)]
    pub long_quantity: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub average_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub market_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_day_profit_loss: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_day_profit_loss_percentage: Option<f64>,
    pub instrument: Instrument,
}

impl Position {
    pub fn net_quantity(&self) -> f64 {
        self.long_quantity - self.short_quantity
    }
}

/// Balance block. The commonly used figures are typed; everything else
/// is kept in `other` because the field set differs between cash and
/// margin accounts.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Balances {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cash_balance: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cash_available_for_trading: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buying_power: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub equity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub liquidation_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub long_market_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short_market_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub money_market_fund: Option<f64>,
    #[serde(flatten)]
    pub other: BTreeMap<String, serde_json::Value>,
}
