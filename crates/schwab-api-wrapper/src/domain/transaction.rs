use serde::{Deserialize, Serialize};

use crate::domain::account::Instrument;
use crate::domain::order::PositionEffect;
use crate::UtcDateTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    Trade,
    ReceiveAndDeliver,
    DividendOrInterest,
    AchReceipt,
    AchDisbursement,
    CashReceipt,
    CashDisbursement,
    ElectronicFund,
    WireOut,
    WireIn,
    Journal,
    Memorandum,
    MarginCall,
    MoneyMarket,
    SmaAdjustment,
}

impl TransactionType {
    pub const ALL: [TransactionType; 15] = [
        Self::Trade,
        Self::ReceiveAndDeliver,
        Self::DividendOrInterest,
        Self::AchReceipt,
        Self::AchDisbursement,
        Self::CashReceipt,
        Self::CashDisbursement,
        Self::ElectronicFund,
        Self::WireOut,
        Self::WireIn,
        Self::Journal,
        Self::Memorandum,
        Self::MarginCall,
        Self::MoneyMarket,
        Self::SmaAdjustment,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Trade => "TRADE",
            Self::ReceiveAndDeliver => "RECEIVE_AND_DELIVER",
            Self::DividendOrInterest => "DIVIDEND_OR_INTEREST",
            Self::AchReceipt => "ACH_RECEIPT",
            Self::AchDisbursement => "ACH_DISBURSEMENT",
            Self::CashReceipt => "CASH_RECEIPT",
            Self::CashDisbursement => "CASH_DISBURSEMENT",
            Self::ElectronicFund => "ELECTRONIC_FUND",
            Self::WireOut => "WIRE_OUT",
            Self::WireIn => "WIRE_IN",
            Self::Journal => "JOURNAL",
            Self::Memorandum => "MEMORANDUM",
            Self::MarginCall => "MARGIN_CALL",
            Self::MoneyMarket => "MONEY_MARKET",
            Self::SmaAdjustment => "SMA_ADJUSTMENT",
        }
    }

    /// Case-insensitive lookup of the wire name.
    pub fn parse(input: &str) -> Option<Self> {
        let wanted = input.trim().to_ascii_uppercase();
        Self::ALL.into_iter().find(|kind| kind.as_str() == wanted)
    }
}

/// Entry of `GET /accounts/{hash}/transactions`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub activity_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<UtcDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_number: Option<String>,
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_account: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trade_date: Option<UtcDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settlement_date: Option<UtcDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_id: Option<i64>,
    #[serde(default)]
    pub net_amount: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity_type: Option<String>,
    #[serde(default)]
    pub transfer_items: Vec<TransferItem>,
}

impl Transaction {
    /// Total of the fee legs (commission, SEC fee, ...).
    pub fn fees(&self) -> f64 {
        self.transfer_items
            .iter()
            .filter(|item| item.fee_type.is_some())
            .map(|item| item.cost)
            .sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instrument: Option<Instrument>,
    #[serde(default)]
    pub amount: f64,
    #[serde(default)]
    pub cost: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fee_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position_effect: Option<PositionEffect>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_wire_names_case_insensitively() {
        assert_eq!(TransactionType::parse("trade"), Some(TransactionType::Trade));
        assert_eq!(
            TransactionType::parse(" wire_in "),
            Some(TransactionType::WireIn)
        );
        assert_eq!(TransactionType::parse("UNKNOWN"), None);
    }

    #[test]
    fn decodes_trade_with_fee_legs() {
        let body = r#"{
            "activityId": 100, "time": "2024-01-01T12:00:00+0000",
            "accountNumber": "DEMO123456", "type": "TRADE", "status": "VALID",
            "subAccount": "CASH", "tradeDate": "2024-01-01T12:00:00+0000",
            "netAmount": -100.0, "activityType": "EXECUTION",
            "transferItems": [
                {"instrument": {"assetType": "CURRENCY", "symbol": "CURRENCY_USD"},
                 "amount": 0.0, "cost": -0.5, "feeType": "COMMISSION"},
                {"instrument": {"assetType": "EQUITY", "cusip": "000000000", "symbol": "AAPL"},
                 "amount": 100.0, "cost": -100.0, "price": 100.0, "positionEffect": "OPENING"}
            ]
        }"#;

        let transaction: Transaction = serde_json::from_str(body).expect("must decode");
        assert_eq!(transaction.transaction_type, TransactionType::Trade);
        assert_eq!(transaction.fees(), -0.5);
        assert_eq!(
            transaction.transfer_items[1].position_effect,
            Some(PositionEffect::Opening)
        );
        assert!(transaction.settlement_date.is_none());
    }
}
