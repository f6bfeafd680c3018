use serde::{Deserialize, Serialize};

use crate::domain::account::Instrument;
use crate::{UtcDateTime, ValidationError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Session {
    Normal,
    Am,
    Pm,
    Seamless,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderDuration {
    Day,
    GoodTillCancel,
    FillOrKill,
    ImmediateOrCancel,
    EndOfWeek,
    EndOfMonth,
    NextEndOfMonth,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderType {
    Market,
    Limit,
    Stop,
    StopLimit,
    TrailingStop,
    Cabinet,
    NonMarketable,
    MarketOnClose,
    Exercise,
    TrailingStopLimit,
    NetDebit,
    NetCredit,
    NetZero,
    LimitOnClose,
    #[serde(other)]
    Unknown,
}

impl OrderType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Market => "MARKET",
            Self::Limit => "LIMIT",
            Self::Stop => "STOP",
            Self::StopLimit => "STOP_LIMIT",
            Self::TrailingStop => "TRAILING_STOP",
            Self::Cabinet => "CABINET",
            Self::NonMarketable => "NON_MARKETABLE",
            Self::MarketOnClose => "MARKET_ON_CLOSE",
            Self::Exercise => "EXERCISE",
            Self::TrailingStopLimit => "TRAILING_STOP_LIMIT",
            Self::NetDebit => "NET_DEBIT",
            Self::NetCredit => "NET_CREDIT",
            Self::NetZero => "NET_ZERO",
            Self::LimitOnClose => "LIMIT_ON_CLOSE",
            Self::Unknown => "UNKNOWN",
        }
    }

    const fn requires_price(self) -> bool {
        matches!(
            self,
            Self::Limit | Self::StopLimit | Self::NetDebit | Self::NetCredit | Self::LimitOnClose
        )
    }

    const fn requires_stop_price(self) -> bool {
        matches!(self, Self::Stop | Self::StopLimit)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Instruction {
    Buy,
    Sell,
    BuyToCover,
    SellShort,
    BuyToOpen,
    BuyToClose,
    SellToOpen,
    SellToClose,
    Exchange,
    SellShortExempt,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PositionEffect {
    Opening,
    Closing,
    Automatic,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStrategyType {
    Single,
    Cancel,
    Recall,
    Pair,
    Flatten,
    TwoDaySwap,
    BlastAll,
    Oco,
    Trigger,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    AwaitingParentOrder,
    AwaitingCondition,
    AwaitingStopCondition,
    AwaitingManualReview,
    Accepted,
    AwaitingUrOut,
    PendingActivation,
    Queued,
    Working,
    Rejected,
    PendingCancel,
    Canceled,
    PendingReplace,
    Replaced,
    Filled,
    Expired,
    New,
    AwaitingReleaseTime,
    PendingAcknowledgement,
    PendingRecall,
    #[serde(other)]
    Unknown,
}

impl OrderStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AwaitingParentOrder => "AWAITING_PARENT_ORDER",
            Self::AwaitingCondition => "AWAITING_CONDITION",
            Self::AwaitingStopCondition => "AWAITING_STOP_CONDITION",
            Self::AwaitingManualReview => "AWAITING_MANUAL_REVIEW",
            Self::Accepted => "ACCEPTED",
            Self::AwaitingUrOut => "AWAITING_UR_OUT",
            Self::PendingActivation => "PENDING_ACTIVATION",
            Self::Queued => "QUEUED",
            Self::Working => "WORKING",
            Self::Rejected => "REJECTED",
            Self::PendingCancel => "PENDING_CANCEL",
            Self::Canceled => "CANCELED",
            Self::PendingReplace => "PENDING_REPLACE",
            Self::Replaced => "REPLACED",
            Self::Filled => "FILLED",
            Self::Expired => "EXPIRED",
            Self::New => "NEW",
            Self::AwaitingReleaseTime => "AWAITING_RELEASE_TIME",
            Self::PendingAcknowledgement => "PENDING_ACKNOWLEDGEMENT",
            Self::PendingRecall => "PENDING_RECALL",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// Terminal states can no longer be replaced or canceled.
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Rejected | Self::Canceled | Self::Replaced | Self::Filled | Self::Expired
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLeg {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_leg_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leg_id: Option<i64>,
    pub instrument: Instrument,
    pub instruction: Instruction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position_effect: Option<PositionEffect>,
    pub quantity: f64,
}

/// Order as submitted to and returned by the trader API. Request-only
/// and response-only fields are both optional.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<Session>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<OrderDuration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_type: Option<OrderType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filled_quantity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remaining_quantity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_strategy_type: Option<OrderStrategyType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complex_order_strategy_type: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub order_leg_collection: Vec<OrderLeg>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<OrderStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entered_time: Option<UtcDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub close_time: Option<UtcDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_number: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancelable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub editable: Option<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub child_order_strategies: Vec<Order>,
}

impl Order {
    /// Single-leg equity market order for the regular session, good for the day.
    pub fn market(instruction: Instruction, symbol: impl Into<String>, quantity: f64) -> Self {
        Self::single_leg(OrderType::Market, instruction, symbol, quantity)
    }

    /// Single-leg equity limit order for the regular session, good for the day.
    pub fn limit(
        instruction: Instruction,
        symbol: impl Into<String>,
        quantity: f64,
        price: f64,
    ) -> Self {
        Self {
            price: Some(price),
            ..Self::single_leg(OrderType::Limit, instruction, symbol, quantity)
        }
    }

    fn single_leg(
        order_type: OrderType,
        instruction: Instruction,
        symbol: impl Into<String>,
        quantity: f64,
    ) -> Self {
        Self {
            session: Some(Session::Normal),
            duration: Some(OrderDuration::Day),
            order_type: Some(order_type),
            order_strategy_type: Some(OrderStrategyType::Single),
            order_leg_collection: vec![OrderLeg {
                order_leg_type: None,
                leg_id: None,
                instrument: Instrument::equity(symbol),
                instruction,
                position_effect: None,
                quantity,
            }],
            ..Self::default()
        }
    }

    pub fn with_duration(mut self, duration: OrderDuration) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn with_session(mut self, session: Session) -> Self {
        self.session = Some(session);
        self
    }

    pub fn with_stop_price(mut self, stop_price: f64) -> Self {
        self.stop_price = Some(stop_price);
        self
    }

    /// Checks the fields the trader API rejects outright. Child orders of
    /// trigger/OCO strategies are validated recursively.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let is_container = matches!(
            self.order_strategy_type,
            Some(OrderStrategyType::Oco) | Some(OrderStrategyType::Trigger)
        ) && self.order_leg_collection.is_empty();

        if !is_container {
            if self.order_leg_collection.is_empty() {
                return Err(ValidationError::OrderWithoutLegs);
            }

            for leg in &self.order_leg_collection {
                if !leg.quantity.is_finite() || leg.quantity <= 0.0 {
                    return Err(ValidationError::NonPositiveValue { field: "quantity" });
                }
            }

            if let Some(order_type) = self.order_type {
                if order_type.requires_price() {
                    positive_price(order_type, "price", self.price)?;
                }
                if order_type.requires_stop_price() {
                    positive_price(order_type, "stopPrice", self.stop_price)?;
                }
            }
        }

        self.child_order_strategies
            .iter()
            .try_for_each(Order::validate)
    }
}

fn positive_price(
    order_type: OrderType,
    field: &'static str,
    value: Option<f64>,
) -> Result<(), ValidationError> {
    match value {
        None => Err(ValidationError::MissingOrderPrice {
            order_type: order_type.as_str(),
            field,
        }),
        Some(price) if !price.is_finite() || price <= 0.0 => {
            Err(ValidationError::NonPositiveValue { field })
        }
        Some(_) => Ok(()),
    }
}

/// Response of `POST /accounts/{hash}/previewOrder`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OrderPreview {
    pub order_id: Option<i64>,
    pub order_strategy: Option<serde_json::Value>,
    pub order_validation_result: Option<OrderValidationResult>,
}

impl OrderPreview {
    pub fn is_rejected(&self) -> bool {
        self.order_validation_result
            .as_ref()
            .is_some_and(|result| !result.rejects.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OrderValidationResult {
    pub alerts: Vec<OrderValidationDetail>,
    pub accepts: Vec<OrderValidationDetail>,
    pub rejects: Vec<OrderValidationDetail>,
    pub reviews: Vec<OrderValidationDetail>,
    pub warns: Vec<OrderValidationDetail>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OrderValidationDetail {
    pub validation_rule_name: Option<String>,
    pub message: Option<String>,
    pub activity_message: Option<String>,
    pub original_severity: Option<String>,
}
