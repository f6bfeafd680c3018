//! Request parameters and filters, validated before anything is sent.

use time::{Date, Duration};

use crate::domain::{format_date, OrderStatus, TransactionType};
use crate::{Symbol, UtcDateTime, ValidationError};

/// Schwab rejects order and transaction queries spanning more than a
/// calendar year.
pub const MAX_QUERY_RANGE_YEARS: i32 = 1;

/// Upper bound of `maxResults` on the orders endpoints.
pub const MAX_ORDER_RESULTS: u32 = 3_000;

macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $field:literal {
            $($variant:ident => $wire:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub const fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $wire),+
                }
            }

            /// Case-insensitive lookup of the wire value.
            pub fn parse(input: &str) -> Result<Self, ValidationError> {
                let wanted = input.trim();
                Self::ALL
                    .iter()
                    .copied()
                    .find(|candidate| candidate.as_str().eq_ignore_ascii_case(wanted))
                    .ok_or_else(|| ValidationError::InvalidChoice {
                        field: $field,
                        value: wanted.to_owned(),
                        expected: concat!($($wire, " "),+),
                    })
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

wire_enum! {
    /// Blocks requested from `/quotes`.
    QuoteField, "field" {
        Quote => "quote",
        Fundamental => "fundamental",
        Extended => "extended",
        Reference => "reference",
        Regular => "regular",
    }
}

wire_enum! {
    ContractType, "contract type" {
        Call => "CALL",
        Put => "PUT",
        All => "ALL",
    }
}

wire_enum! {
    PeriodType, "period type" {
        Day => "day",
        Month => "month",
        Year => "year",
        Ytd => "ytd",
    }
}

wire_enum! {
    FrequencyType, "frequency type" {
        Minute => "minute",
        Daily => "daily",
        Weekly => "weekly",
        Monthly => "monthly",
    }
}

impl PeriodType {
    /// Frequency types the price history endpoint accepts with this period.
    pub const fn allowed_frequencies(self) -> &'static [FrequencyType] {
        match self {
            Self::Day => &[FrequencyType::Minute],
            Self::Month => &[FrequencyType::Daily, FrequencyType::Weekly],
            Self::Year => &[
                FrequencyType::Daily,
                FrequencyType::Weekly,
                FrequencyType::Monthly,
            ],
            Self::Ytd => &[FrequencyType::Daily, FrequencyType::Weekly],
        }
    }
}

wire_enum! {
    MoverIndex, "index" {
        Dji => "$DJI",
        Compx => "$COMPX",
        Spx => "$SPX",
        Nyse => "NYSE",
        Nasdaq => "NASDAQ",
        Otcbb => "OTCBB",
        IndexAll => "INDEX_ALL",
        EquityAll => "EQUITY_ALL",
        OptionAll => "OPTION_ALL",
        OptionPut => "OPTION_PUT",
        OptionCall => "OPTION_CALL",
    }
}

wire_enum! {
    MoverSort, "sort" {
        Volume => "VOLUME",
        Trades => "TRADES",
        PercentChangeUp => "PERCENT_CHANGE_UP",
        PercentChangeDown => "PERCENT_CHANGE_DOWN",
    }
}

wire_enum! {
    MarketId, "market" {
        Equity => "equity",
        Option => "option",
        Bond => "bond",
        Future => "future",
        Forex => "forex",
    }
}

wire_enum! {
    Projection, "projection" {
        SymbolSearch => "symbol-search",
        SymbolRegex => "symbol-regex",
        DescSearch => "desc-search",
        DescRegex => "desc-regex",
        Search => "search",
        Fundamental => "fundamental",
    }
}

/// Minute granularity accepted by the movers endpoint.
pub const MOVER_FREQUENCIES: [u32; 6] = [0, 1, 5, 10, 30, 60];

pub(crate) fn join<T, F>(items: &[T], render: F) -> String
where
    F: Fn(&T) -> &str,
{
    items.iter().map(render).collect::<Vec<_>>().join(",")
}

fn check_range(
    from: UtcDateTime,
    to: UtcDateTime,
    max_years: Option<i32>,
) -> Result<(), ValidationError> {
    if from > to {
        return Err(ValidationError::InvalidDateRange {
            from: from.format_rfc3339(),
            to: to.format_rfc3339(),
        });
    }
    if let Some(max_years) = max_years {
        let within = from
            .checked_add_years(max_years)
            .map_or(true, |limit| to <= limit);
        if !within {
            return Err(ValidationError::DateRangeTooWide { max_years });
        }
    }
    Ok(())
}

/// Query for `GET /accounts/{hash}/orders` and `GET /orders`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderFilter {
    pub from: UtcDateTime,
    pub to: UtcDateTime,
    pub max_results: Option<u32>,
    pub status: Option<OrderStatus>,
}

impl OrderFilter {
    pub fn new(from: UtcDateTime, to: UtcDateTime) -> Self {
        Self {
            from,
            to,
            max_results: None,
            status: None,
        }
    }

    /// Orders entered in the last `days` days, ending now.
    pub fn last_days(days: i64) -> Self {
        let to = UtcDateTime::now();
        let from = to.checked_sub(Duration::days(days)).unwrap_or(to);
        Self::new(from, to)
    }

    pub fn with_max_results(mut self, max_results: u32) -> Self {
        self.max_results = Some(max_results);
        self
    }

    pub fn with_status(mut self, status: OrderStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        check_range(self.from, self.to, Some(MAX_QUERY_RANGE_YEARS))?;
        if let Some(value) = self.max_results {
            if value == 0 || value > MAX_ORDER_RESULTS {
                return Err(ValidationError::MaxResultsOutOfRange {
                    value,
                    max: MAX_ORDER_RESULTS,
                });
            }
        }
        Ok(())
    }

    pub(crate) fn query(&self) -> Vec<(&'static str, String)> {
        let mut query = vec![
            ("fromEnteredTime", self.from.format_request()),
            ("toEnteredTime", self.to.format_request()),
        ];
        if let Some(max_results) = self.max_results {
            query.push(("maxResults", max_results.to_string()));
        }
        if let Some(status) = self.status {
            query.push(("status", status.as_str().to_owned()));
        }
        query
    }
}

/// Query for `GET /accounts/{hash}/transactions`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionFilter {
    pub from: UtcDateTime,
    pub to: UtcDateTime,
    pub types: Vec<TransactionType>,
    pub symbol: Option<Symbol>,
}

impl TransactionFilter {
    pub fn new(from: UtcDateTime, to: UtcDateTime, types: Vec<TransactionType>) -> Self {
        Self {
            from,
            to,
            types,
            symbol: None,
        }
    }

    /// Every transaction type over the last `days` days.
    pub fn last_days(days: i64) -> Self {
        let to = UtcDateTime::now();
        let from = to.checked_sub(Duration::days(days)).unwrap_or(to);
        Self::new(from, to, TransactionType::ALL.to_vec())
    }

    pub fn with_symbol(mut self, symbol: Symbol) -> Self {
        self.symbol = Some(symbol);
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        check_range(self.from, self.to, Some(MAX_QUERY_RANGE_YEARS))?;
        if self.types.is_empty() {
            return Err(ValidationError::EmptyTransactionTypes);
        }
        Ok(())
    }

    pub(crate) fn query(&self) -> Vec<(&'static str, String)> {
        let mut query = vec![
            ("startDate", self.from.format_request()),
            ("endDate", self.to.format_request()),
            ("types", join(&self.types, |kind| kind.as_str())),
        ];
        if let Some(symbol) = &self.symbol {
            query.push(("symbol", symbol.as_str().to_owned()));
        }
        query
    }
}

/// Query for `GET /pricehistory`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceHistoryParams {
    pub symbol: Symbol,
    pub period_type: Option<PeriodType>,
    pub period: Option<u32>,
    pub frequency_type: Option<FrequencyType>,
    pub frequency: Option<u32>,
    pub start_date: Option<UtcDateTime>,
    pub end_date: Option<UtcDateTime>,
    pub need_extended_hours_data: Option<bool>,
    pub need_previous_close: Option<bool>,
}

impl PriceHistoryParams {
    pub fn new(symbol: Symbol) -> Self {
        Self {
            symbol,
            period_type: None,
            period: None,
            frequency_type: None,
            frequency: None,
            start_date: None,
            end_date: None,
            need_extended_hours_data: None,
            need_previous_close: None,
        }
    }

    pub fn with_period(mut self, period_type: PeriodType, period: Option<u32>) -> Self {
        self.period_type = Some(period_type);
        self.period = period;
        self
    }

    pub fn with_frequency(mut self, frequency_type: FrequencyType, frequency: Option<u32>) -> Self {
        self.frequency_type = Some(frequency_type);
        self.frequency = frequency;
        self
    }

    pub fn with_range(mut self, start: UtcDateTime, end: UtcDateTime) -> Self {
        self.start_date = Some(start);
        self.end_date = Some(end);
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if let (Some(period_type), Some(frequency_type)) = (self.period_type, self.frequency_type) {
            if !period_type.allowed_frequencies().contains(&frequency_type) {
                return Err(ValidationError::InvalidPriceHistory {
                    period_type: period_type.as_str(),
                    frequency_type: frequency_type.as_str(),
                });
            }
        }
        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            check_range(start, end, None)?;
        }
        for (field, value) in [("period", self.period), ("frequency", self.frequency)] {
            if value == Some(0) {
                return Err(ValidationError::NonPositiveValue { field });
            }
        }
        Ok(())
    }

    pub(crate) fn query(&self) -> Vec<(&'static str, String)> {
        let mut query = vec![("symbol", self.symbol.as_str().to_owned())];
        let mut push = |name: &'static str, value: Option<String>| {
            if let Some(value) = value {
                query.push((name, value));
            }
        };
        push("periodType", self.period_type.map(|v| v.as_str().to_owned()));
        push("period", self.period.map(|v| v.to_string()));
        push(
            "frequencyType",
            self.frequency_type.map(|v| v.as_str().to_owned()),
        );
        push("frequency", self.frequency.map(|v| v.to_string()));
        push(
            "startDate",
            self.start_date
                .map(|v| (v.into_inner().unix_timestamp_nanos() / 1_000_000).to_string()),
        );
        push(
            "endDate",
            self.end_date
                .map(|v| (v.into_inner().unix_timestamp_nanos() / 1_000_000).to_string()),
        );
        push(
            "needExtendedHoursData",
            self.need_extended_hours_data.map(|v| v.to_string()),
        );
        push(
            "needPreviousClose",
            self.need_previous_close.map(|v| v.to_string()),
        );
        query
    }
}

/// Query for `GET /chains`.
#[derive(Debug, Clone, PartialEq)]
pub struct OptionChainParams {
    pub symbol: Symbol,
    pub contract_type: Option<ContractType>,
    pub strike_count: Option<u32>,
    pub include_underlying_quote: Option<bool>,
    pub strike: Option<f64>,
    pub from_date: Option<Date>,
    pub to_date: Option<Date>,
}

impl OptionChainParams {
    pub fn new(symbol: Symbol) -> Self {
        Self {
            symbol,
            contract_type: None,
            strike_count: None,
            include_underlying_quote: None,
            strike: None,
            from_date: None,
            to_date: None,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.strike_count == Some(0) {
            return Err(ValidationError::NonPositiveValue {
                field: "strikeCount",
            });
        }
        if let Some(strike) = self.strike {
            if !strike.is_finite() || strike <= 0.0 {
                return Err(ValidationError::NonPositiveValue { field: "strike" });
            }
        }
        if let (Some(from), Some(to)) = (self.from_date, self.to_date) {
            if from > to {
                return Err(ValidationError::InvalidDateRange {
                    from: format_date(from),
                    to: format_date(to),
                });
            }
        }
        Ok(())
    }

    pub(crate) fn query(&self) -> Vec<(&'static str, String)> {
        let mut query = vec![("symbol", self.symbol.as_str().to_owned())];
        if let Some(contract_type) = self.contract_type {
            query.push(("contractType", contract_type.as_str().to_owned()));
        }
        if let Some(count) = self.strike_count {
            query.push(("strikeCount", count.to_string()));
        }
        if let Some(include) = self.include_underlying_quote {
            query.push(("includeUnderlyingQuote", include.to_string()));
        }
        if let Some(strike) = self.strike {
            query.push(("strike", strike.to_string()));
        }
        if let Some(from) = self.from_date {
            query.push(("fromDate", format_date(from)));
        }
        if let Some(to) = self.to_date {
            query.push(("toDate", format_date(to)));
        }
        query
    }
}
