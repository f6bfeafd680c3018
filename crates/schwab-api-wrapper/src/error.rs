use std::fmt::{Display, Formatter};

use thiserror::Error;

/// Validation errors raised before a request leaves the process or while a
/// payload is mapped into a typed model.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("symbol cannot be empty")]
    EmptySymbol,
    #[error("symbol length {len} exceeds max {max}")]
    SymbolTooLong { len: usize, max: usize },
    #[error("symbol must start with an ASCII letter, '$' or '/': '{ch}'")]
    SymbolInvalidStart { ch: char },
    #[error("symbol contains invalid character '{ch}' at index {index}")]
    SymbolInvalidChar { ch: char, index: usize },
    #[error("at least one symbol is required")]
    EmptySymbolList,

    #[error("timestamp must be UTC (suffix Z or +0000): '{value}'")]
    TimestampNotUtc { value: String },
    #[error("timestamp is out of range")]
    TimestampOutOfRange,

    #[error("invalid dividend frequency {value}, expected one of 0, 1, 2, 3, 4, 6, 11, 12")]
    InvalidDividendFrequency { value: i64 },

    #[error("candle high must be >= low")]
    InvalidCandleRange,
    #[error("candle open/close must be within high/low range")]
    InvalidCandleBounds,

    #[error("order must contain at least one leg")]
    OrderWithoutLegs,
    #[error("field '{field}' must be greater than zero")]
    NonPositiveValue { field: &'static str },
    #[error("{order_type} orders require '{field}'")]
    MissingOrderPrice {
        order_type: &'static str,
        field: &'static str,
    },

    #[error("date range start {from} is after end {to}")]
    InvalidDateRange { from: String, to: String },
    #[error("date range exceeds the maximum of {max_years} year(s)")]
    DateRangeTooWide { max_years: i32 },
    #[error("max_results must be between 1 and {max}: {value}")]
    MaxResultsOutOfRange { value: u32, max: u32 },
    #[error("at least one transaction type is required")]
    EmptyTransactionTypes,
    #[error("frequency type '{frequency_type}' is not valid for period type '{period_type}'")]
    InvalidPriceHistory {
        period_type: &'static str,
        frequency_type: &'static str,
    },

    #[error("invalid {field} '{value}', expected one of: {expected}")]
    InvalidChoice {
        field: &'static str,
        value: String,
        expected: &'static str,
    },

    #[error("redirect url does not contain an authorization code")]
    MissingAuthorizationCode,
    #[error("invalid url '{value}'")]
    InvalidUrl { value: String },
}

/// Classification for failures returned by the Schwab API or the request
/// pipeline in front of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorKind {
    InvalidRequest,
    Unauthorized,
    Forbidden,
    NotFound,
    RateLimited,
    Unavailable,
    Decode,
    ReauthRequired,
    Internal,
}

/// Structured API error carrying the HTTP status when one was received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    kind: ApiErrorKind,
    message: String,
    status: Option<u16>,
    retryable: bool,
}

impl ApiError {
    fn new(kind: ApiErrorKind, message: impl Into<String>, retryable: bool) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
            retryable,
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::InvalidRequest, message, false)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::Unauthorized, message, false)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::Forbidden, message, false)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::NotFound, message, false)
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::RateLimited, message, true)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::Unavailable, message, true)
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::Decode, message, false)
    }

    pub fn reauth_required(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::ReauthRequired, message, false)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::Internal, message, false)
    }

    /// Maps a non-success HTTP status to the matching error kind.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let error = match status {
            400 | 422 => Self::invalid_request(message),
            401 => Self::unauthorized(message),
            403 => Self::forbidden(message),
            404 => Self::not_found(message),
            408 => Self::unavailable(message),
            429 => Self::rate_limited(message),
            500..=599 => Self::unavailable(message),
            _ => Self::internal(message),
        };
        error.with_status(status)
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub const fn kind(&self) -> ApiErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn status(&self) -> Option<u16> {
        self.status
    }

    pub const fn retryable(&self) -> bool {
        self.retryable
    }

    pub const fn code(&self) -> &'static str {
        match self.kind {
            ApiErrorKind::InvalidRequest => "api.invalid_request",
            ApiErrorKind::Unauthorized => "api.unauthorized",
            ApiErrorKind::Forbidden => "api.forbidden",
            ApiErrorKind::NotFound => "api.not_found",
            ApiErrorKind::RateLimited => "api.rate_limited",
            ApiErrorKind::Unavailable => "api.unavailable",
            ApiErrorKind::Decode => "api.decode",
            ApiErrorKind::ReauthRequired => "api.reauth_required",
            ApiErrorKind::Internal => "api.internal",
        }
    }
}

impl Display for ApiError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.status {
            Some(status) => write!(f, "{} (status {status}, {})", self.message, self.code()),
            None => write!(f, "{} ({})", self.message, self.code()),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<ValidationError> for ApiError {
    fn from(error: ValidationError) -> Self {
        Self::invalid_request(error.to_string())
    }
}

/// Pulls a human readable message out of a Schwab error body.
///
/// Trader/market data errors look like `{"message": "...", "errors": [...]}`
/// while the OAuth endpoint answers `{"error": "...", "error_description": "..."}`.
pub(crate) fn describe_error_body(status: u16, body: &str) -> String {
    let fallback = || format!("request failed with status {status}");
    let Ok(value) = serde_json::from_str::<serde_json::Value>(body) else {
        let trimmed = body.trim();
        return if trimmed.is_empty() || trimmed.len() > 200 {
            fallback()
        } else {
            trimmed.to_owned()
        };
    };

    let text = |key: &str| value.get(key).and_then(serde_json::Value::as_str);
    let details = value
        .get("errors")
        .and_then(serde_json::Value::as_array)
        .map(|errors| {
            errors
                .iter()
                .filter_map(|error| {
                    error
                        .get("detail")
                        .or_else(|| error.get("title"))
                        .and_then(serde_json::Value::as_str)
                        .or_else(|| error.as_str())
                })
                .collect::<Vec<_>>()
                .join("; ")
        })
        .filter(|joined| !joined.is_empty());

    match (
        text("message").or_else(|| text("error_description")).or_else(|| text("error")),
        details,
    ) {
        (Some(message), Some(details)) => format!("{message}: {details}"),
        (Some(message), None) => message.to_owned(),
        (None, Some(details)) => details,
        (None, None) => fallback(),
    }
}
