//! Redaction of recorded Schwab responses.
//!
//! Raw responses captured from a live account carry account numbers,
//! CUSIPs, real symbols and free-text descriptions. [`sanitize`] rewrites a
//! payload into sample values while keeping the shape (and the enum-like
//! fields the models depend on) intact, and [`find_sensitive`] walks the
//! result to prove nothing identifying is left. [`sanitize_dir`] runs both
//! over a directory of `*.json` captures and only writes clean files.

use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Number, Value};
use thiserror::Error;
use time::format_description::well_known::Rfc3339;
use time::format_description::BorrowedFormatItem;
use time::macros::{datetime, format_description};
use time::{Date, Duration, OffsetDateTime, PrimitiveDateTime};
use tracing::{info, warn};

use crate::domain::{AssetMainType, AssetSubType};

pub const SAMPLE_SYMBOLS: [&str; 5] = ["AAPL", "MSFT", "GOOGL", "F", "T"];
pub const SAMPLE_ACCOUNT: &str = "DEMO123456";
pub const SAMPLE_CUSIP: &str = "000000000";
pub const SAMPLE_DESCRIPTION: &str = "Sample Transaction";
pub const SAMPLE_BANK: &str = "DEMO BANK";

const SAMPLE_DATE: OffsetDateTime = datetime!(2024-01-01 12:00:00 UTC);

/// Fields whose values are kept as recorded.
pub const PRESERVED_FIELDS: [&str; 24] = [
    "isOpen",
    "realtime",
    "isShortable",
    "indicative",
    "assetMainType",
    "assetSubType",
    "divFreq",
    "type",
    "status",
    "feeType",
    "positionEffect",
    "instruction",
    "activityType",
    "securityStatus",
    "exchangeName",
    "exchange",
    "assetType",
    "date",
    "declarationDate",
    "dividendDate",
    "dividendPayDate",
    "nextDividendDate",
    "nextDividendPayDate",
    "invalidSymbols",
];

/// Fields that must only ever hold a sample value after sanitizing.
pub const SENSITIVE_FIELDS: [&str; 10] = [
    "cusip",
    "accountNumber",
    "routingNumber",
    "email",
    "phone",
    "ssn",
    "name",
    "description",
    "symbol",
    "instrumentId",
];

const TIMESTAMP_FIELDS: [&str; 5] = ["time", "enteredTime", "closeTime", "tradeDate", "settlementDate"];

/// Values that may appear anywhere without being reported.
const SAFE_VALUES: [&str; 28] = [
    "Normal",
    "Closed",
    "EXECUTION",
    "VALID",
    "CASH_EQUIVALENT",
    "EQUITY",
    "MUTUAL_FUND",
    "CURRENCY",
    "Index",
    "Mutual Fund",
    "NYSE",
    "NASDAQ",
    "ACTIVE",
    "INACTIVE",
    "$SPX",
    "FXAIX",
    "CURRENCY_USD",
    "DJX 231215C00290000",
    "COMMON_STOCK",
    "SWEEP_VEHICLE",
    "CASH",
    "MARGIN",
    SAMPLE_ACCOUNT,
    SAMPLE_CUSIP,
    SAMPLE_DESCRIPTION,
    SAMPLE_BANK,
    "Transfer from DEMO BANK",
    "string",
];

const SAFE_SYMBOLS: [&str; 3] = ["CURRENCY_USD", "$SPX", "FXAIX"];

/// Defaults filled into sanitized `quote` objects that lack them.
const QUOTE_DEFAULTS: [(&str, QuoteDefault); 17] = [
    ("askPrice", QuoteDefault::Float(100.0)),
    ("askSize", QuoteDefault::Int(100)),
    ("askTime", QuoteDefault::Int(100)),
    ("bidPrice", QuoteDefault::Float(100.0)),
    ("bidSize", QuoteDefault::Int(100)),
    ("bidTime", QuoteDefault::Int(100)),
    ("highPrice", QuoteDefault::Float(100.0)),
    ("lastPrice", QuoteDefault::Float(100.0)),
    ("lastSize", QuoteDefault::Int(100)),
    ("lowPrice", QuoteDefault::Float(100.0)),
    ("mark", QuoteDefault::Float(100.0)),
    ("markChange", QuoteDefault::Float(10.0)),
    ("markPercentChange", QuoteDefault::Float(1.0)),
    ("openPrice", QuoteDefault::Float(100.0)),
    ("quoteTime", QuoteDefault::Int(100)),
    ("totalVolume", QuoteDefault::Int(1000)),
    ("nAV", QuoteDefault::Float(100.0)),
];

#[derive(Clone, Copy)]
enum QuoteDefault {
    Int(i64),
    Float(f64),
}

impl QuoteDefault {
    fn to_value(self) -> Value {
        match self {
            Self::Int(value) => Value::from(value),
            Self::Float(value) => Value::from(value),
        }
    }
}

const OUTPUT_TIMESTAMP: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]+0000");
const OFFSET_TIMESTAMP: &[BorrowedFormatItem<'static>] = format_description!(
    "[year]-[month]-[day]T[hour]:[minute]:[second][offset_hour sign:mandatory][offset_minute]"
);
const MICROS_TIMESTAMP: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second].[subsecond]");
const PLAIN_DATE: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");

/// Kinds of identifying text the validator looks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SensitivePattern {
    Cusip,
    AccountNumber,
    RoutingNumber,
    Email,
    Phone,
    Ssn,
    Date,
    Name,
    Bank,
}

impl SensitivePattern {
    pub const ALL: [SensitivePattern; 9] = [
        Self::Cusip,
        Self::AccountNumber,
        Self::RoutingNumber,
        Self::Email,
        Self::Phone,
        Self::Ssn,
        Self::Date,
        Self::Name,
        Self::Bank,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cusip => "cusip",
            Self::AccountNumber => "account_number",
            Self::RoutingNumber => "routing_number",
            Self::Email => "email",
            Self::Phone => "phone",
            Self::Ssn => "ssn",
            Self::Date => "date",
            Self::Name => "name",
            Self::Bank => "bank",
        }
    }

    const fn source(self) -> &'static str {
        match self {
            Self::Cusip => r"[0-9A-Z]{9}",
            Self::AccountNumber => r"\b\d{8,12}\b",
            Self::RoutingNumber => r"\b\d{9}\b",
            Self::Email => r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Z|a-z]{2,}\b",
            Self::Phone => r"\b\d{3}[-.]?\d{3}[-.]?\d{4}\b",
            Self::Ssn => r"\b\d{3}-?\d{2}-?\d{4}\b",
            Self::Date => r"\b\d{4}[-/]\d{1,2}[-/]\d{1,2}\b",
            Self::Name => r"\b(?:Mr\.|Mrs\.|Ms\.|Dr\.|Prof\.)?\s*[A-Z][a-z]+(?:\s+[A-Z][a-z]+)*\b",
            Self::Bank => {
                r"\b(?:Bank|BANK|bank)\s+(?:of|OF)\s+[A-Za-z\s]+\b|\b[A-Za-z]+\s+(?:Bank|BANK|bank)\b"
            }
        }
    }
}

static PATTERNS: LazyLock<Vec<(SensitivePattern, Regex)>> = LazyLock::new(|| {
    SensitivePattern::ALL
        .into_iter()
        .map(|pattern| {
            let regex = Regex::new(pattern.source()).expect("sensitive pattern regex must compile");
            (pattern, regex)
        })
        .collect()
});

/// One piece of possibly identifying data left in a payload.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Finding {
    SensitiveField {
        path: String,
        value: String,
    },
    Pattern {
        pattern: SensitivePattern,
        path: String,
        value: String,
    },
}

impl Finding {
    pub fn path(&self) -> &str {
        match self {
            Self::SensitiveField { path, .. } | Self::Pattern { path, .. } => path,
        }
    }
}

impl Display for Finding {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SensitiveField { path, value } => write!(
                f,
                "sensitive field '{path}' contains potentially unsanitized value: {value}"
            ),
            Self::Pattern {
                pattern,
                path,
                value,
            } => write!(f, "found potential {} in {path}: {value}", pattern.as_str()),
        }
    }
}

#[derive(Debug, Error)]
pub enum SanitizeError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{path} is not valid JSON: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("sensitive data left in sanitized output for {path} ({} findings)", .findings.len())]
    SensitiveData {
        path: PathBuf,
        findings: Vec<Finding>,
    },
}

/// Returns a redacted copy of `value`.
pub fn sanitize(value: &Value) -> Value {
    sanitize_value(value, None, None)
}

fn sanitize_value(value: &Value, key: Option<&str>, parent: Option<&Map<String, Value>>) -> Value {
    match value {
        Value::Null | Value::Bool(_) => value.clone(),
        Value::Number(number) => {
            if key == Some("divFreq") {
                return Value::from(0);
            }
            sanitize_number(number, key.is_some_and(is_preserved))
        }
        Value::String(text) => Value::String(sanitize_string(text, key, parent)),
        Value::Object(object) => match key {
            Some("quote") => sanitize_quote(object),
            Some("fundamental") => sanitize_fundamental(object),
            Some("instrument") => sanitize_instrument(object),
            _ => Value::Object(
                object
                    .iter()
                    .map(|(name, item)| {
                        (name.clone(), sanitize_value(item, Some(name.as_str()), Some(object)))
                    })
                    .collect(),
            ),
        },
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| sanitize_value(item, key, None))
                .collect(),
        ),
    }
}

fn sanitize_number(number: &Number, keep_small: bool) -> Value {
    let magnitude = number.as_f64().unwrap_or_default();
    if keep_small && magnitude <= 1.0 {
        return Value::Number(number.clone());
    }

    let positive = magnitude > 0.0;
    if number.is_f64() {
        Value::from(if positive { 100.0 } else { 0.0 })
    } else {
        Value::from(if positive { 100 } else { 0 })
    }
}

fn sanitize_string(text: &str, key: Option<&str>, parent: Option<&Map<String, Value>>) -> String {
    match key {
        Some("description") => return sanitize_description(text),
        Some(name) if TIMESTAMP_FIELDS.contains(&name) => return sanitize_timestamp(text),
        Some("cusip") => return SAMPLE_CUSIP.to_owned(),
        Some("assetSubType") => {
            if let Some(main) = parent.and_then(|parent| parent.get("assetMainType")) {
                return subtype_for(main).to_owned();
            }
            return text.to_owned();
        }
        Some(name) if is_preserved(name) => return text.to_owned(),
        _ => {}
    }

    if !text.is_empty() && text.chars().all(|ch| ch.is_ascii_digit()) {
        SAMPLE_ACCOUNT.to_owned()
    } else {
        text.to_owned()
    }
}

fn sanitize_description(text: &str) -> String {
    let lower = text.to_lowercase();
    if ["bank", "transfer", "tfr", "ach", "wire"]
        .iter()
        .any(|keyword| lower.contains(keyword))
    {
        format!("Transfer from {SAMPLE_BANK}")
    } else {
        SAMPLE_DESCRIPTION.to_owned()
    }
}

/// Moves a timestamp to within 30 days after the sample date, keeping the
/// day offset between related timestamps in one payload.
fn sanitize_timestamp(text: &str) -> String {
    let shifted = OffsetDateTime::parse(text, OFFSET_TIMESTAMP)
        .or_else(|_| OffsetDateTime::parse(text, &Rfc3339))
        .ok()
        .and_then(|original| {
            let seconds = (original - SAMPLE_DATE).whole_seconds();
            let days = seconds.div_euclid(86_400).rem_euclid(30);
            SAMPLE_DATE.checked_add(Duration::days(days))
        })
        .unwrap_or(SAMPLE_DATE);

    shifted
        .format(OUTPUT_TIMESTAMP)
        .unwrap_or_else(|_| String::from("2024-01-01T12:00:00+0000"))
}

fn subtype_for(main: &Value) -> &'static str {
    serde_json::from_value::<AssetMainType>(main.clone())
        .ok()
        .and_then(|main| AssetSubType::valid_for(main).first().copied())
        .unwrap_or(AssetSubType::Coe)
        .as_str()
}

fn sanitize_quote(quote: &Map<String, Value>) -> Value {
    let mut sanitized: Map<String, Value> = quote
        .iter()
        .map(|(name, item)| (name.clone(), sanitize_value(item, Some(name.as_str()), None)))
        .collect();
    for (name, default) in QUOTE_DEFAULTS {
        sanitized
            .entry(name)
            .or_insert_with(|| default.to_value());
    }
    Value::Object(sanitized)
}

fn sanitize_fundamental(fundamental: &Map<String, Value>) -> Value {
    Value::Object(
        fundamental
            .iter()
            .map(|(name, item)| {
                let value = if name == "divFreq" {
                    Value::from(0)
                } else {
                    sanitize_value(item, Some(name.as_str()), None)
                };
                (name.clone(), value)
            })
            .collect(),
    )
}

fn sanitize_instrument(instrument: &Map<String, Value>) -> Value {
    Value::Object(
        instrument
            .iter()
            .map(|(name, item)| {
                let value = match name.as_str() {
                    field if is_preserved(field) => item.clone(),
                    "symbol" => Value::from(SAMPLE_SYMBOLS[0]),
                    "cusip" => Value::from(SAMPLE_CUSIP),
                    _ => sanitize_value(item, Some(name.as_str()), Some(instrument)),
                };
                (name.clone(), value)
            })
            .collect(),
    )
}

fn is_preserved(name: &str) -> bool {
    PRESERVED_FIELDS.contains(&name)
}

/// Reports every value in `value` that still looks identifying, sorted by
/// path.
pub fn find_sensitive(value: &Value) -> Vec<Finding> {
    let mut findings = BTreeSet::new();
    collect_findings(value, "", &mut findings);
    findings.into_iter().collect()
}

fn collect_findings(value: &Value, path: &str, findings: &mut BTreeSet<Finding>) {
    match value {
        Value::Object(object) => {
            for (name, item) in object {
                if is_preserved(name) {
                    continue;
                }
                let item_path = if path.is_empty() {
                    name.clone()
                } else {
                    format!("{path}.{name}")
                };

                if SENSITIVE_FIELDS.contains(&name.as_str()) {
                    if let Value::String(text) = item {
                        if !is_safe(text, name, &item_path) {
                            findings.insert(Finding::SensitiveField {
                                path: item_path.clone(),
                                value: text.clone(),
                            });
                        }
                    }
                }
                collect_findings(item, &item_path, findings);
            }
        }
        Value::Array(items) => {
            for (index, item) in items.iter().enumerate() {
                collect_findings(item, &format!("{path}[{index}]"), findings);
            }
        }
        Value::String(text) => {
            if PRESERVED_FIELDS.iter().any(|field| path.contains(field)) {
                return;
            }
            for (pattern, regex) in PATTERNS.iter() {
                if regex.is_match(text) && !is_safe(text, pattern.as_str(), path) {
                    findings.insert(Finding::Pattern {
                        pattern: *pattern,
                        path: path.to_owned(),
                        value: text.clone(),
                    });
                }
            }
        }
        Value::Null | Value::Bool(_) | Value::Number(_) => {}
    }
}

fn is_safe(text: &str, check: &str, path: &str) -> bool {
    if SAFE_VALUES.contains(&text) || SAMPLE_SYMBOLS.contains(&text) {
        return true;
    }
    match check {
        "symbol" => SAFE_SYMBOLS.contains(&text),
        "cusip" => text == SAMPLE_CUSIP,
        "description" => text == SAMPLE_DESCRIPTION || text.starts_with("Transfer from"),
        _ if check == "date" || is_date_path(path) => looks_like_sample_date(text),
        _ => false,
    }
}

fn is_date_path(path: &str) -> bool {
    let lower = path.to_ascii_lowercase();
    lower.contains("date") || lower.contains("time")
}

fn looks_like_sample_date(text: &str) -> bool {
    PrimitiveDateTime::parse(text, OUTPUT_TIMESTAMP).is_ok()
        || PrimitiveDateTime::parse(text, MICROS_TIMESTAMP).is_ok()
        || Date::parse(text, PLAIN_DATE).is_ok()
}

/// Outcome for one input file of [`sanitize_dir`].
#[derive(Debug)]
pub struct FileOutcome {
    pub input: PathBuf,
    pub output: PathBuf,
    pub result: Result<(), SanitizeError>,
}

/// Per-file results of a [`sanitize_dir`] run.
#[derive(Debug, Default)]
pub struct SanitizeReport {
    pub files: Vec<FileOutcome>,
}

impl SanitizeReport {
    pub fn written(&self) -> usize {
        self.files.iter().filter(|file| file.result.is_ok()).count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &FileOutcome> {
        self.files.iter().filter(|file| file.result.is_err())
    }

    pub fn is_clean(&self) -> bool {
        self.files.iter().all(|file| file.result.is_ok())
    }
}

/// Sanitizes one file. Nothing is written when findings remain.
pub fn sanitize_file(input: &Path, output: &Path) -> Result<(), SanitizeError> {
    let raw = std::fs::read_to_string(input).map_err(|source| SanitizeError::Read {
        path: input.to_path_buf(),
        source,
    })?;
    let parsed: Value = serde_json::from_str(&raw).map_err(|source| SanitizeError::Json {
        path: input.to_path_buf(),
        source,
    })?;

    let sanitized = sanitize(&parsed);
    let findings = find_sensitive(&sanitized);
    if !findings.is_empty() {
        return Err(SanitizeError::SensitiveData {
            path: input.to_path_buf(),
            findings,
        });
    }

    let pretty = serde_json::to_string_pretty(&sanitized).map_err(|source| SanitizeError::Json {
        path: output.to_path_buf(),
        source,
    })?;
    let write_error = |source| SanitizeError::Write {
        path: output.to_path_buf(),
        source,
    };
    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent).map_err(write_error)?;
    }
    std::fs::write(output, pretty + "\n").map_err(write_error)
}

/// Sanitizes every `*.json` file directly inside `input_dir` into
/// `output_dir` under the same name. Only a failure to list `input_dir`
/// aborts the run; per-file failures are reported.
pub fn sanitize_dir(input_dir: &Path, output_dir: &Path) -> Result<SanitizeReport, SanitizeError> {
    let read_error = |source| SanitizeError::Read {
        path: input_dir.to_path_buf(),
        source,
    };
    let mut inputs = std::fs::read_dir(input_dir)
        .map_err(read_error)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(read_error)?
        .into_iter()
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "json"))
        .collect::<Vec<_>>();
    inputs.sort();

    let mut report = SanitizeReport::default();
    for input in inputs {
        let Some(name) = input.file_name() else {
            continue;
        };
        let output = output_dir.join(name);
        let result = sanitize_file(&input, &output);
        match &result {
            Ok(()) => info!(input = %input.display(), output = %output.display(), "sanitized"),
            Err(error) => warn!(input = %input.display(), error = %error, "not written"),
        }
        report.files.push(FileOutcome {
            input,
            output,
            result,
        });
    }
    Ok(report)
}
