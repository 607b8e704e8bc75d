use std::fmt;

use chrono::{DateTime, Utc};

/// Row timestamp layout shared by depth and trade records, e.g. `20240131 09:30:00.123456`.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d %H:%M:%S%.6f";

/// Placeholder timestamp carried until the first real update arrives.
pub const EPOCH_SENTINEL: &str = "20000101 00:00:00.000000";

pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum MarketDataError {
    #[error("Cannot parse the side ({0})")]
    InvalidSide(i64),

    #[error("Missing snapshot input: {0} must not be none")]
    MissingSnapshotInput(&'static str),

    #[error("Unknown instrument id: {0}")]
    UnknownInstrument(String),
}

pub type MarketDataResult<T> = Result<T, MarketDataError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Side {
    #[default]
    NONE,
    BUY,
    SELL,
}

/// Side as it arrives from a feed: either a numeric code or a free-form token.
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
#[serde(untagged)]
pub enum RawSide {
    Code(i64),
    Text(String),
}

impl Side {
    /// Integer code written into storage rows.
    pub fn code(self) -> i64 {
        match self {
            Side::NONE => 0,
            Side::BUY => 1,
            Side::SELL => 2,
        }
    }

    /// Lenient text parsing: unrecognised vocabulary resolves to `NONE`, never an error.
    pub fn parse_text(value: &str) -> Side {
        match value.to_lowercase().as_str() {
            "buy" | "bid" | "b" => Side::BUY,
            "sell" | "ask" | "s" => Side::SELL,
            _ => Side::NONE,
        }
    }

    /// Strict for numeric codes (only 1 and 2 are valid), lenient for text.
    pub fn parse(value: &RawSide) -> MarketDataResult<Side> {
        match value {
            RawSide::Code(code) => Side::try_from(*code),
            RawSide::Text(text) => Ok(Side::parse_text(text)),
        }
    }
}

impl TryFrom<i64> for Side {
    type Error = MarketDataError;

    fn try_from(code: i64) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(Side::BUY),
            2 => Ok(Side::SELL),
            other => Err(MarketDataError::InvalidSide(other)),
        }
    }
}

/// One aggregated entry on one side of the book.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PriceLevel {
    pub price: f64,
    pub count: i64,
    pub volume: f64,
}

impl PriceLevel {
    pub fn new(price: f64, count: i64, volume: f64) -> Self {
        Self { price, count, volume }
    }
}

/// Which part of the market state triggered a snapshot row.
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpdateType {
    #[default]
    NONE,
    ORDER_BOOK,
    TRADES,
}

impl UpdateType {
    pub fn code(self) -> i64 {
        match self {
            UpdateType::NONE => 0,
            UpdateType::ORDER_BOOK => 1,
            UpdateType::TRADES => 2,
        }
    }
}

/// Storage type tag of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Varchar(u16),
    Text,
    Decimal(u8, u8),
    Int,
}

/// Tag used for price columns.
pub const PRICE_TYPE: ColumnType = ColumnType::Decimal(10, 5);
/// Tag used for volume columns.
pub const VOLUME_TYPE: ColumnType = ColumnType::Decimal(20, 8);
/// Tag used for timestamp columns.
pub const TIMESTAMP_TYPE: ColumnType = ColumnType::Varchar(25);

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnType::Varchar(len) => write!(f, "varchar({})", len),
            ColumnType::Text => write!(f, "text"),
            ColumnType::Decimal(precision, scale) => write!(f, "decimal({},{})", precision, scale),
            ColumnType::Int => write!(f, "int"),
        }
    }
}

/// A single cell of a tabular row.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(untagged)]
pub enum Value {
    Text(String),
    Float(f64),
    Int(i64),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Text(s) => write!(f, "{}", s),
            Value::Float(x) => write!(f, "{}", x),
            Value::Int(i) => write!(f, "{}", i),
        }
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}
