use chrono::Utc;

use crate::engine::types::{
    format_timestamp, ColumnType, Side, Value, EPOCH_SENTINEL, PRICE_TYPE, TIMESTAMP_TYPE,
    VOLUME_TYPE,
};

/// Last trade print of an instrument. A new value is built per print; nothing
/// mutates a published trade.
#[derive(Debug, Clone, PartialEq)]
pub struct Trade {
    pub timestamp: String,
    pub trade_id: String,
    pub trade_price: f64,
    pub trade_volume: f64,
    pub trade_side: Side,
    /// Local receive time, same layout as `timestamp`.
    pub update_timestamp: String,
}

impl Default for Trade {
    fn default() -> Self {
        Trade {
            timestamp: EPOCH_SENTINEL.to_string(),
            trade_id: String::new(),
            trade_price: 0.0,
            trade_volume: 0.0,
            trade_side: Side::NONE,
            update_timestamp: format_timestamp(Utc::now()),
        }
    }
}

impl Trade {
    pub fn new(
        timestamp: impl Into<String>,
        trade_id: impl Into<String>,
        trade_price: f64,
        trade_volume: f64,
        trade_side: Side,
    ) -> Self {
        Trade {
            timestamp: timestamp.into(),
            trade_id: trade_id.into(),
            trade_price,
            trade_volume,
            trade_side,
            update_timestamp: format_timestamp(Utc::now()),
        }
    }

    pub fn columns() -> Vec<String> {
        ["date_time", "trade_id", "trade_price", "trade_volume", "trade_side"]
            .iter()
            .map(|c| c.to_string())
            .collect()
    }

    pub fn types() -> Vec<ColumnType> {
        vec![TIMESTAMP_TYPE, ColumnType::Text, PRICE_TYPE, VOLUME_TYPE, ColumnType::Int]
    }

    pub fn values(&self) -> Vec<Value> {
        vec![
            Value::from(self.timestamp.as_str()),
            Value::from(self.trade_id.as_str()),
            Value::Float(self.trade_price),
            Value::Float(self.trade_volume),
            Value::Int(self.trade_side.code()),
        ]
    }
}
