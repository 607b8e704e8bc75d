// Replay feed records: one JSON object per line, already normalised by an upstream adapter.
//
//   {"type":"depth","instmt_id":"binance_btc","timestamp":"20240102 10:00:00.000000",
//    "bids":[[100.0,3,1.5]],"asks":[[100.5,1,0.2]]}
//   {"type":"trade","instmt_id":"binance_btc","timestamp":"20240102 10:00:00.100000",
//    "trade_id":"881","price":100.2,"volume":0.1,"side":"buy"}

use crate::engine::trade::Trade;
use crate::engine::types::{MarketDataResult, PriceLevel, RawSide, Side};

/// `(price, count, volume)` as sent on the wire.
pub type WireLevel = (f64, i64, f64);

#[derive(Debug, Clone, serde::Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FeedRecord {
    Depth {
        instmt_id: String,
        timestamp: String,
        bids: Vec<WireLevel>,
        asks: Vec<WireLevel>,
    },
    Trade {
        instmt_id: String,
        timestamp: String,
        trade_id: String,
        price: f64,
        volume: f64,
        side: RawSide,
    },
}

/// Normalised update handed to the collector.
#[derive(Debug, Clone, PartialEq)]
pub enum MarketEvent {
    Depth {
        instmt_id: String,
        timestamp: String,
        bids: Vec<PriceLevel>,
        asks: Vec<PriceLevel>,
    },
    Trade {
        instmt_id: String,
        trade: Trade,
    },
}

impl MarketEvent {
    pub fn instmt_id(&self) -> &str {
        match self {
            MarketEvent::Depth { instmt_id, .. } | MarketEvent::Trade { instmt_id, .. } => instmt_id,
        }
    }
}

fn to_levels(wire: Vec<WireLevel>) -> Vec<PriceLevel> {
    wire.into_iter()
        .map(|(price, count, volume)| PriceLevel::new(price, count, volume))
        .collect()
}

impl FeedRecord {
    pub fn parse_line(line: &str) -> serde_json::Result<FeedRecord> {
        serde_json::from_str(line)
    }

    /// Fails only on a numeric side code other than 1 or 2.
    pub fn into_event(self) -> MarketDataResult<MarketEvent> {
        match self {
            FeedRecord::Depth { instmt_id, timestamp, bids, asks } => Ok(MarketEvent::Depth {
                instmt_id,
                timestamp,
                bids: to_levels(bids),
                asks: to_levels(asks),
            }),
            FeedRecord::Trade { instmt_id, timestamp, trade_id, price, volume, side } => {
                let side = Side::parse(&side)?;
                Ok(MarketEvent::Trade {
                    instmt_id,
                    trade: Trade::new(timestamp, trade_id, price, volume, side),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::types::MarketDataError;

    #[test]
    fn test_depth_record() {
        let line = r#"{"type":"depth","instmt_id":"a","timestamp":"t","bids":[[10.0,2,1.5]],"asks":[]}"#;
        let event = FeedRecord::parse_line(line).unwrap().into_event().unwrap();
        assert_eq!(
            event,
            MarketEvent::Depth {
                instmt_id: "a".into(),
                timestamp: "t".into(),
                bids: vec![PriceLevel::new(10.0, 2, 1.5)],
                asks: vec![],
            }
        );
        assert_eq!(event.instmt_id(), "a");
    }

    #[test]
    fn test_trade_record_sides() {
        let text = r#"{"type":"trade","instmt_id":"a","timestamp":"t","trade_id":"1","price":1.0,"volume":2.0,"side":"ASK"}"#;
        match FeedRecord::parse_line(text).unwrap().into_event().unwrap() {
            MarketEvent::Trade { trade, .. } => assert_eq!(trade.trade_side, Side::SELL),
            other => panic!("unexpected event {:?}", other),
        }

        let unknown = r#"{"type":"trade","instmt_id":"a","timestamp":"t","trade_id":"1","price":1.0,"volume":2.0,"side":"cross"}"#;
        match FeedRecord::parse_line(unknown).unwrap().into_event().unwrap() {
            MarketEvent::Trade { trade, .. } => assert_eq!(trade.trade_side, Side::NONE),
            other => panic!("unexpected event {:?}", other),
        }

        let bad = r#"{"type":"trade","instmt_id":"a","timestamp":"t","trade_id":"1","price":1.0,"volume":2.0,"side":7}"#;
        let err = FeedRecord::parse_line(bad).unwrap().into_event().unwrap_err();
        assert_eq!(err, MarketDataError::InvalidSide(7));
    }

    #[test]
    fn test_malformed_line() {
        assert!(FeedRecord::parse_line(r#"{"type":"quote"}"#).is_err());
    }
}
