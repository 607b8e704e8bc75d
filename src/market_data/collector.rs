// Per-instrument market state: applies feed events and decides when a snapshot row is due.
use ahash::AHashMap;
use tracing::{debug, instrument, trace};

use crate::engine::depth::L2Depth;
use crate::engine::trade::Trade;
use crate::engine::types::{MarketDataError, MarketDataResult, UpdateType, Value};
use crate::market_data::feed::MarketEvent;
use crate::market_data::subscription::Instrument;
use crate::persist::snapshot;

/// Number of top levels compared when deciding if a book update is worth a row.
pub const DIFF_LEVELS: usize = 5;

#[derive(Debug, Clone)]
pub struct InstrumentState {
    pub instrument: Instrument,
    pub l2_depth: L2Depth,
    /// Book as of the last emitted order-book row.
    pub prev_l2_depth: L2Depth,
    pub last_trade: Trade,
}

impl InstrumentState {
    pub fn new(instrument: Instrument) -> Self {
        let depth = instrument.depth;
        Self {
            instrument,
            l2_depth: L2Depth::new(depth),
            prev_l2_depth: L2Depth::new(depth),
            last_trade: Trade::default(),
        }
    }

    fn row(&self, update_type: UpdateType) -> MarketDataResult<Vec<Value>> {
        snapshot::values(
            &self.instrument.exchange_name,
            &self.instrument.instmt_name,
            Some(&self.l2_depth),
            Some(&self.last_trade),
            update_type,
        )
    }
}

/// A row ready for the sink of one instrument.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotRow {
    pub instmt_id: String,
    pub update_type: UpdateType,
    pub values: Vec<Value>,
}

/// Owns the state of every subscribed instrument. Single mutator; share by
/// handing out `L2Depth::copy()`s, not references.
#[derive(Debug, Default)]
pub struct Collector {
    states: AHashMap<String, InstrumentState>,
}

impl Collector {
    pub fn new(instruments: Vec<Instrument>) -> Self {
        let states = instruments
            .into_iter()
            .map(|i| (i.instmt_id.clone(), InstrumentState::new(i)))
            .collect();
        Self { states }
    }

    pub fn state(&self, instmt_id: &str) -> Option<&InstrumentState> {
        self.states.get(instmt_id)
    }

    pub fn instruments(&self) -> impl Iterator<Item = &Instrument> {
        self.states.values().map(|s| &s.instrument)
    }

    /// Applies one event. Book updates only yield a row when the top levels moved;
    /// every trade yields a row.
    #[instrument(level = "debug", skip(self, event), fields(instmt_id = event.instmt_id()))]
    pub fn apply(&mut self, event: MarketEvent) -> MarketDataResult<Option<SnapshotRow>> {
        metrics::counter!("mdsnap_events_total").increment(1);

        let instmt_id = event.instmt_id().to_string();
        let state = self
            .states
            .get_mut(&instmt_id)
            .ok_or_else(|| MarketDataError::UnknownInstrument(instmt_id.clone()))?;

        let update_type = match event {
            MarketEvent::Depth { timestamp, bids, asks, .. } => {
                state.l2_depth.replace_bids(bids);
                state.l2_depth.replace_asks(asks);
                state.l2_depth.timestamp = timestamp;

                let level = DIFF_LEVELS.min(state.l2_depth.depth);
                if !state.l2_depth.is_diff(&state.prev_l2_depth, level) {
                    trace!("Top of book unchanged, no row");
                    return Ok(None);
                }
                state.prev_l2_depth = state.l2_depth.copy();
                UpdateType::ORDER_BOOK
            }
            MarketEvent::Trade { trade, .. } => {
                state.last_trade = trade;
                UpdateType::TRADES
            }
        };

        let values = state.row(update_type)?;
        debug!(?update_type, cells = values.len(), "Snapshot row produced");
        metrics::counter!("mdsnap_rows_total").increment(1);
        Ok(Some(SnapshotRow { instmt_id, update_type, values }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::types::{PriceLevel, Side};
    use std::collections::BTreeMap;

    fn instrument(id: &str, depth: usize) -> Instrument {
        Instrument {
            instmt_id: id.to_string(),
            exchange_name: "Binance".to_string(),
            instmt_name: id.to_uppercase(),
            instmt_code: id.to_string(),
            depth,
            poll_interval_secs: 5,
            params: BTreeMap::new(),
        }
    }

    fn depth_event(id: &str, best_bid: f64) -> MarketEvent {
        MarketEvent::Depth {
            instmt_id: id.to_string(),
            timestamp: "20240102 10:00:00.000000".to_string(),
            bids: vec![PriceLevel::new(best_bid - 1.0, 1, 1.0), PriceLevel::new(best_bid, 2, 2.0)],
            asks: vec![PriceLevel::new(best_bid + 2.0, 1, 1.0), PriceLevel::new(best_bid + 1.0, 1, 3.0)],
        }
    }

    #[test]
    fn test_depth_update_emits_order_book_row() {
        let mut collector = Collector::new(vec![instrument("btc", 3)]);
        let row = collector.apply(depth_event("btc", 100.0)).unwrap().unwrap();
        assert_eq!(row.update_type, UpdateType::ORDER_BOOK);
        assert_eq!(row.values.len(), snapshot::value_columns(true, 3).len());
        assert_eq!(row.values[0], Value::Text("Binance".into()));
        assert_eq!(row.values[1], Value::Text("BTC".into()));
        // best bid sorted to the front
        assert_eq!(row.values[4], Value::Float(100.0));
        assert_eq!(row.values.last(), Some(&Value::Int(1)));

        let state = collector.state("btc").unwrap();
        assert_eq!(state.l2_depth.bids.len(), 3);
        assert_eq!(state.l2_depth.asks[0].price, 101.0);
        assert_eq!(state.prev_l2_depth, state.l2_depth);
    }

    #[test]
    fn test_unchanged_book_is_suppressed() {
        let mut collector = Collector::new(vec![instrument("btc", 5)]);
        assert!(collector.apply(depth_event("btc", 100.0)).unwrap().is_some());
        assert!(collector.apply(depth_event("btc", 100.0)).unwrap().is_none());
        assert!(collector.apply(depth_event("btc", 100.5)).unwrap().is_some());
    }

    #[test]
    fn test_trade_emits_trades_row() {
        let mut collector = Collector::new(vec![instrument("eth", 2)]);
        let trade = Trade::new("20240102 10:00:01.000000", "9", 2500.0, 0.3, Side::BUY);
        let row = collector
            .apply(MarketEvent::Trade { instmt_id: "eth".into(), trade })
            .unwrap()
            .unwrap();
        assert_eq!(row.update_type, UpdateType::TRADES);
        assert_eq!(row.values[2], Value::Float(2500.0));
        assert_eq!(row.values[3], Value::Float(0.3));
        assert_eq!(row.values.last(), Some(&Value::Int(2)));
    }

    #[test]
    fn test_unknown_instrument() {
        let mut collector = Collector::new(vec![instrument("btc", 5)]);
        let err = collector.apply(depth_event("doge", 1.0)).unwrap_err();
        assert_eq!(err, MarketDataError::UnknownInstrument("doge".into()));
    }
}
