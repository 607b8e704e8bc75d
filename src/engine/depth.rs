use chrono::{DateTime, Utc};
use itertools::Itertools;
use ordered_float::OrderedFloat;
use std::cmp::Reverse;
use tracing::{debug, instrument, trace};

use crate::engine::types::{
    format_timestamp, ColumnType, PriceLevel, Value, EPOCH_SENTINEL, PRICE_TYPE, TIMESTAMP_TYPE,
    VOLUME_TYPE,
};

/// Depth used when an instrument does not configure one.
pub const DEFAULT_DEPTH: usize = 5;

/// `L2Depth::values()` only emits volumes for this many levels per side, whatever the
/// configured depth. Prices are not capped. Kept for compatibility with existing tables.
pub const VOLUME_COLUMN_CAP: usize = 5;

/// Absolute tolerance used by `is_diff` for prices and volumes.
pub const DIFF_TOLERANCE: f64 = 1e-9;

/// Column name prefixes, in row order: bid prices, ask prices, bid volumes, ask volumes.
const LEVEL_PREFIXES: [&str; 4] = ["b", "a", "bq", "aq"];

/// Fixed-depth L2 view of one instrument: `depth` ranked levels per side plus the
/// exchange timestamp of the last update.
///
/// Levels are not kept sorted on mutation. Callers write raw levels and then call
/// `sort_bids` / `sort_asks` once per batch.
#[derive(Debug, Clone, PartialEq)]
pub struct L2Depth {
    pub timestamp: String,
    pub depth: usize,
    pub bids: Vec<PriceLevel>,
    pub asks: Vec<PriceLevel>,
}

impl Default for L2Depth {
    fn default() -> Self {
        L2Depth::new(DEFAULT_DEPTH)
    }
}

impl L2Depth {
    #[instrument(level = "trace")]
    pub fn new(depth: usize) -> Self {
        L2Depth {
            timestamp: EPOCH_SENTINEL.to_string(),
            depth,
            bids: vec![PriceLevel::default(); depth],
            asks: vec![PriceLevel::default(); depth],
        }
    }

    /// Column names: `date_time`, then `b1..bN`, `a1..aN`, `bq1..bqN`, `aq1..aqN`.
    pub fn columns(depth: usize) -> Vec<String> {
        std::iter::once("date_time".to_string())
            .chain(
                LEVEL_PREFIXES
                    .iter()
                    .cartesian_product(1..=depth)
                    .map(|(prefix, i)| format!("{}{}", prefix, i)),
            )
            .collect()
    }

    pub fn types(depth: usize) -> Vec<ColumnType> {
        std::iter::once(TIMESTAMP_TYPE)
            .chain(std::iter::repeat(PRICE_TYPE).take(depth * 2))
            .chain(std::iter::repeat(VOLUME_TYPE).take(depth * 2))
            .collect()
    }

    /// Row matching `columns()` for depth 5. Volumes are capped at `VOLUME_COLUMN_CAP`
    /// levels per side, so for deeper books the row is shorter than `columns(depth)`.
    pub fn values(&self) -> Vec<Value> {
        let mut row = Vec::with_capacity(1 + self.bids.len() * 4);
        row.push(Value::from(self.timestamp.as_str()));
        self.flatten_levels_into(&mut row, Some(VOLUME_COLUMN_CAP));
        row
    }

    /// Appends bid prices, ask prices, bid volumes and ask volumes, in that order.
    /// `volume_cap` limits how many levels per side contribute a volume.
    pub(crate) fn flatten_levels_into(&self, row: &mut Vec<Value>, volume_cap: Option<usize>) {
        let bid_volumes = volume_cap.map_or(self.bids.len(), |cap| cap.min(self.bids.len()));
        let ask_volumes = volume_cap.map_or(self.asks.len(), |cap| cap.min(self.asks.len()));

        row.extend(self.bids.iter().map(|b| Value::Float(b.price)));
        row.extend(self.asks.iter().map(|a| Value::Float(a.price)));
        row.extend(self.bids[..bid_volumes].iter().map(|b| Value::Float(b.volume)));
        row.extend(self.asks[..ask_volumes].iter().map(|a| Value::Float(a.volume)));
    }

    /// Best bid first. Stable, then truncated to `depth`.
    #[instrument(level = "trace", skip(self), fields(len = self.bids.len(), depth = self.depth))]
    pub fn sort_bids(&mut self) {
        self.bids.sort_by_key(|level| Reverse(OrderedFloat(level.price)));
        if self.bids.len() > self.depth {
            trace!(dropped = self.bids.len() - self.depth, "Truncating bids to depth");
            self.bids.truncate(self.depth);
        }
    }

    /// Best ask first. Stable, then truncated to `depth`.
    #[instrument(level = "trace", skip(self), fields(len = self.asks.len(), depth = self.depth))]
    pub fn sort_asks(&mut self) {
        self.asks.sort_by_key(|level| OrderedFloat(level.price));
        if self.asks.len() > self.depth {
            trace!(dropped = self.asks.len() - self.depth, "Truncating asks to depth");
            self.asks.truncate(self.depth);
        }
    }

    /// Independent point-in-time copy with the same capacity.
    pub fn copy(&self) -> L2Depth {
        self.clone()
    }

    /// True when any of the first `level` bid or ask prices/volumes differ by more than
    /// `DIFF_TOLERANCE`. Levels are compared by index, not matched by price.
    ///
    /// Panics if either book has fewer than `level` entries on a side.
    pub fn is_diff(&self, other: &L2Depth, level: usize) -> bool {
        let differs = |a: &PriceLevel, b: &PriceLevel| {
            (a.price - b.price).abs() > DIFF_TOLERANCE || (a.volume - b.volume).abs() > DIFF_TOLERANCE
        };

        for i in 0..level {
            if differs(&self.bids[i], &other.bids[i]) || differs(&self.asks[i], &other.asks[i]) {
                trace!(level = i, "Depth differs");
                return true;
            }
        }
        false
    }

    pub fn set_timestamp(&mut self, ts: DateTime<Utc>) {
        self.timestamp = format_timestamp(ts);
    }

    /// Replaces the bid side with raw feed levels, re-sorts, and pads with empty
    /// levels so the side always holds exactly `depth` entries.
    pub fn replace_bids(&mut self, levels: Vec<PriceLevel>) {
        self.bids = levels;
        self.sort_bids();
        self.bids.resize(self.depth, PriceLevel::default());
    }

    /// Ask-side mirror of `replace_bids`. Padding goes after sorting so empty levels
    /// never rank ahead of real asks.
    pub fn replace_asks(&mut self, levels: Vec<PriceLevel>) {
        self.asks = levels;
        self.sort_asks();
        self.asks.resize(self.depth, PriceLevel::default());
        debug!(depth = self.depth, best_ask = ?self.best_ask(), "Replaced asks");
    }

    pub fn best_bid(&self) -> Option<PriceLevel> {
        self.bids.first().copied().filter(|level| level.price != 0.0)
    }

    pub fn best_ask(&self) -> Option<PriceLevel> {
        self.asks.first().copied().filter(|level| level.price != 0.0)
    }
}
