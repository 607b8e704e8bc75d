//! Flattening of the current `L2Depth` + last `Trade` into one storable row.
//!
//! Stateless. This file MUST NOT do any I/O; sinks live in `csv_sink.rs`.

use crate::engine::depth::L2Depth;
use crate::engine::trade::Trade;
use crate::engine::types::{
    ColumnType, MarketDataError, MarketDataResult, UpdateType, Value, PRICE_TYPE, TIMESTAMP_TYPE,
    VOLUME_TYPE,
};

const NAME_COLUMNS: [&str; 2] = ["exchange", "instmt"];
const TRADE_COLUMNS: [&str; 2] = ["trade_px", "trade_volume"];
const TAIL_COLUMNS: [&str; 3] = ["order_date_time", "trades_date_time", "update_type"];

const NAME_TYPE: ColumnType = ColumnType::Varchar(20);

fn owned<'a>(names: &'a [&'a str]) -> impl Iterator<Item = String> + 'a {
    names.iter().map(|s| s.to_string())
}

/// Schema columns: optional `exchange, instmt`, then `trade_px, trade_volume`, then
/// `L2Depth::columns(depth)`, then `order_date_time, trades_date_time, update_type`.
pub fn columns(is_name: bool, depth: usize) -> Vec<String> {
    let names: &[&str] = if is_name { &NAME_COLUMNS } else { &[] };
    owned(names)
        .chain(owned(&TRADE_COLUMNS))
        .chain(L2Depth::columns(depth))
        .chain(owned(&TAIL_COLUMNS))
        .collect()
}

pub fn types(is_name: bool, depth: usize) -> Vec<ColumnType> {
    let names: &[ColumnType] = if is_name { &[NAME_TYPE, NAME_TYPE] } else { &[] };
    names
        .iter()
        .copied()
        .chain([PRICE_TYPE, VOLUME_TYPE])
        .chain(L2Depth::types(depth))
        .chain([TIMESTAMP_TYPE, TIMESTAMP_TYPE, ColumnType::Int])
        .collect()
}

/// Names of the cells `values()` actually emits. `values()` carries the depth timestamp
/// only as `order_date_time`, so the depth block's leading `date_time` is absent.
pub fn value_columns(is_name: bool, depth: usize) -> Vec<String> {
    let names: &[&str] = if is_name { &NAME_COLUMNS } else { &[] };
    owned(names)
        .chain(owned(&TRADE_COLUMNS))
        .chain(L2Depth::columns(depth).into_iter().skip(1))
        .chain(owned(&TAIL_COLUMNS))
        .collect()
}

/// Type tags aligned with `value_columns()`.
pub fn value_types(is_name: bool, depth: usize) -> Vec<ColumnType> {
    let mut tags = types(is_name, depth);
    let depth_timestamp = if is_name { 4 } else { 2 };
    tags.remove(depth_timestamp);
    tags
}

/// One row for the sink. Exchange and instrument names are each included only when
/// non-empty. All depth levels are emitted, with no volume cap.
///
/// Fails when either the depth or the trade is missing.
pub fn values(
    exchange_name: &str,
    instmt_name: &str,
    l2_depth: Option<&L2Depth>,
    last_trade: Option<&Trade>,
    update_type: UpdateType,
) -> MarketDataResult<Vec<Value>> {
    let l2_depth = l2_depth.ok_or(MarketDataError::MissingSnapshotInput("L2 depth"))?;
    let last_trade = last_trade.ok_or(MarketDataError::MissingSnapshotInput("last trade"))?;

    let mut row = Vec::with_capacity(7 + 4 * l2_depth.depth);
    if !exchange_name.is_empty() {
        row.push(Value::from(exchange_name));
    }
    if !instmt_name.is_empty() {
        row.push(Value::from(instmt_name));
    }
    row.push(Value::Float(last_trade.trade_price));
    row.push(Value::Float(last_trade.trade_volume));
    l2_depth.flatten_levels_into(&mut row, None);
    row.push(Value::from(l2_depth.timestamp.as_str()));
    row.push(Value::from(last_trade.timestamp.as_str()));
    row.push(Value::Int(update_type.code()));
    Ok(row)
}
