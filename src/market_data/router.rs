// Router wires the feed reader and the collector together
use ahash::AHashMap;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;
use tracing::{info, instrument, warn};

use crate::market_data::collector::Collector;
use crate::market_data::feed::{FeedRecord, MarketEvent};
use crate::market_data::subscription::Instrument;
use crate::persist::snapshot;
use crate::persist::{RowSink, SinkResult};

pub const CHANNEL_CAPACITY: usize = 1000;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FeedStats {
    pub lines: u64,
    pub events: u64,
    pub rejected: u64,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CollectStats {
    pub events: u64,
    pub rows: u64,
    pub dropped: u64,
}

/// Writes the snapshot header for `instrument` so the sink accepts its rows.
pub async fn prepare_sink<S: RowSink + Send>(sink: &mut S, instrument: &Instrument) -> SinkResult<()> {
    sink.write_header(&snapshot::value_columns(true, instrument.depth)).await
}

/// Parses feed lines and forwards events. Lines that are not UTF-8, malformed records and
/// invalid side codes are logged and dropped; the reader keeps going. Only I/O errors
/// from `reader` stop it.
#[instrument(skip_all)]
pub async fn read_feed<R>(mut reader: R, tx: mpsc::Sender<MarketEvent>) -> anyhow::Result<FeedStats>
where
    R: AsyncBufRead + Unpin,
{
    let mut stats = FeedStats::default();
    let mut buf = Vec::new();

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            break;
        }
        stats.lines += 1;

        let line = match std::str::from_utf8(&buf) {
            Ok(line) => line.trim(),
            Err(e) => {
                warn!(line_no = stats.lines, error = %e, "Skipping feed line that is not UTF-8");
                stats.rejected += 1;
                continue;
            }
        };
        if line.is_empty() {
            continue;
        }

        let event = match FeedRecord::parse_line(line) {
            Ok(record) => record.into_event(),
            Err(e) => {
                warn!(line_no = stats.lines, error = %e, "Skipping malformed feed line");
                stats.rejected += 1;
                continue;
            }
        };

        match event {
            Ok(event) => {
                if tx.send(event).await.is_err() {
                    warn!("Collector stopped, no longer reading feed");
                    break;
                }
                stats.events += 1;
            }
            Err(e) => {
                warn!(line_no = stats.lines, error = %e, "Dropping feed update");
                stats.rejected += 1;
            }
        }
    }

    info!(lines = stats.lines, events = stats.events, rejected = stats.rejected, "Feed exhausted");
    Ok(stats)
}

/// Applies events until the channel closes, routing rows to the sink of their instrument.
#[instrument(skip_all)]
pub async fn run_collector<S>(
    collector: &mut Collector,
    mut rx: mpsc::Receiver<MarketEvent>,
    sinks: &mut AHashMap<String, S>,
) -> anyhow::Result<CollectStats>
where
    S: RowSink + Send,
{
    let mut stats = CollectStats::default();

    while let Some(event) = rx.recv().await {
        stats.events += 1;
        let row = match collector.apply(event) {
            Ok(Some(row)) => row,
            Ok(None) => continue,
            Err(e) => {
                warn!(error = %e, "Event not applied");
                stats.dropped += 1;
                continue;
            }
        };

        match sinks.get_mut(&row.instmt_id) {
            Some(sink) => {
                sink.write_row(&row.values).await?;
                stats.rows += 1;
            }
            None => {
                warn!(instmt_id = %row.instmt_id, "No sink for instrument, row dropped");
                stats.dropped += 1;
            }
        }
    }

    for sink in sinks.values_mut() {
        sink.flush().await?;
    }
    info!(events = stats.events, rows = stats.rows, dropped = stats.dropped, "Collector finished");
    Ok(stats)
}

/// Runs the feed reader and collector as two tasks joined by a bounded channel.
pub async fn run<R, S>(
    reader: R,
    mut collector: Collector,
    mut sinks: AHashMap<String, S>,
) -> anyhow::Result<(FeedStats, CollectStats, Collector)>
where
    R: AsyncBufRead + Unpin + Send + 'static,
    S: RowSink + Send + 'static,
{
    let (tx, rx) = mpsc::channel::<MarketEvent>(CHANNEL_CAPACITY);

    let feed_task = tokio::spawn(read_feed(reader, tx));
    let collect_task = tokio::spawn(async move {
        let stats = run_collector(&mut collector, rx, &mut sinks).await?;
        anyhow::Ok((stats, collector))
    });

    // both tasks are joined before either error is reported
    let feed_result = feed_task.await;
    let collect_result = collect_task.await;

    let feed_stats = feed_result??;
    let (collect_stats, collector) = collect_result??;
    Ok((feed_stats, collect_stats, collector))
}
