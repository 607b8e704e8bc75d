use std::path::{Path, PathBuf};

use ahash::AHashMap;
use anyhow::Context;
use clap::Parser;
use tokio::fs::File;
use tokio::io::{BufReader, BufWriter};
use tracing::info;

use mdsnap_rs::market_data::collector::Collector;
use mdsnap_rs::market_data::router;
use mdsnap_rs::market_data::subscription::{Instrument, SubscriptionManager};
use mdsnap_rs::persist::csv_sink::CsvSink;
use mdsnap_rs::telemetry;

/// Replays a normalised market data feed and writes one snapshot CSV per instrument.
#[derive(Debug, Parser)]
#[command(name = "mdsnap", version)]
struct Args {
    /// INI file with one section per instrument
    #[arg(long, env = "MDSNAP_SUBSCRIPTIONS")]
    subscriptions: PathBuf,

    /// JSON-lines feed to replay
    #[arg(long, env = "MDSNAP_FEED")]
    feed: PathBuf,

    /// Directory receiving `<instmt_id>.csv` files
    #[arg(long, env = "MDSNAP_OUT_DIR", default_value = "snapshots")]
    out_dir: PathBuf,

    /// tracing filter used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_filter: String,

    /// Prometheus exporter port (only with the `metrics-exporter` feature)
    #[arg(long, default_value_t = 9000)]
    metrics_port: u16,
}

async fn open_sink(out_dir: &Path, instrument: &Instrument) -> anyhow::Result<CsvSink<BufWriter<File>>> {
    let path = out_dir.join(format!("{}.csv", instrument.instmt_id));
    CsvSink::create(&path)
        .await
        .with_context(|| format!("creating {}", path.display()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok(); // load .env
    let args = Args::parse();

    telemetry::init_tracing(&args.log_filter);
    telemetry::init_metrics(args.metrics_port)?;

    let manager = SubscriptionManager::from_file(&args.subscriptions)?;
    let instruments = manager.subscriptions()?;
    if instruments.is_empty() {
        anyhow::bail!("no enabled instruments in {}", args.subscriptions.display());
    }

    tokio::fs::create_dir_all(&args.out_dir)
        .await
        .with_context(|| format!("creating {}", args.out_dir.display()))?;

    let mut sinks = AHashMap::new();
    for instrument in &instruments {
        let mut sink = open_sink(&args.out_dir, instrument).await?;
        router::prepare_sink(&mut sink, instrument).await?;
        info!(
            instmt_id = %instrument.instmt_id,
            exchange = %instrument.exchange_name,
            instmt = %instrument.instmt_name,
            depth = instrument.depth,
            "Subscribed"
        );
        sinks.insert(instrument.instmt_id.clone(), sink);
    }

    let feed = File::open(&args.feed)
        .await
        .with_context(|| format!("opening feed {}", args.feed.display()))?;

    let collector = Collector::new(instruments);
    let (feed_stats, collect_stats, _collector) =
        router::run(BufReader::new(feed), collector, sinks).await?;

    info!(
        lines = feed_stats.lines,
        rejected = feed_stats.rejected,
        rows = collect_stats.rows,
        dropped = collect_stats.dropped,
        "Replay complete"
    );
    Ok(())
}
