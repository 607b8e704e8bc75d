use std::collections::BTreeMap;

use ahash::AHashMap;
use mdsnap_rs::market_data::collector::Collector;
use mdsnap_rs::market_data::router;
use mdsnap_rs::market_data::subscription::Instrument;
use mdsnap_rs::persist::csv_sink::CsvSink;
use mdsnap_rs::persist::snapshot;

fn instrument(id: &str, depth: usize) -> Instrument {
    Instrument {
        instmt_id: id.to_string(),
        exchange_name: "Bitstamp".to_string(),
        instmt_name: id.to_uppercase(),
        instmt_code: id.to_string(),
        depth,
        poll_interval_secs: 5,
        params: BTreeMap::new(),
    }
}

const FEED: &str = r#"
{"type":"depth","instmt_id":"btcusd","timestamp":"20240102 10:00:00.000000","bids":[[99.0,1,1.0],[100.0,2,2.0]],"asks":[[102.0,1,1.0],[101.0,1,3.0]]}
{"type":"depth","instmt_id":"btcusd","timestamp":"20240102 10:00:00.500000","bids":[[99.0,1,1.0],[100.0,2,2.0]],"asks":[[102.0,1,1.0],[101.0,1,3.0]]}
not json at all
{"type":"trade","instmt_id":"btcusd","timestamp":"20240102 10:00:01.000000","trade_id":"7","price":100.5,"volume":0.25,"side":"b"}
{"type":"trade","instmt_id":"btcusd","timestamp":"20240102 10:00:02.000000","trade_id":"8","price":100.5,"volume":0.25,"side":9}
{"type":"trade","instmt_id":"ethusd","timestamp":"20240102 10:00:03.000000","trade_id":"1","price":1.0,"volume":1.0,"side":1}
"#;

#[tokio::test]
async fn test_replay_writes_snapshot_rows() {
    let btc = instrument("btcusd", 2);
    let mut sink = CsvSink::new(Vec::new());
    router::prepare_sink(&mut sink, &btc).await.unwrap();

    let mut sinks = AHashMap::new();
    sinks.insert("btcusd".to_string(), sink);

    let collector = Collector::new(vec![btc]);
    let (feed_stats, collect_stats, collector) =
        router::run(FEED.as_bytes(), collector, sinks).await.unwrap();

    // blank lines are counted but skipped; the garbage line and side code 9 are rejected
    assert_eq!(feed_stats.events, 4);
    assert_eq!(feed_stats.rejected, 2);

    // second depth update is identical, ethusd is not subscribed
    assert_eq!(collect_stats.events, 4);
    assert_eq!(collect_stats.rows, 2);
    assert_eq!(collect_stats.dropped, 1);

    let state = collector.state("btcusd").unwrap();
    assert_eq!(state.l2_depth.timestamp, "20240102 10:00:00.500000");
    assert_eq!(state.prev_l2_depth.timestamp, "20240102 10:00:00.000000");
    assert_eq!(state.last_trade.trade_id, "7");
}

#[tokio::test]
async fn test_csv_output_layout() {
    let btc = instrument("btcusd", 2);
    let mut sink = CsvSink::new(Vec::new());
    router::prepare_sink(&mut sink, &btc).await.unwrap();

    let mut collector = Collector::new(vec![btc]);
    let (tx, rx) = tokio::sync::mpsc::channel(16);
    let reader = tokio::spawn(router::read_feed(FEED.as_bytes(), tx));

    let mut sinks = AHashMap::new();
    sinks.insert("btcusd".to_string(), sink);
    router::run_collector(&mut collector, rx, &mut sinks).await.unwrap();
    reader.await.unwrap().unwrap();

    let sink = sinks.remove("btcusd").unwrap();
    let text = String::from_utf8(sink.into_inner()).unwrap();
    let lines: Vec<&str> = text.lines().collect();

    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0], snapshot::value_columns(true, 2).join(","));
    assert_eq!(
        lines[1],
        "Bitstamp,BTCUSD,0,0,100,99,101,102,2,1,3,1,20240102 10:00:00.000000,20000101 00:00:00.000000,1"
    );
    assert_eq!(
        lines[2],
        "Bitstamp,BTCUSD,100.5,0.25,100,99,101,102,2,1,3,1,20240102 10:00:00.500000,20240102 10:00:01.000000,2"
    );
}

#[tokio::test]
async fn test_non_utf8_line_is_skipped() {
    let btc = instrument("btcusd", 2);
    let mut sink = CsvSink::new(Vec::new());
    router::prepare_sink(&mut sink, &btc).await.unwrap();
    let mut sinks = AHashMap::new();
    sinks.insert("btcusd".to_string(), sink);

    let mut feed: Vec<u8> = Vec::new();
    feed.extend_from_slice(
        br#"{"type":"trade","instmt_id":"btcusd","timestamp":"20240102 10:00:01.000000","trade_id":"1","price":100.0,"volume":1.0,"side":"buy"}"#,
    );
    feed.extend_from_slice(b"\n\xff\xfe garbage\n");
    feed.extend_from_slice(
        br#"{"type":"trade","instmt_id":"btcusd","timestamp":"20240102 10:00:02.000000","trade_id":"2","price":101.0,"volume":1.0,"side":"sell"}"#,
    );
    feed.push(b'\n');

    let (feed_stats, collect_stats, collector) =
        router::run(std::io::Cursor::new(feed), Collector::new(vec![btc]), sinks)
            .await
            .unwrap();

    assert_eq!(feed_stats.lines, 3);
    assert_eq!(feed_stats.events, 2);
    assert_eq!(feed_stats.rejected, 1);
    assert_eq!(collect_stats.rows, 2);
    assert_eq!(collector.state("btcusd").unwrap().last_trade.trade_id, "2");
}
