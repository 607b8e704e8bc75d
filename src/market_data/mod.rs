// Market data module entrypoint
pub mod subscription;   // INI instrument definitions -> Instrument
pub mod feed;           // replay feed records -> MarketEvent
pub mod collector;      // per-instrument depth/trade state and snapshot emission
pub mod router;         // feed reader + collector tasks wired over mpsc
