//! Point-in-time market data state for exchange instruments.
//!
//! - `engine`: fixed-depth `L2Depth` book, `Trade` record, `Side` parsing and row cell types
//! - `persist`: snapshot row flattening and row sinks
//! - `market_data`: subscription loading, feed records and the per-instrument collector
pub mod engine;
pub mod persist;
pub mod market_data;
pub mod telemetry;
