pub mod types;
pub mod depth;
pub mod trade;

pub use depth::L2Depth;
pub use trade::Trade;
pub use types::{MarketDataError, PriceLevel, Side, UpdateType, Value};
