pub mod types;
pub use types::*;
pub mod snapshot;
pub mod csv_sink;
use async_trait::async_trait;

use crate::engine::types::Value;

/// Destination for flattened snapshot rows.
#[async_trait]
pub trait RowSink {
    async fn write_header(&mut self, columns: &[String]) -> SinkResult<()>;
    async fn write_row(&mut self, row: &[Value]) -> SinkResult<()>;
    async fn flush(&mut self) -> SinkResult<()>;
}
