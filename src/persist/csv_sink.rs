use std::path::Path;

use tokio::fs::File;
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};
use tracing::{debug, instrument};

use crate::engine::types::Value;
use crate::persist::types::{SinkError, SinkResult};
use crate::persist::RowSink;

/// Writes snapshot rows as CSV. The header fixes the row width; rows of any other
/// width are rejected.
///
/// Records are encoded into an in-memory buffer and handed to the async writer, so the
/// collector task never blocks on the filesystem.
pub struct CsvSink<W> {
    encoder: csv::Writer<Vec<u8>>,
    inner: W,
    width: Option<usize>,
    rows: u64,
}

impl CsvSink<BufWriter<File>> {
    pub async fn create(path: impl AsRef<Path>) -> SinkResult<Self> {
        let file = File::create(path).await?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: AsyncWrite + Unpin + Send> CsvSink<W> {
    pub fn new(inner: W) -> Self {
        Self {
            encoder: csv::Writer::from_writer(Vec::new()),
            inner,
            width: None,
            rows: 0,
        }
    }

    pub fn rows_written(&self) -> u64 {
        self.rows
    }

    /// Hands back the underlying writer. Call `flush` first to push buffered bytes out.
    pub fn into_inner(self) -> W {
        self.inner
    }

    async fn drain_encoder(&mut self) -> SinkResult<()> {
        self.encoder.flush()?;
        let old = std::mem::replace(&mut self.encoder, csv::Writer::from_writer(Vec::new()));
        let bytes = old.into_inner().map_err(|e| e.into_error())?;
        self.inner.write_all(&bytes).await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl<W: AsyncWrite + Unpin + Send> RowSink for CsvSink<W> {
    #[instrument(level = "debug", skip_all, fields(columns = columns.len()))]
    async fn write_header(&mut self, columns: &[String]) -> SinkResult<()> {
        self.encoder.write_record(columns)?;
        self.drain_encoder().await?;
        self.width = Some(columns.len());
        Ok(())
    }

    async fn write_row(&mut self, row: &[Value]) -> SinkResult<()> {
        if let Some(expected) = self.width {
            if row.len() != expected {
                return Err(SinkError::ArityMismatch { expected, got: row.len() });
            }
        }
        self.encoder.write_record(row.iter().map(|v| v.to_string()))?;
        self.drain_encoder().await?;
        self.rows += 1;
        Ok(())
    }

    async fn flush(&mut self) -> SinkResult<()> {
        self.drain_encoder().await?;
        self.inner.flush().await?;
        debug!(rows = self.rows, "Flushed CSV sink");
        Ok(())
    }
}
