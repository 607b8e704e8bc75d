use crate::engine::types::MarketDataError;

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("I/O failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV write failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("Row has {got} cells, header has {expected}")]
    ArityMismatch { expected: usize, got: usize },

    #[error(transparent)]
    MarketData(#[from] MarketDataError),
}

pub type SinkResult<T> = Result<T, SinkError>;
