use thiserror::Error;

use crate::storage::StorageError;

#[derive(Debug, Error)]
pub enum HashError {
    /// A source file could not be opened, or ended before its declared size.
    #[error("failed to read {path} at offset {offset}: {source}")]
    SourceReadFailed {
        path: String,
        offset: u64,
        #[source]
        source: std::io::Error,
    },

    #[error("hashing cancelled")]
    Cancelled,

    #[error("piece length must be positive and addressable in memory")]
    InvalidPieceLength,

    #[error("piece layout mismatch: expected {expected} pieces of {piece_length} bytes")]
    LayoutMismatch { expected: u64, piece_length: u64 },

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("hashing worker failed: {0}")]
    WorkerFailed(String),
}
