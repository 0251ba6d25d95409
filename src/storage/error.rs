use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("file size {size} for {path} is out of range")]
    NegativeOrOverflowingSize { path: String, size: u64 },

    #[error("invalid path {path:?}: {reason}")]
    InvalidPath { path: String, reason: &'static str },

    #[error("piece length must be positive")]
    InvalidPieceLength,

    #[error("padding can only be inserted before a real file after the first, not at index {0}")]
    InvalidPaddingIndex(usize),

    #[error("invalid file index: {0}")]
    InvalidFileIndex(usize),

    #[error("invalid piece index: {0}")]
    InvalidPieceIndex(u64),

    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
