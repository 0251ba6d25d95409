use thiserror::Error;

use crate::bencode::{DecodeError, EncodeError};
use crate::storage::StorageError;

/// Errors that can occur when building or parsing torrent files.
#[derive(Debug, Error)]
pub enum MetainfoError {
    /// The torrent file contains invalid bencode.
    #[error("bencode decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("bencode encode error: {0}")]
    Encode(#[from] EncodeError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// The top-level dictionary has no `info` key.
    #[error("missing info dictionary")]
    MissingInfoDict,

    /// A required field is missing from the torrent file.
    #[error("missing field: {0}")]
    MissingField(&'static str),

    /// A field has an invalid value or type.
    #[error("invalid field: {0}")]
    InvalidField(&'static str),

    /// An entry of the `files` list is malformed.
    #[error("malformed file list entry {index}: {reason}")]
    MalformedFileList { index: usize, reason: &'static str },

    /// The number of piece hashes does not match the payload size.
    #[error("expected {expected} piece hashes, found {actual}")]
    PieceCountMismatch { expected: u64, actual: u64 },

    /// An info hash was not 20 bytes long.
    #[error("invalid info hash length: {0}")]
    InvalidInfoHashLength(usize),
}
