use bytes::Bytes;
use thiserror::Error;

/// Errors produced while decoding bencode.
///
/// Every variant records the byte offset in the input at which the
/// problem was detected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("unexpected end of input at offset {offset}")]
    UnexpectedEof { offset: usize },

    #[error("invalid string length prefix at offset {offset}")]
    InvalidLengthPrefix { offset: usize },

    #[error("invalid integer at offset {offset}: {reason}")]
    InvalidInteger { offset: usize, reason: &'static str },

    #[error("unterminated list or dictionary starting at offset {offset}")]
    UnterminatedContainer { offset: usize },

    #[error("dictionary key at offset {offset} is not a byte string")]
    NonByteStringKey { offset: usize },

    #[error("duplicate dictionary key {key:?} at offset {offset}")]
    DuplicateKey { offset: usize, key: Bytes },

    #[error("nesting depth limit of {limit} exceeded at offset {offset}")]
    DepthLimitExceeded { offset: usize, limit: usize },

    #[error("trailing data after value at offset {offset}")]
    TrailingData { offset: usize },

    #[error("unexpected byte 0x{byte:02x} at offset {offset}")]
    UnexpectedByte { offset: usize, byte: u8 },
}

impl DecodeError {
    /// Byte offset in the input where decoding failed.
    pub fn offset(&self) -> usize {
        match self {
            DecodeError::UnexpectedEof { offset }
            | DecodeError::InvalidLengthPrefix { offset }
            | DecodeError::InvalidInteger { offset, .. }
            | DecodeError::UnterminatedContainer { offset }
            | DecodeError::NonByteStringKey { offset }
            | DecodeError::DuplicateKey { offset, .. }
            | DecodeError::DepthLimitExceeded { offset, .. }
            | DecodeError::TrailingData { offset }
            | DecodeError::UnexpectedByte { offset, .. } => *offset,
        }
    }
}

/// Errors produced while encoding bencode.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    #[error("integer {0} does not fit in a signed 64-bit bencode integer")]
    IntegerOutOfRange(u64),

    #[error("dictionary key {0:?} is duplicated or out of order")]
    DuplicateKeyAfterSort(Bytes),
}
