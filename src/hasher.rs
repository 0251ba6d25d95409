//! Parallel piece hashing.
//!
//! The payload of a torrent is the concatenation of its files. It is cut into
//! `piece_length` windows (the last may be shorter) and each window is hashed
//! with SHA-1. The resulting [`PieceLayout`] is what the `pieces` field of a
//! `.torrent` file stores.
//!
//! Pieces are independent, so [`PieceHasher`] spreads them over a bounded
//! pool of threads. Memory use is one piece buffer per worker regardless of
//! the payload size. File content comes from a [`PieceSource`]:
//! [`DiskSource`] for files on disk, [`MemorySource`] for in-memory data.
//!
//! Hashing can be stopped through a [`CancelToken`]. A cancelled or failed
//! run never returns a partial layout.

mod error;
mod layout;
mod pool;
mod source;

pub use error::HashError;
pub use layout::PieceLayout;
pub use pool::{CancelToken, PieceHasher, PieceProgress};
pub use source::{DiskSource, MemorySource, PieceSource};
