//! metaforge - Torrent metainfo creation and parsing
//!
//! This library builds and reads `.torrent` files: the bencode codec they
//! are written in, the file layout they describe, the piece hashes that
//! identify their content, and the metainfo dictionary tying it together.
//!
//! # Modules
//!
//! - [`bencode`] - BEP-3 Bencode encoding/decoding
//! - [`storage`] - Ordered file lists, offsets and BEP-47 padding
//! - [`hasher`] - Parallel SHA-1 piece hashing
//! - [`metainfo`] - Building and parsing metainfo, info hashes
//! - [`constants`] - Defaults and format limits
//!
//! # Creating a torrent
//!
//! ```no_run
//! use metaforge::hasher::{DiskSource, PieceHasher};
//! use metaforge::metainfo::MetainfoBuilder;
//! use metaforge::storage::{auto_piece_length, FileStorage};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let storage = FileStorage::from_directory("downloads/album")?;
//! let piece_length = auto_piece_length(storage.total_size());
//!
//! let layout = PieceHasher::new(storage.clone(), piece_length, DiskSource::new("downloads"))
//!     .run(|p| eprintln!("{}/{}", p.completed, p.total))?;
//!
//! let torrent = MetainfoBuilder::new(&storage, layout)?
//!     .add_tracker("udp://tracker.example.com:6969/announce", 0)
//!     .build()?;
//! std::fs::write("album.torrent", torrent)?;
//! # Ok(())
//! # }
//! ```

pub mod bencode;
pub mod constants;
pub mod hasher;
pub mod metainfo;
pub mod storage;

pub use bencode::{decode, encode, DecodeError, EncodeError, Value};
pub use hasher::{CancelToken, HashError, PieceHasher, PieceLayout};
pub use metainfo::{Info, InfoHash, Metainfo, MetainfoBuilder, MetainfoError};
pub use storage::{FileEntry, FileStorage, StorageError};
