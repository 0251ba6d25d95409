//! The file layout of a torrent.
//!
//! A torrent's payload is the concatenation of its files in list order.
//! Pieces are cut from that stream without regard to file boundaries, so a
//! piece may span several files. This module models the ordered file list,
//! derives each file's offset in the stream, and maps pieces back to file
//! regions.
//!
//! # Components
//!
//! - [`FileStorage`] - Ordered file list with offsets and padding support
//! - [`FileEntry`] - One file: path segments, size, offset, attributes,
//!   plus the optional mtime, symlink target and whole-file SHA-1
//! - [`FileAttributes`] - Padding, hidden, executable and symlink flags (`attr`)
//! - [`ScanOptions`] - What [`FileStorage::from_directory_with`] records
//! - [`FileSlice`] - Region of one file covered by a piece
//!
//! # Padding
//!
//! Padding entries ([BEP-47]) are synthetic zero-filled files placed between
//! real files so that the next real file starts on a piece boundary. They are
//! listed like ordinary files, flagged with `attr = "p"`, and named
//! `.pad/<size>`.
//!
//! ```
//! use metaforge::storage::FileStorage;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut storage = FileStorage::new("docs");
//! storage.add_file("a.txt", 100)?;
//! storage.add_file("b.txt", 100)?;
//!
//! let pad = storage.insert_padding(1, 64)?;
//! assert_eq!(pad, 28);
//! assert_eq!(storage.entries()[2].offset, 128);
//! # Ok(())
//! # }
//! ```
//!
//! # Symlinks
//!
//! Directory scans never follow symbolic links. A link whose target lies
//! inside the scanned root is recorded as a zero-length entry flagged
//! `attr = "l"` with its target stored as path segments relative to the
//! root; links leading outside the root are skipped.
//!
//! [BEP-47]: http://bittorrent.org/beps/bep_0047.html

mod error;
mod file;
mod file_storage;

pub use error::StorageError;
pub use file::{FileAttributes, FileEntry, FileSlice};
pub use file_storage::{auto_piece_length, FileStorage, ScanOptions};
