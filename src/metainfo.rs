//! Torrent metainfo handling ([BEP-3]).
//!
//! A torrent file (`.torrent`) is a bencoded dictionary describing the
//! payload to share:
//!
//! - **info** - Core torrent metadata (hashed to create the info hash)
//!   - `name` - Suggested file/directory name
//!   - `piece length` - Size of each piece in bytes
//!   - `pieces` - Concatenated SHA1 hashes of each piece
//!   - `length` - Total size (single-file) OR `files` list (multi-file),
//!     where each entry has `path`, `length` and an optional `attr`
//! - **announce** - Primary tracker URL
//! - **announce-list** - Tracker tiers ([BEP-12])
//! - **url-list** / **httpseeds** - Web seeds ([BEP-19], [BEP-17])
//! - **nodes** - DHT bootstrap nodes
//! - **creation date**, **comment**, **created by**
//!
//! [`MetainfoBuilder`] assembles these from a [`FileStorage`] and a
//! [`PieceLayout`]; [`Metainfo`] parses and validates them.
//!
//! # Examples
//!
//! ```no_run
//! use metaforge::metainfo::Metainfo;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let data = std::fs::read("example.torrent")?;
//! let torrent = Metainfo::from_bytes(&data)?;
//!
//! println!("Name: {}", torrent.info.name);
//! println!("Info hash: {}", torrent.info_hash);
//! println!("Number of pieces: {}", torrent.info.piece_count());
//!
//! for file in torrent.files(false) {
//!     println!("  {} ({} bytes)", file.display_path(), file.size);
//! }
//!
//! for tracker in torrent.trackers() {
//!     println!("Tracker: {}", tracker);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! [BEP-3]: http://bittorrent.org/beps/bep_0003.html
//! [BEP-12]: http://bittorrent.org/beps/bep_0012.html
//! [BEP-17]: http://bittorrent.org/beps/bep_0017.html
//! [BEP-19]: http://bittorrent.org/beps/bep_0019.html
//! [`FileStorage`]: crate::storage::FileStorage
//! [`PieceLayout`]: crate::hasher::PieceLayout

mod builder;
mod error;
mod info_hash;
mod torrent;

pub use builder::MetainfoBuilder;
pub use error::MetainfoError;
pub use info_hash::InfoHash;
pub use torrent::{Info, Metainfo};

#[cfg(test)]
mod tests;
