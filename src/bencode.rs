//! Bencode encoding and decoding ([BEP-3]).
//!
//! Bencode is the serialization format used for `.torrent` files, tracker
//! responses and DHT messages. The codec here is general purpose: it decodes
//! any top-level value, and the torrent layer adds its own structural checks.
//!
//! # Data Types
//!
//! | Type | Format | Example |
//! |------|--------|---------|
//! | Integer | `i<number>e` | `i42e` → 42 |
//! | Byte String | `<length>:<data>` | `4:spam` → "spam" |
//! | List | `l<items>e` | `l4:spami42ee` → ["spam", 42] |
//! | Dictionary | `d<key><value>...e` | `d3:foo3:bare` → {"foo": "bar"} |
//!
//! # Canonical form
//!
//! Encoding always emits dictionary keys in ascending unsigned byte order.
//! Decoding accepts keys in any order, so `encode(decode(b))` is canonical
//! even when `b` is not. This is what makes info hashes stable.
//!
//! ```
//! use metaforge::bencode::{decode, encode};
//!
//! let value = decode(b"d1:bi2e1:ai1ee").unwrap();
//! assert_eq!(encode(&value).unwrap(), b"d1:ai1e1:bi2ee");
//! ```
//!
//! # Error Handling
//!
//! Decoding is strict by default. Each failure has its own
//! [`DecodeError`] variant carrying the byte offset:
//!
//! - [`DecodeError::UnexpectedEof`] - input ended inside a token
//! - [`DecodeError::InvalidLengthPrefix`] - malformed string length
//! - [`DecodeError::InvalidInteger`] - non-digits, leading zeros, `-0`, overflow
//! - [`DecodeError::UnterminatedContainer`] - list or dictionary without `e`
//! - [`DecodeError::NonByteStringKey`] - dictionary key of another type
//! - [`DecodeError::DuplicateKey`] - the same key twice in one dictionary
//! - [`DecodeError::DepthLimitExceeded`] - nesting deeper than the limit (100)
//! - [`DecodeError::TrailingData`] - extra bytes after the value
//! - [`DecodeError::UnexpectedByte`] - a byte that starts no value
//!
//! [`DecodeMode::Lenient`] tolerates duplicate keys (the last one wins) and
//! trailing data, for historical files.
//!
//! [BEP-3]: http://bittorrent.org/beps/bep_0003.html

mod decode;
mod encode;
mod error;
mod value;

pub use decode::{decode, DecodeMode, Decoder};
pub use encode::{encode, encode_into};
pub use error::{DecodeError, EncodeError};
pub use value::Value;
