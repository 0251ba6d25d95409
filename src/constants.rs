//! Format constants and tuning parameters.
//!
//! Defaults follow what mainstream torrent creators produce: power-of-two
//! piece lengths between 16 KiB and 16 MiB, a `pieces` blob of roughly
//! 40 KiB, and BEP-47 style padding entries.

// ============================================================================
// Client identification
// ============================================================================

/// Value written to the `created by` field unless the caller overrides it.
pub const CREATED_BY: &str = concat!("metaforge/", env!("CARGO_PKG_VERSION"));

// ============================================================================
// Bencode limits
// ============================================================================

/// Maximum nesting of lists and dictionaries accepted by the decoder.
pub const DEFAULT_DEPTH_LIMIT: usize = 100;

// ============================================================================
// Pieces
// ============================================================================

/// Size of one SHA-1 piece digest in the `pieces` blob.
pub const PIECE_HASH_LEN: usize = 20;

/// Smallest piece length chosen by automatic selection (16 KiB).
pub const MIN_PIECE_LENGTH: u64 = 16 * 1024;

/// Largest piece length chosen by automatic selection (16 MiB).
pub const MAX_PIECE_LENGTH: u64 = 16 * 1024 * 1024;

/// Automatic selection aims to keep the `pieces` blob at or under this size.
pub const TARGET_PIECES_BLOB_SIZE: u64 = 40 * 1024;

// ============================================================================
// Files
// ============================================================================

/// Largest single file size the storage model accepts.
///
/// Sizes are written as bencode integers, which are signed 64-bit here.
pub const MAX_FILE_SIZE: u64 = i64::MAX as u64;

/// Directory under which padding entries are named (`.pad/<size>`).
pub const PAD_DIR: &str = ".pad";

/// `attr` flag marking a padding entry.
pub const ATTR_PAD: char = 'p';

/// `attr` flag marking a hidden file.
pub const ATTR_HIDDEN: char = 'h';

/// `attr` flag marking an executable file.
pub const ATTR_EXECUTABLE: char = 'x';

/// `attr` flag marking a symbolic link entry.
pub const ATTR_SYMLINK: char = 'l';
