use crate::constants::{ATTR_EXECUTABLE, ATTR_HIDDEN, ATTR_PAD, ATTR_SYMLINK};

/// Per-file flags carried in the `attr` string of a file entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct FileAttributes {
    /// Synthetic zero-filled entry that aligns the next file to a piece boundary.
    pub pad: bool,
    pub hidden: bool,
    pub executable: bool,
    /// Zero-length entry standing for a symbolic link; see [`FileEntry::symlink_target`].
    pub symlink: bool,
}

impl FileAttributes {
    pub fn padding() -> Self {
        Self {
            pad: true,
            ..Self::default()
        }
    }

    /// Renders the flags as an `attr` string, or `None` when no flag is set.
    pub fn to_attr(&self) -> Option<String> {
        let attr: String = [
            (self.pad, ATTR_PAD),
            (self.hidden, ATTR_HIDDEN),
            (self.executable, ATTR_EXECUTABLE),
            (self.symlink, ATTR_SYMLINK),
        ]
        .iter()
        .filter(|(set, _)| *set)
        .map(|(_, c)| *c)
        .collect();

        (!attr.is_empty()).then_some(attr)
    }

    /// Parses an `attr` string. Unknown flags are ignored.
    pub fn from_attr(attr: &str) -> Self {
        Self {
            pad: attr.contains(ATTR_PAD),
            hidden: attr.contains(ATTR_HIDDEN),
            executable: attr.contains(ATTR_EXECUTABLE),
            symlink: attr.contains(ATTR_SYMLINK),
        }
    }
}

/// One entry of a torrent's file list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// Path segments relative to the torrent root.
    pub path: Vec<String>,
    pub size: u64,
    /// Byte offset of the first byte of this file in the concatenated payload.
    pub offset: u64,
    pub attributes: FileAttributes,
    /// Modification time in seconds since the Unix epoch.
    pub mtime: Option<i64>,
    /// Link target as path segments relative to the torrent root. Set only
    /// on symlink entries.
    pub symlink_target: Option<Vec<String>>,
    /// SHA-1 of the whole file content, when the creator supplied one.
    pub sha1: Option<[u8; 20]>,
}

impl FileEntry {
    pub(crate) fn new(path: Vec<String>, size: u64, attributes: FileAttributes) -> Self {
        Self {
            path,
            size,
            offset: 0,
            attributes,
            mtime: None,
            symlink_target: None,
            sha1: None,
        }
    }

    pub fn is_pad(&self) -> bool {
        self.attributes.pad
    }

    pub fn is_symlink(&self) -> bool {
        self.attributes.symlink
    }

    pub fn byte_range(&self) -> std::ops::Range<u64> {
        self.offset..self.offset + self.size
    }

    pub fn contains_offset(&self, offset: u64) -> bool {
        self.byte_range().contains(&offset)
    }

    /// Path segments joined with `/`.
    pub fn display_path(&self) -> String {
        self.path.join("/")
    }
}

/// A contiguous region of one file that belongs to a piece.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileSlice {
    pub file_index: usize,
    /// Offset within the file.
    pub offset: u64,
    pub length: u64,
}
