use std::fs;
use std::path::{Component, Path, PathBuf};
use std::time::UNIX_EPOCH;

use super::error::StorageError;
use super::file::{FileAttributes, FileEntry, FileSlice};
use crate::constants::{
    MAX_FILE_SIZE, MAX_PIECE_LENGTH, MIN_PIECE_LENGTH, PAD_DIR, PIECE_HASH_LEN,
    TARGET_PIECES_BLOB_SIZE,
};

/// The ordered file list of a torrent.
///
/// Entries keep the order they were added in. Each entry's offset is the sum
/// of the sizes before it, padding entries included, so the list describes
/// one contiguous logical byte stream of [`total_size`](Self::total_size)
/// bytes.
///
/// # Examples
///
/// ```
/// use metaforge::storage::FileStorage;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let mut storage = FileStorage::new("album");
/// storage.add_file("01.flac", 40_000)?;
/// storage.add_file("02.flac", 30_000)?;
/// storage.pad_files(16384, None)?;
///
/// assert_eq!(storage.num_files(), 3);
/// assert_eq!(storage.entries()[2].offset, 49152);
/// assert_eq!(storage.real_files().count(), 2);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStorage {
    name: String,
    entries: Vec<FileEntry>,
    total_size: u64,
    multi_file: bool,
}

impl FileStorage {
    /// Creates an empty file list for a torrent called `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: Vec::new(),
            total_size: 0,
            multi_file: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Appends a regular file.
    ///
    /// `path` is relative to the torrent root. Only plain components are
    /// allowed; `..`, `.`, roots and prefixes are rejected.
    ///
    /// # Errors
    ///
    /// Fails if the path is invalid, or if `size` exceeds
    /// [`MAX_FILE_SIZE`] or would push the total past it.
    pub fn add_file(&mut self, path: impl AsRef<Path>, size: u64) -> Result<(), StorageError> {
        self.add_file_with_attributes(path, size, FileAttributes::default())
    }

    pub fn add_file_with_attributes(
        &mut self,
        path: impl AsRef<Path>,
        size: u64,
        attributes: FileAttributes,
    ) -> Result<(), StorageError> {
        let segments = path_segments(path.as_ref())?;
        self.add_entry(segments, size, attributes)
    }

    /// Appends an entry given as explicit path segments.
    pub fn add_entry(
        &mut self,
        path: Vec<String>,
        size: u64,
        attributes: FileAttributes,
    ) -> Result<(), StorageError> {
        self.push_entry(FileEntry::new(path, size, attributes))
    }

    /// Appends a symbolic link pointing at `target`, both relative to the
    /// torrent root. The entry has no payload.
    pub fn add_symlink(
        &mut self,
        path: impl AsRef<Path>,
        target: impl AsRef<Path>,
    ) -> Result<(), StorageError> {
        let path = path_segments(path.as_ref())?;
        let target = path_segments(target.as_ref())?;
        self.add_symlink_entry(path, target, FileAttributes::default())
    }

    /// Appends a symbolic link given as explicit path segments. The symlink
    /// flag is set on `attributes`.
    pub fn add_symlink_entry(
        &mut self,
        path: Vec<String>,
        target: Vec<String>,
        attributes: FileAttributes,
    ) -> Result<(), StorageError> {
        let attributes = FileAttributes {
            symlink: true,
            ..attributes
        };
        self.push_entry(FileEntry {
            symlink_target: Some(target),
            ..FileEntry::new(path, 0, attributes)
        })
    }

    fn push_entry(&mut self, mut entry: FileEntry) -> Result<(), StorageError> {
        validate_segments(&entry.path)?;
        if let Some(target) = &entry.symlink_target {
            validate_segments(target)?;
        }

        let offset = self.total_size;
        let total_size = offset
            .checked_add(entry.size)
            .filter(|total| *total <= MAX_FILE_SIZE)
            .ok_or_else(|| StorageError::NegativeOrOverflowingSize {
                path: entry.display_path(),
                size: entry.size,
            })?;

        entry.offset = offset;
        self.entries.push(entry);
        self.total_size = total_size;
        Ok(())
    }

    /// Sets the modification time (seconds since the Unix epoch) of entry `index`.
    pub fn set_mtime(&mut self, index: usize, mtime: Option<i64>) -> Result<(), StorageError> {
        self.entry_mut(index)?.mtime = mtime;
        Ok(())
    }

    /// Sets the whole-file SHA-1 of entry `index`, written as the per-file
    /// `sha1` key.
    pub fn set_file_hash(&mut self, index: usize, sha1: Option<[u8; 20]>) -> Result<(), StorageError> {
        self.entry_mut(index)?.sha1 = sha1;
        Ok(())
    }

    fn entry_mut(&mut self, index: usize) -> Result<&mut FileEntry, StorageError> {
        self.entries
            .get_mut(index)
            .ok_or(StorageError::InvalidFileIndex(index))
    }

    /// Inserts a padding entry in front of the real file at `before_index`
    /// so that it starts on a piece boundary.
    ///
    /// Returns the size of the inserted padding, or `0` when the file is
    /// already aligned, in which case nothing is inserted.
    ///
    /// # Errors
    ///
    /// Padding is only valid between files: `before_index` must point at a
    /// real file other than the first.
    pub fn insert_padding(
        &mut self,
        before_index: usize,
        piece_length: u64,
    ) -> Result<u64, StorageError> {
        if piece_length == 0 {
            return Err(StorageError::InvalidPieceLength);
        }
        let entry = self
            .entries
            .get(before_index)
            .filter(|e| before_index > 0 && !e.is_pad())
            .ok_or(StorageError::InvalidPaddingIndex(before_index))?;

        let pad_size = (piece_length - entry.offset % piece_length) % piece_length;
        if pad_size == 0 {
            return Ok(0);
        }

        let total_size = self
            .total_size
            .checked_add(pad_size)
            .filter(|total| *total <= MAX_FILE_SIZE)
            .ok_or_else(|| StorageError::NegativeOrOverflowingSize {
                path: entry.display_path(),
                size: pad_size,
            })?;

        self.entries.insert(
            before_index,
            FileEntry::new(
                vec![PAD_DIR.to_string(), pad_size.to_string()],
                pad_size,
                FileAttributes::padding(),
            ),
        );
        self.total_size = total_size;
        self.multi_file = true;
        self.recompute_offsets();
        Ok(pad_size)
    }

    /// Aligns real files to piece boundaries by inserting padding entries.
    ///
    /// Every real file after the first whose size exceeds `limit` gets a
    /// padding entry in front of it; with `limit` of `None` every non-empty
    /// file is aligned. File order is preserved. Returns the number of
    /// padding entries inserted.
    pub fn pad_files(&mut self, piece_length: u64, limit: Option<u64>) -> Result<usize, StorageError> {
        if piece_length == 0 {
            return Err(StorageError::InvalidPieceLength);
        }

        let threshold = limit.unwrap_or(0);
        let mut inserted = 0;
        let mut index = 1;

        while index < self.entries.len() {
            let entry = &self.entries[index];
            if !entry.is_pad() && entry.size > threshold {
                if self.insert_padding(index, piece_length)? > 0 {
                    inserted += 1;
                    index += 1;
                }
            }
            index += 1;
        }

        Ok(inserted)
    }

    fn recompute_offsets(&mut self) {
        let mut offset = 0;
        for entry in &mut self.entries {
            entry.offset = offset;
            offset += entry.size;
        }
        self.total_size = offset;
    }

    /// Forces the multi-file layout even for a single top-level file.
    pub fn set_multi_file(&mut self, multi_file: bool) {
        self.multi_file = multi_file;
    }

    /// Whether the torrent is written with a `files` list rather than a
    /// single `length`.
    pub fn is_multi_file(&self) -> bool {
        self.multi_file || self.entries.len() > 1 || self.entries.iter().any(|e| e.path.len() > 1)
    }

    /// All entries, padding included.
    pub fn entries(&self) -> &[FileEntry] {
        &self.entries
    }

    /// Entries that carry real payload.
    pub fn real_files(&self) -> impl Iterator<Item = &FileEntry> {
        self.entries.iter().filter(|e| !e.is_pad())
    }

    pub fn num_files(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of all entry sizes, padding included.
    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    /// Index of the entry holding the byte at `offset`.
    ///
    /// Empty files hold no bytes and are never returned.
    pub fn file_at_offset(&self, offset: u64) -> Option<usize> {
        if offset >= self.total_size {
            return None;
        }
        Some(
            self.entries
                .partition_point(|e| e.offset + e.size <= offset),
        )
    }

    /// Number of pieces of `piece_length` bytes needed to cover the payload.
    pub fn piece_count(&self, piece_length: u64) -> u64 {
        if piece_length == 0 {
            return 0;
        }
        self.total_size.div_ceil(piece_length)
    }

    /// Length of piece `index`; only the last piece may be short.
    pub fn piece_size(&self, piece_length: u64, index: u64) -> u64 {
        let start = index.saturating_mul(piece_length);
        self.total_size.saturating_sub(start).min(piece_length)
    }

    /// Maps piece `index` to the file regions it covers, in payload order.
    pub fn map_piece(&self, piece_length: u64, index: u64) -> Result<Vec<FileSlice>, StorageError> {
        if piece_length == 0 {
            return Err(StorageError::InvalidPieceLength);
        }
        if index >= self.piece_count(piece_length) {
            return Err(StorageError::InvalidPieceIndex(index));
        }

        let mut current = index * piece_length;
        let mut remaining = self.piece_size(piece_length, index);
        let first = self
            .file_at_offset(current)
            .ok_or(StorageError::InvalidPieceIndex(index))?;

        let mut slices = Vec::new();
        for (file_index, file) in self.entries.iter().enumerate().skip(first) {
            if remaining == 0 {
                break;
            }
            if file.size == 0 {
                continue;
            }

            let take = remaining.min(file.offset + file.size - current);
            slices.push(FileSlice {
                file_index,
                offset: current - file.offset,
                length: take,
            });
            current += take;
            remaining -= take;
        }

        Ok(slices)
    }

    /// Builds a file list from a file or directory on disk.
    ///
    /// Same as [`from_directory_with`](Self::from_directory_with) using
    /// [`ScanOptions::default`].
    pub fn from_directory(root: impl AsRef<Path>) -> Result<Self, StorageError> {
        Self::from_directory_with(root, ScanOptions::default())
    }

    /// Builds a file list from a file or directory on disk.
    ///
    /// A regular file gives a single-file torrent named after it. A
    /// directory is walked recursively; entries are added in sorted path
    /// order under a torrent named after the directory. Dot-files are marked
    /// hidden and, on Unix, files with an execute bit are marked executable.
    ///
    /// Symbolic links below the root are never followed. Links resolving
    /// inside the root become symlink entries; the rest are skipped.
    pub fn from_directory_with(
        root: impl AsRef<Path>,
        options: ScanOptions,
    ) -> Result<Self, StorageError> {
        let root = root.as_ref();
        let root = fs::canonicalize(root).map_err(io_error(root))?;
        let metadata = fs::metadata(&root).map_err(io_error(&root))?;
        let name = utf8_file_name(&root)?;

        let mut storage = Self::new(name.clone());
        if metadata.is_file() {
            let attributes = disk_attributes(&name, &metadata);
            storage.push_entry(FileEntry {
                mtime: options.mtime(&metadata),
                ..FileEntry::new(vec![name], metadata.len(), attributes)
            })?;
            return Ok(storage);
        }

        let mut found = Vec::new();
        walk_directory(&root, &root, &mut Vec::new(), options, &mut found)?;
        found.sort_by(|a, b| a.path.cmp(&b.path));

        storage.set_multi_file(true);
        for entry in found {
            storage.push_entry(entry)?;
        }

        tracing::debug!(
            root = %root.display(),
            files = storage.num_files(),
            total_size = storage.total_size(),
            "enumerated torrent files"
        );
        Ok(storage)
    }
}

/// What a directory scan records besides paths and sizes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanOptions {
    /// Record each entry's modification time, written as `mtime`.
    pub modification_times: bool,
    /// Leave symbolic links out instead of recording them as symlink entries.
    pub skip_symlinks: bool,
}

impl ScanOptions {
    fn mtime(&self, metadata: &fs::Metadata) -> Option<i64> {
        if !self.modification_times {
            return None;
        }
        let modified = metadata.modified().ok()?;
        let since_epoch = modified.duration_since(UNIX_EPOCH).ok()?;
        i64::try_from(since_epoch.as_secs()).ok()
    }
}

/// Picks a piece length for a payload of `total_size` bytes.
///
/// Returns the smallest power of two in
/// [`MIN_PIECE_LENGTH`]..=[`MAX_PIECE_LENGTH`] that keeps the `pieces` blob
/// within [`TARGET_PIECES_BLOB_SIZE`].
///
/// ```
/// use metaforge::storage::auto_piece_length;
///
/// assert_eq!(auto_piece_length(0), 16 * 1024);
/// assert_eq!(auto_piece_length(1 << 30), 512 * 1024);
/// ```
pub fn auto_piece_length(total_size: u64) -> u64 {
    let max_pieces = TARGET_PIECES_BLOB_SIZE / PIECE_HASH_LEN as u64;
    let mut piece_length = MIN_PIECE_LENGTH;
    while piece_length < MAX_PIECE_LENGTH && total_size.div_ceil(piece_length) > max_pieces {
        piece_length *= 2;
    }
    piece_length
}

fn path_segments(path: &Path) -> Result<Vec<String>, StorageError> {
    let invalid = |reason| StorageError::InvalidPath {
        path: path.display().to_string(),
        reason,
    };

    path.components()
        .map(|c| match c {
            Component::Normal(s) => s
                .to_str()
                .map(String::from)
                .ok_or_else(|| invalid("not valid UTF-8")),
            _ => Err(invalid("only plain relative components are allowed")),
        })
        .collect()
}

fn validate_segments(segments: &[String]) -> Result<(), StorageError> {
    let invalid = |reason| StorageError::InvalidPath {
        path: segments.join("/"),
        reason,
    };

    if segments.is_empty() {
        return Err(invalid("empty path"));
    }
    for segment in segments {
        if segment.is_empty() || segment == "." || segment == ".." {
            return Err(invalid("empty or relative segment"));
        }
        if segment.contains(['/', '\\', '\0']) {
            return Err(invalid("separator inside a segment"));
        }
    }
    Ok(())
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> StorageError + '_ {
    move |source| StorageError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn utf8_file_name(path: &Path) -> Result<String, StorageError> {
    path.file_name()
        .and_then(|s| s.to_str())
        .map(String::from)
        .ok_or_else(|| StorageError::InvalidPath {
            path: path.display().to_string(),
            reason: "no UTF-8 file name",
        })
}

fn disk_attributes(name: &str, metadata: &fs::Metadata) -> FileAttributes {
    #[cfg(unix)]
    let executable = {
        use std::os::unix::fs::PermissionsExt;
        metadata.permissions().mode() & 0o111 != 0
    };
    #[cfg(not(unix))]
    let executable = {
        let _ = metadata;
        false
    };

    FileAttributes {
        hidden: name.starts_with('.'),
        executable,
        ..FileAttributes::default()
    }
}

fn walk_directory(
    root: &Path,
    dir: &Path,
    prefix: &mut Vec<String>,
    options: ScanOptions,
    found: &mut Vec<FileEntry>,
) -> Result<(), StorageError> {
    for entry in fs::read_dir(dir).map_err(io_error(dir))? {
        let entry = entry.map_err(io_error(dir))?;
        let path = entry.path();
        let name = utf8_file_name(&path)?;
        let metadata = fs::symlink_metadata(&path).map_err(io_error(&path))?;
        let file_type = metadata.file_type();

        prefix.push(name.clone());
        if file_type.is_symlink() {
            if !options.skip_symlinks {
                match link_target(root, &path)? {
                    Some(target) => {
                        let attributes = FileAttributes {
                            hidden: name.starts_with('.'),
                            symlink: true,
                            ..FileAttributes::default()
                        };
                        found.push(FileEntry {
                            mtime: options.mtime(&metadata),
                            symlink_target: Some(target),
                            ..FileEntry::new(prefix.clone(), 0, attributes)
                        });
                    }
                    None => tracing::warn!(
                        path = %path.display(),
                        "skipping symlink that leads outside the torrent root"
                    ),
                }
            }
        } else if file_type.is_dir() {
            walk_directory(root, &path, prefix, options, found)?;
        } else if file_type.is_file() {
            found.push(FileEntry {
                mtime: options.mtime(&metadata),
                ..FileEntry::new(prefix.clone(), metadata.len(), disk_attributes(&name, &metadata))
            });
        }
        prefix.pop();
    }
    Ok(())
}

/// Resolves the link at `link` lexically and returns its target relative to
/// `root`, or `None` when it leads outside `root` or to the root itself.
fn link_target(root: &Path, link: &Path) -> Result<Option<Vec<String>>, StorageError> {
    let target = fs::read_link(link).map_err(io_error(link))?;
    let joined = match link.parent() {
        Some(parent) => parent.join(target),
        None => target,
    };

    let mut resolved = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::ParentDir => {
                resolved.pop();
            }
            Component::CurDir => {}
            other => resolved.push(other),
        }
    }

    let Ok(relative) = resolved.strip_prefix(root) else {
        return Ok(None);
    };
    Ok(path_segments(relative).ok().filter(|segments| !segments.is_empty()))
}
