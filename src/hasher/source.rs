use std::collections::HashMap;
use std::fs::File;
use std::io::{self, Cursor, Read, Seek};
use std::path::{Path, PathBuf};

use bytes::Bytes;

use crate::storage::{FileStorage, StorageError};

/// Where the hasher gets file content from.
///
/// Each hashing worker opens its own readers, so implementations only need
/// to hand out independent handles.
pub trait PieceSource: Send + Sync {
    type Reader: Read + Seek;

    /// Opens the entry at `file_index` of `storage` for reading.
    fn open(&self, storage: &FileStorage, file_index: usize) -> io::Result<Self::Reader>;
}

/// Reads files from disk below a base directory.
///
/// Single-file torrents are read from `base/<file>`, multi-file torrents from
/// `base/<name>/<path...>`. This matches the directory passed to
/// [`FileStorage::from_directory`] when `base` is its parent.
#[derive(Debug, Clone)]
pub struct DiskSource {
    base: PathBuf,
}

impl DiskSource {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    /// On-disk location of entry `file_index`.
    pub fn path_of(&self, storage: &FileStorage, file_index: usize) -> PathBuf {
        let mut path = self.base.clone();
        if storage.is_multi_file() {
            path.push(storage.name());
        }
        if let Some(entry) = storage.entries().get(file_index) {
            path.extend(&entry.path);
        }
        path
    }
}

impl PieceSource for DiskSource {
    type Reader = File;

    fn open(&self, storage: &FileStorage, file_index: usize) -> io::Result<File> {
        File::open(self.path_of(storage, file_index))
    }
}

/// Serves file content from memory, keyed by `/`-joined torrent path.
///
/// # Examples
///
/// ```
/// use metaforge::hasher::{MemorySource, PieceHasher};
/// use metaforge::storage::FileStorage;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let mut storage = FileStorage::new("hello");
/// let mut source = MemorySource::new();
/// source.add_file(&mut storage, "hello.txt", b"Hello, world!".to_vec())?;
///
/// let layout = PieceHasher::new(storage, 16384, source).run(|_| {})?;
/// assert_eq!(layout.num_pieces(), 1);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    files: HashMap<String, Bytes>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers content for the entry whose path is `path`.
    pub fn insert(&mut self, path: impl Into<String>, data: impl Into<Bytes>) {
        self.files.insert(path.into(), data.into());
    }

    /// Appends a file to `storage` and registers its content in one step.
    pub fn add_file(
        &mut self,
        storage: &mut FileStorage,
        path: impl AsRef<Path>,
        data: impl Into<Bytes>,
    ) -> Result<(), StorageError> {
        let data = data.into();
        storage.add_file(path, data.len() as u64)?;
        if let Some(entry) = storage.entries().last() {
            self.files.insert(entry.display_path(), data);
        }
        Ok(())
    }
}

impl PieceSource for MemorySource {
    type Reader = Cursor<Bytes>;

    fn open(&self, storage: &FileStorage, file_index: usize) -> io::Result<Cursor<Bytes>> {
        storage
            .entries()
            .get(file_index)
            .and_then(|entry| self.files.get(&entry.display_path()))
            .map(|data| Cursor::new(data.clone()))
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no content registered"))
    }
}
