use std::io::{self, ErrorKind, Read, Seek, SeekFrom};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use sha1::{Digest, Sha1};

use super::error::HashError;
use super::layout::PieceLayout;
use super::source::PieceSource;
use crate::storage::FileStorage;

/// Completion of one piece, passed to the progress callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PieceProgress {
    /// Index of the piece that was just hashed.
    pub index: u64,
    /// Pieces completed so far, this one included.
    pub completed: u64,
    pub total: u64,
}

/// Shared flag for stopping a hashing run from another thread.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// What a worker does when a piece cannot be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OnReadFailure {
    Abort,
    MarkMissing,
}

/// Computes the SHA-1 digest of every piece of a [`FileStorage`].
///
/// Pieces are hashed by a bounded pool of threads. Each worker claims the
/// next piece index, reads only that piece's byte range (crossing file
/// boundaries as needed, with padding entries read as zeros) into its own
/// `piece_length` buffer, and reports the digest back to the calling thread,
/// which stores it and invokes the progress callback.
///
/// # Examples
///
/// ```no_run
/// use metaforge::hasher::{DiskSource, PieceHasher};
/// use metaforge::storage::FileStorage;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let storage = FileStorage::from_directory("downloads/album")?;
/// let hasher = PieceHasher::new(storage, 256 * 1024, DiskSource::new("downloads")).workers(4);
///
/// let layout = hasher.run(|p| println!("{}/{}", p.completed, p.total))?;
/// println!("{} pieces", layout.num_pieces());
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct PieceHasher<S> {
    storage: FileStorage,
    piece_length: u64,
    source: S,
    workers: Option<usize>,
    cancel: CancelToken,
}

impl<S: PieceSource> PieceHasher<S> {
    pub fn new(storage: FileStorage, piece_length: u64, source: S) -> Self {
        Self {
            storage,
            piece_length,
            source,
            workers: None,
            cancel: CancelToken::new(),
        }
    }

    /// Sets the number of worker threads.
    ///
    /// Defaults to the available parallelism. Never more threads than pieces
    /// are started.
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers.max(1));
        self
    }

    /// Uses `token` to stop hashing early; the run then fails with
    /// [`HashError::Cancelled`].
    pub fn cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn storage(&self) -> &FileStorage {
        &self.storage
    }

    pub fn piece_length(&self) -> u64 {
        self.piece_length
    }

    /// Hashes every piece and returns the completed layout.
    ///
    /// `progress` is called on the calling thread once per piece, in
    /// completion order.
    ///
    /// # Errors
    ///
    /// The first read failure aborts the whole run with
    /// [`HashError::SourceReadFailed`]; cancellation yields
    /// [`HashError::Cancelled`]. No partial layout is returned.
    pub fn run<F>(&self, mut progress: F) -> Result<PieceLayout, HashError>
    where
        F: FnMut(PieceProgress),
    {
        let total = self.storage.piece_count(self.piece_length);
        let mut pieces = vec![[0u8; 20]; usize::try_from(total).map_err(|_| HashError::InvalidPieceLength)?];
        let mut completed = 0;

        self.hash_pieces(OnReadFailure::Abort, |index, digest| {
            if let Some(digest) = digest {
                pieces[index as usize] = digest;
            }
            completed += 1;
            progress(PieceProgress {
                index,
                completed,
                total,
            });
        })?;

        Ok(PieceLayout::new(self.piece_length, pieces))
    }

    /// Re-hashes the payload and compares it against `expected`.
    ///
    /// Returns one flag per piece. Pieces whose files are missing or short
    /// are reported as `false` instead of failing the run.
    pub fn verify(&self, expected: &PieceLayout) -> Result<Vec<bool>, HashError> {
        let total = self.storage.piece_count(self.piece_length);
        if expected.piece_length() != self.piece_length || expected.num_pieces() as u64 != total {
            return Err(HashError::LayoutMismatch {
                expected: total,
                piece_length: self.piece_length,
            });
        }

        let mut results = vec![false; expected.num_pieces()];
        self.hash_pieces(OnReadFailure::MarkMissing, |index, digest| {
            let index = index as usize;
            results[index] = digest.as_ref() == expected.hash(index);
        })?;

        let valid = results.iter().filter(|ok| **ok).count();
        tracing::debug!(valid, total, "verification complete");
        Ok(results)
    }

    fn worker_count(&self, total: u64) -> usize {
        let wanted = self.workers.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        });
        wanted.min(usize::try_from(total).unwrap_or(usize::MAX)).max(1)
    }

    fn hash_pieces<F>(&self, on_failure: OnReadFailure, mut on_piece: F) -> Result<(), HashError>
    where
        F: FnMut(u64, Option<[u8; 20]>),
    {
        if self.piece_length == 0 {
            return Err(HashError::InvalidPieceLength);
        }
        let buffer_len =
            usize::try_from(self.piece_length).map_err(|_| HashError::InvalidPieceLength)?;

        let total = self.storage.piece_count(self.piece_length);
        if total == 0 {
            return Ok(());
        }

        let workers = self.worker_count(total);
        let started = Instant::now();
        tracing::debug!(
            name = self.storage.name(),
            pieces = total,
            piece_length = self.piece_length,
            workers,
            "hashing pieces"
        );

        let next = AtomicU64::new(0);
        let stop = AtomicBool::new(false);
        let failure: Mutex<Option<HashError>> = Mutex::new(None);
        let mut completed = 0u64;

        let scope_result = crossbeam::scope(|scope| {
            // Dropped if `on_piece` unwinds, so blocked senders fail and exit.
            let (tx, rx) = crossbeam::channel::bounded::<(u64, Option<[u8; 20]>)>(workers * 2);

            for _ in 0..workers {
                let tx = tx.clone();
                let (next, stop, failure) = (&next, &stop, &failure);

                scope.spawn(move |_| {
                    let mut reader = WorkerReader::new(&self.source, &self.storage);
                    let mut buf = vec![0u8; buffer_len];

                    loop {
                        if stop.load(Ordering::Relaxed) || self.cancel.is_cancelled() {
                            break;
                        }
                        let index = next.fetch_add(1, Ordering::Relaxed);
                        if index >= total {
                            break;
                        }

                        let digest = match self.hash_piece(index, &mut reader, &mut buf) {
                            Ok(digest) => Some(digest),
                            Err(e @ HashError::SourceReadFailed { .. })
                                if on_failure == OnReadFailure::MarkMissing =>
                            {
                                tracing::trace!(piece = index, error = %e, "piece unreadable");
                                None
                            }
                            Err(e) => {
                                tracing::warn!(piece = index, error = %e, "piece hashing failed");
                                stop.store(true, Ordering::Relaxed);
                                failure.lock().get_or_insert(e);
                                break;
                            }
                        };

                        if tx.send((index, digest)).is_err() {
                            break;
                        }
                    }
                });
            }
            drop(tx);

            for (index, digest) in rx.iter() {
                completed += 1;
                on_piece(index, digest);
            }
        });

        if scope_result.is_err() {
            return Err(HashError::WorkerFailed("hashing thread panicked".into()));
        }
        if let Some(e) = failure.into_inner() {
            return Err(e);
        }
        if completed < total {
            tracing::debug!(completed, total, "hashing cancelled");
            return Err(HashError::Cancelled);
        }

        tracing::debug!(
            pieces = total,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "hashing complete"
        );
        Ok(())
    }

    fn hash_piece(
        &self,
        index: u64,
        reader: &mut WorkerReader<'_, S>,
        buf: &mut [u8],
    ) -> Result<[u8; 20], HashError> {
        let size = self.storage.piece_size(self.piece_length, index) as usize;
        let piece = &mut buf[..size];
        let mut filled = 0usize;

        for slice in self.storage.map_piece(self.piece_length, index)? {
            let len = slice.length as usize;
            let dst = &mut piece[filled..filled + len];
            if self.storage.entries()[slice.file_index].is_pad() {
                dst.fill(0);
            } else {
                reader.read_at(slice.file_index, slice.offset, dst)?;
            }
            filled += len;
        }

        Ok(Sha1::digest(piece).into())
    }
}

impl<S> PieceHasher<S>
where
    S: PieceSource + 'static,
{
    /// Runs [`run`](Self::run) on tokio's blocking thread pool.
    pub async fn run_async<F>(self, progress: F) -> Result<PieceLayout, HashError>
    where
        F: FnMut(PieceProgress) + Send + 'static,
    {
        tokio::task::spawn_blocking(move || self.run(progress))
            .await
            .map_err(|e| HashError::WorkerFailed(e.to_string()))?
    }
}

/// A worker's open file, reused while consecutive reads hit the same entry.
struct WorkerReader<'a, S: PieceSource> {
    source: &'a S,
    storage: &'a FileStorage,
    current: Option<(usize, S::Reader)>,
}

impl<'a, S: PieceSource> WorkerReader<'a, S> {
    fn new(source: &'a S, storage: &'a FileStorage) -> Self {
        Self {
            source,
            storage,
            current: None,
        }
    }

    fn read_at(&mut self, file_index: usize, offset: u64, dst: &mut [u8]) -> Result<(), HashError> {
        let storage = self.storage;
        let failed = |offset: u64, source: io::Error| HashError::SourceReadFailed {
            path: storage.entries()[file_index].display_path(),
            offset,
            source,
        };

        let reader = match &mut self.current {
            Some((index, reader)) if *index == file_index => reader,
            current => {
                let reader = self
                    .source
                    .open(storage, file_index)
                    .map_err(|e| failed(offset, e))?;
                &mut current.insert((file_index, reader)).1
            }
        };

        reader
            .seek(SeekFrom::Start(offset))
            .map_err(|e| failed(offset, e))?;

        let mut filled = 0;
        while filled < dst.len() {
            match reader.read(&mut dst[filled..]) {
                Ok(0) => {
                    return Err(failed(
                        offset + filled as u64,
                        io::Error::new(ErrorKind::UnexpectedEof, "file is shorter than its listed size"),
                    ))
                }
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(failed(offset + filled as u64, e)),
            }
        }
        Ok(())
    }
}
