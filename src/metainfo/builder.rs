//! Assembles `.torrent` files from a hashed file list.
//!
//! Creating a torrent is a two step process: hash the payload with a
//! [`PieceHasher`](crate::hasher::PieceHasher), then hand the file list and
//! the resulting [`PieceLayout`] to a [`MetainfoBuilder`] together with
//! trackers, seeds and other metadata.
//!
//! # Examples
//!
//! ```
//! use metaforge::hasher::{MemorySource, PieceHasher};
//! use metaforge::metainfo::{MetainfoBuilder, Metainfo};
//! use metaforge::storage::FileStorage;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut storage = FileStorage::new("album");
//! let mut source = MemorySource::new();
//! source.add_file(&mut storage, "01.flac", vec![1u8; 40_000])?;
//! source.add_file(&mut storage, "02.flac", vec![2u8; 25_000])?;
//! storage.pad_files(16384, None)?;
//!
//! let layout = PieceHasher::new(storage.clone(), 16384, source).run(|_| {})?;
//! let torrent = MetainfoBuilder::new(&storage, layout)?
//!     .add_tracker("http://tracker.example.com/announce", 0)
//!     .comment("test album")
//!     .build()?;
//!
//! let parsed = Metainfo::from_bytes(&torrent)?;
//! assert_eq!(parsed.files(false).count(), 2);
//! # Ok(())
//! # }
//! ```

use super::error::MetainfoError;
use super::info_hash::InfoHash;
use super::torrent::Metainfo;
use crate::bencode::{encode, Value};
use crate::constants::CREATED_BY;
use crate::hasher::PieceLayout;
use crate::storage::{FileEntry, FileStorage};
use bytes::Bytes;
use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

/// Builder for creating torrent files.
///
/// The `info` dictionary is fixed when the builder is created; the setters
/// only touch top-level fields, except for [`private`](Self::private) and
/// [`extra_info_field`](Self::extra_info_field), which change the info hash.
#[derive(Debug, Clone)]
pub struct MetainfoBuilder {
    info: BTreeMap<Bytes, Value>,
    /// Tracker URLs with their tier, kept sorted by tier.
    trackers: Vec<(String, u32)>,
    comment: Option<String>,
    created_by: Option<String>,
    creation_date: Option<i64>,
    /// Web seed URLs (BEP-19).
    url_seeds: Vec<String>,
    /// HTTP seed URLs (BEP-17).
    http_seeds: Vec<String>,
    nodes: Vec<(String, u16)>,
    extra: BTreeMap<Bytes, Value>,
}

impl MetainfoBuilder {
    /// Creates a builder for `storage` hashed into `layout`.
    ///
    /// Multi-file storages produce a `files` list in which padding entries
    /// carry the `p` attribute. A single-file torrent is named after its
    /// file.
    ///
    /// # Errors
    ///
    /// Fails when the storage is empty or unnamed, or when `layout` does not
    /// have exactly one hash per piece of `storage`.
    pub fn new(storage: &FileStorage, layout: PieceLayout) -> Result<Self, MetainfoError> {
        let piece_length = layout.piece_length();
        if piece_length == 0 {
            return Err(MetainfoError::InvalidField("piece length"));
        }

        let expected = storage.piece_count(piece_length);
        let actual = layout.num_pieces() as u64;
        if expected != actual {
            return Err(MetainfoError::PieceCountMismatch { expected, actual });
        }

        let mut info = BTreeMap::new();
        info.insert(
            Bytes::from_static(b"piece length"),
            Value::try_from_u64(piece_length)?,
        );
        info.insert(Bytes::from_static(b"pieces"), Value::Bytes(layout.to_blob()));

        if storage.is_multi_file() {
            if storage.name().is_empty() {
                return Err(MetainfoError::MissingField("name"));
            }
            info.insert(Bytes::from_static(b"name"), Value::string(storage.name()));
            info.insert(Bytes::from_static(b"files"), files_list(storage)?);
        } else {
            let file = storage
                .entries()
                .first()
                .ok_or(MetainfoError::MissingField("files"))?;
            info.insert(Bytes::from_static(b"name"), Value::string(&file.display_path()));
            info.insert(Bytes::from_static(b"length"), Value::try_from_u64(file.size)?);
            insert_file_fields(&mut info, file);
        }

        Ok(Self::with_info(info))
    }

    /// Re-wraps a parsed torrent for editing its top-level fields.
    ///
    /// The info dictionary is carried over verbatim, so the info hash stays
    /// the same unless [`private`](Self::private) or
    /// [`extra_info_field`](Self::extra_info_field) are used.
    pub fn from_metainfo(metainfo: &Metainfo) -> Self {
        let mut builder = Self::with_info(metainfo.info_dict().clone());

        for (tier, urls) in metainfo.announce_list.iter().enumerate() {
            let tier = u32::try_from(tier).unwrap_or(u32::MAX);
            builder
                .trackers
                .extend(urls.iter().map(|url| (url.clone(), tier)));
        }
        if let Some(ref announce) = metainfo.announce {
            if !builder.trackers.iter().any(|(url, _)| url == announce) {
                builder.trackers.insert(0, (announce.clone(), 0));
            }
        }

        builder.comment = metainfo.comment.clone();
        builder.created_by = metainfo.created_by.clone();
        builder.creation_date = metainfo.creation_date;
        builder.url_seeds = metainfo.url_seeds.clone();
        builder.http_seeds = metainfo.http_seeds.clone();
        builder.nodes = metainfo.nodes.clone();
        builder.extra = metainfo.extra.clone();
        builder
    }

    fn with_info(info: BTreeMap<Bytes, Value>) -> Self {
        Self {
            info,
            trackers: Vec::new(),
            comment: None,
            created_by: Some(CREATED_BY.to_string()),
            creation_date: Some(now()),
            url_seeds: Vec::new(),
            http_seeds: Vec::new(),
            nodes: Vec::new(),
            extra: BTreeMap::new(),
        }
    }

    /// Adds a tracker in the given tier.
    ///
    /// Trackers are ordered by tier, keeping insertion order within a tier.
    /// The first one becomes `announce`; with more than one tracker an
    /// `announce-list` grouped by tier is written too.
    pub fn add_tracker(mut self, url: impl Into<String>, tier: u32) -> Self {
        self.trackers.push((url.into(), tier));
        self.trackers.sort_by_key(|(_, tier)| *tier);
        self
    }

    /// Sets the torrent comment. An empty comment is omitted.
    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Sets the creator string. An empty string omits the field.
    pub fn created_by(mut self, created_by: impl Into<String>) -> Self {
        self.created_by = Some(created_by.into());
        self
    }

    /// Sets the creation date (Unix timestamp), or omits it with `None`.
    ///
    /// Defaults to the time the builder was created.
    pub fn creation_date(mut self, timestamp: Option<i64>) -> Self {
        self.creation_date = timestamp;
        self
    }

    /// Adds a web seed URL (BEP-19).
    pub fn add_url_seed(mut self, url: impl Into<String>) -> Self {
        self.url_seeds.push(url.into());
        self
    }

    /// Adds an HTTP seed URL (BEP-17).
    pub fn add_http_seed(mut self, url: impl Into<String>) -> Self {
        self.http_seeds.push(url.into());
        self
    }

    /// Adds a DHT bootstrap node.
    pub fn add_node(mut self, host: impl Into<String>, port: u16) -> Self {
        self.nodes.push((host.into(), port));
        self
    }

    /// Sets whether this is a private torrent.
    pub fn private(mut self, private: bool) -> Self {
        if private {
            self.info
                .insert(Bytes::from_static(b"private"), Value::Integer(1));
        } else {
            self.info.remove(b"private".as_slice());
        }
        self
    }

    /// Sets an arbitrary top-level key.
    pub fn extra_field(mut self, key: impl Into<Bytes>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    /// Sets an arbitrary key inside the info dictionary.
    pub fn extra_info_field(mut self, key: impl Into<Bytes>, value: Value) -> Self {
        self.info.insert(key.into(), value);
        self
    }

    /// Returns the info hash of the torrent being built.
    pub fn info_hash(&self) -> Result<InfoHash, MetainfoError> {
        let raw = encode(&Value::Dict(self.info.clone()))?;
        Ok(InfoHash::from_info_bytes(&raw))
    }

    /// Assembles the top-level metainfo dictionary.
    pub fn generate(&self) -> Result<Value, MetainfoError> {
        let mut root = self.extra.clone();
        root.insert(Bytes::from_static(b"info"), Value::Dict(self.info.clone()));

        // Announce
        if let Some((announce, _)) = self.trackers.first() {
            root.insert(Bytes::from_static(b"announce"), Value::string(announce));
        }

        // Announce-list
        if self.trackers.len() > 1 {
            let mut tiers: Vec<Vec<Value>> = Vec::new();
            let mut current = None;
            for (url, tier) in &self.trackers {
                if current != Some(*tier) {
                    tiers.push(Vec::new());
                    current = Some(*tier);
                }
                if let Some(last) = tiers.last_mut() {
                    last.push(Value::string(url));
                }
            }
            root.insert(
                Bytes::from_static(b"announce-list"),
                Value::List(tiers.into_iter().map(Value::List).collect()),
            );
        }

        if let Some(comment) = self.comment.as_deref().filter(|c| !c.is_empty()) {
            root.insert(Bytes::from_static(b"comment"), Value::string(comment));
        }

        if let Some(created_by) = self.created_by.as_deref().filter(|c| !c.is_empty()) {
            root.insert(Bytes::from_static(b"created by"), Value::string(created_by));
        }

        if let Some(timestamp) = self.creation_date {
            root.insert(
                Bytes::from_static(b"creation date"),
                Value::Integer(timestamp),
            );
        }

        if let Some(seeds) = string_or_list(&self.url_seeds) {
            root.insert(Bytes::from_static(b"url-list"), seeds);
        }
        if let Some(seeds) = string_or_list(&self.http_seeds) {
            root.insert(Bytes::from_static(b"httpseeds"), seeds);
        }

        if !self.nodes.is_empty() {
            let nodes = self
                .nodes
                .iter()
                .map(|(host, port)| {
                    Value::List(vec![Value::string(host), Value::Integer(i64::from(*port))])
                })
                .collect();
            root.insert(Bytes::from_static(b"nodes"), Value::List(nodes));
        }

        tracing::debug!(
            info_hash = %self.info_hash()?,
            trackers = self.trackers.len(),
            "generated metainfo"
        );

        Ok(Value::Dict(root))
    }

    /// Builds the torrent file and returns the bencoded bytes.
    pub fn build(&self) -> Result<Vec<u8>, MetainfoError> {
        Ok(encode(&self.generate()?)?)
    }
}

fn files_list(storage: &FileStorage) -> Result<Value, MetainfoError> {
    let files = storage
        .entries()
        .iter()
        .map(|file| -> Result<Value, MetainfoError> {
            let mut file_dict = BTreeMap::new();
            file_dict.insert(Bytes::from_static(b"length"), Value::try_from_u64(file.size)?);

            let path_list = file.path.iter().map(|p| Value::string(p)).collect();
            file_dict.insert(Bytes::from_static(b"path"), Value::List(path_list));
            insert_file_fields(&mut file_dict, file);

            Ok(Value::Dict(file_dict))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Value::List(files))
}

/// Writes `attr`, `mtime`, `sha1` and `symlink path` when the entry has them.
fn insert_file_fields(dict: &mut BTreeMap<Bytes, Value>, file: &FileEntry) {
    if let Some(attr) = file.attributes.to_attr() {
        dict.insert(Bytes::from_static(b"attr"), Value::from(attr));
    }
    if let Some(mtime) = file.mtime {
        dict.insert(Bytes::from_static(b"mtime"), Value::Integer(mtime));
    }
    if let Some(sha1) = &file.sha1 {
        dict.insert(
            Bytes::from_static(b"sha1"),
            Value::Bytes(Bytes::copy_from_slice(sha1)),
        );
    }
    if let Some(target) = file.symlink_target.as_ref().filter(|_| file.is_symlink()) {
        let segments = target.iter().map(|s| Value::string(s)).collect();
        dict.insert(Bytes::from_static(b"symlink path"), Value::List(segments));
    }
}

/// One URL is written as a plain string, several as a list.
fn string_or_list(urls: &[String]) -> Option<Value> {
    match urls {
        [] => None,
        [url] => Some(Value::string(url)),
        _ => Some(Value::List(urls.iter().map(|u| Value::string(u)).collect())),
    }
}

fn now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hasher::{MemorySource, PieceHasher};

    fn hashed(files: &[(&str, usize)], piece_length: u64) -> (FileStorage, PieceLayout) {
        let mut storage = FileStorage::new("test");
        let mut source = MemorySource::new();
        for (path, size) in files {
            source.add_file(&mut storage, path, vec![0xabu8; *size]).unwrap();
        }
        let layout = PieceHasher::new(storage.clone(), piece_length, source)
            .run(|_| {})
            .unwrap();
        (storage, layout)
    }

    #[test]
    fn test_builder_single_file() {
        let (storage, layout) = hashed(&[("hello.txt", 21)], 16384);
        let value = MetainfoBuilder::new(&storage, layout)
            .unwrap()
            .generate()
            .unwrap();

        let info = value.get(b"info").unwrap();
        assert_eq!(info.get(b"name").and_then(|v| v.as_str()), Some("hello.txt"));
        assert_eq!(info.get(b"length").and_then(|v| v.as_integer()), Some(21));
        assert_eq!(info.get(b"pieces").and_then(|v| v.as_bytes()).map(|b| b.len()), Some(20));
        assert!(info.get(b"files").is_none());
    }

    #[test]
    fn test_builder_multi_file_with_padding() {
        let (mut storage, _) = hashed(&[("a.bin", 100), ("b.bin", 100)], 64);
        storage.pad_files(64, None).unwrap();
        let layout = PieceLayout::new(64, vec![[0u8; 20]; 4]);

        let value = MetainfoBuilder::new(&storage, layout)
            .unwrap()
            .generate()
            .unwrap();
        let files = value
            .get(b"info")
            .and_then(|info| info.get(b"files"))
            .and_then(|f| f.as_list())
            .unwrap();

        assert_eq!(files.len(), 3);
        let pad = &files[1];
        assert_eq!(pad.get(b"attr").and_then(|v| v.as_str()), Some("p"));
        assert_eq!(pad.get(b"length").and_then(|v| v.as_integer()), Some(28));
        let path: Vec<_> = pad
            .get(b"path")
            .and_then(|p| p.as_list())
            .unwrap()
            .iter()
            .filter_map(|s| s.as_str())
            .collect();
        assert_eq!(path, [".pad", "28"]);
        assert!(files[0].get(b"attr").is_none());
    }

    #[test]
    fn test_builder_writes_file_metadata() {
        let (mut storage, _) = hashed(&[("a.bin", 100), ("b.bin", 100)], 64);
        storage.add_symlink("current", "a.bin").unwrap();
        storage.set_mtime(0, Some(1_600_000_000)).unwrap();
        storage.set_file_hash(1, Some([9u8; 20])).unwrap();
        let layout = PieceLayout::new(64, vec![[0u8; 20]; 4]);

        let value = MetainfoBuilder::new(&storage, layout)
            .unwrap()
            .generate()
            .unwrap();
        let files = value
            .get(b"info")
            .and_then(|info| info.get(b"files"))
            .and_then(|f| f.as_list())
            .unwrap();

        assert_eq!(files[0].get(b"mtime").and_then(|v| v.as_integer()), Some(1_600_000_000));
        assert!(files[0].get(b"sha1").is_none());
        assert_eq!(
            files[1].get(b"sha1").and_then(|v| v.as_bytes()).map(|b| b.to_vec()),
            Some(vec![9u8; 20])
        );

        let link = &files[2];
        assert_eq!(link.get(b"attr").and_then(|v| v.as_str()), Some("l"));
        assert_eq!(link.get(b"length").and_then(|v| v.as_integer()), Some(0));
        let target: Vec<_> = link
            .get(b"symlink path")
            .and_then(|p| p.as_list())
            .unwrap()
            .iter()
            .filter_map(|s| s.as_str())
            .collect();
        assert_eq!(target, ["a.bin"]);
    }

    #[test]
    fn test_builder_rejects_wrong_piece_count() {
        let (storage, _) = hashed(&[("a.bin", 40000)], 16384);
        let result = MetainfoBuilder::new(&storage, PieceLayout::new(16384, vec![[0u8; 20]; 2]));
        assert!(matches!(
            result,
            Err(MetainfoError::PieceCountMismatch {
                expected: 3,
                actual: 2
            })
        ));
    }

    #[test]
    fn test_builder_rejects_empty_storage() {
        let storage = FileStorage::new("empty");
        let result = MetainfoBuilder::new(&storage, PieceLayout::new(16384, Vec::new()));
        assert!(matches!(result, Err(MetainfoError::MissingField("files"))));
    }

    #[test]
    fn test_builder_tracker_tiers() {
        let (storage, layout) = hashed(&[("a", 10)], 16384);
        let value = MetainfoBuilder::new(&storage, layout)
            .unwrap()
            .add_tracker("http://backup/announce", 1)
            .add_tracker("http://primary/announce", 0)
            .add_tracker("http://secondary/announce", 0)
            .generate()
            .unwrap();

        assert_eq!(
            value.get(b"announce").and_then(|v| v.as_str()),
            Some("http://primary/announce")
        );
        let tiers: Vec<Vec<&str>> = value
            .get(b"announce-list")
            .and_then(|v| v.as_list())
            .unwrap()
            .iter()
            .map(|tier| {
                tier.as_list()
                    .unwrap()
                    .iter()
                    .filter_map(|u| u.as_str())
                    .collect()
            })
            .collect();
        assert_eq!(
            tiers,
            vec![
                vec!["http://primary/announce", "http://secondary/announce"],
                vec!["http://backup/announce"],
            ]
        );
    }

    #[test]
    fn test_builder_single_tracker_has_no_announce_list() {
        let (storage, layout) = hashed(&[("a", 10)], 16384);
        let value = MetainfoBuilder::new(&storage, layout)
            .unwrap()
            .add_tracker("http://only/announce", 0)
            .generate()
            .unwrap();
        assert!(value.get(b"announce").is_some());
        assert!(value.get(b"announce-list").is_none());
    }

    #[test]
    fn test_builder_optional_fields() {
        let (storage, layout) = hashed(&[("a", 10)], 16384);
        let value = MetainfoBuilder::new(&storage, layout)
            .unwrap()
            .comment("")
            .created_by("")
            .creation_date(None)
            .generate()
            .unwrap();
        let root = value.as_dict().unwrap();
        assert_eq!(root.keys().collect::<Vec<_>>(), [&Bytes::from_static(b"info")]);

        let (storage, layout) = hashed(&[("a", 10)], 16384);
        let value = MetainfoBuilder::new(&storage, layout)
            .unwrap()
            .comment("hello")
            .creation_date(Some(1_700_000_000))
            .generate()
            .unwrap();
        assert_eq!(value.get(b"comment").and_then(|v| v.as_str()), Some("hello"));
        assert_eq!(value.get(b"created by").and_then(|v| v.as_str()), Some(CREATED_BY));
        assert_eq!(
            value.get(b"creation date").and_then(|v| v.as_integer()),
            Some(1_700_000_000)
        );
    }

    #[test]
    fn test_builder_seeds_and_nodes() {
        let (storage, layout) = hashed(&[("a", 10)], 16384);
        let value = MetainfoBuilder::new(&storage, layout)
            .unwrap()
            .add_url_seed("http://seed/one")
            .add_http_seed("http://http-seed/a")
            .add_http_seed("http://http-seed/b")
            .add_node("router.example.com", 6881)
            .generate()
            .unwrap();

        assert_eq!(
            value.get(b"url-list").and_then(|v| v.as_str()),
            Some("http://seed/one")
        );
        assert_eq!(
            value.get(b"httpseeds").and_then(|v| v.as_list()).map(|l| l.len()),
            Some(2)
        );
        let node = &value.get(b"nodes").and_then(|v| v.as_list()).unwrap()[0];
        assert_eq!(
            node,
            &Value::List(vec![Value::string("router.example.com"), Value::Integer(6881)])
        );
    }

    #[test]
    fn test_private_changes_info_hash() {
        let (storage, layout) = hashed(&[("a", 10)], 16384);
        let public = MetainfoBuilder::new(&storage, layout).unwrap();
        let private = public.clone().private(true);

        assert_ne!(public.info_hash().unwrap(), private.info_hash().unwrap());
        assert_eq!(
            public.info_hash().unwrap(),
            private.private(false).info_hash().unwrap()
        );
    }

    #[test]
    fn test_top_level_fields_do_not_change_info_hash() {
        let (storage, layout) = hashed(&[("a", 10)], 16384);
        let plain = MetainfoBuilder::new(&storage, layout).unwrap();
        let decorated = plain
            .clone()
            .add_tracker("http://t/announce", 0)
            .comment("c")
            .extra_field("source", Value::string("archive"));

        assert_eq!(plain.info_hash().unwrap(), decorated.info_hash().unwrap());
        assert_eq!(
            decorated
                .generate()
                .unwrap()
                .get(b"source")
                .and_then(|v| v.as_str()),
            Some("archive")
        );
    }
}
