use super::error::MetainfoError;
use super::info_hash::InfoHash;
use crate::bencode::{encode, Decoder, Value};
use crate::hasher::PieceLayout;
use crate::storage::{FileAttributes, FileEntry, FileStorage, StorageError};
use bytes::Bytes;
use std::collections::BTreeMap;

/// Top-level keys that are parsed into dedicated fields.
const KNOWN_KEYS: &[&[u8]] = &[
    b"info",
    b"announce",
    b"announce-list",
    b"comment",
    b"created by",
    b"creation date",
    b"url-list",
    b"httpseeds",
    b"nodes",
];

const KNOWN_INFO_KEYS: &[&[u8]] = &[
    b"name",
    b"piece length",
    b"pieces",
    b"length",
    b"files",
    b"private",
    b"attr",
    b"mtime",
    b"sha1",
    b"symlink path",
];

/// A parsed torrent file.
///
/// Contains all metadata from a `.torrent` file, including file information,
/// piece hashes, and tracker URLs.
///
/// # Examples
///
/// ```no_run
/// use metaforge::metainfo::Metainfo;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let data = std::fs::read("example.torrent")?;
/// let metainfo = Metainfo::from_bytes(&data)?;
///
/// println!("Torrent: {}", metainfo.info.name);
/// println!("Size: {} bytes", metainfo.total_size());
/// println!("Info hash: {}", metainfo.info_hash);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Metainfo {
    /// The info dictionary containing file and piece information.
    pub info: Info,
    /// The unique identifier for this torrent (hash of the info dictionary).
    pub info_hash: InfoHash,
    /// Primary tracker URL.
    pub announce: Option<String>,
    /// Multi-tier tracker list ([BEP-12](http://bittorrent.org/beps/bep_0012.html)).
    pub announce_list: Vec<Vec<String>>,
    /// Unix timestamp when the torrent was created.
    pub creation_date: Option<i64>,
    pub comment: Option<String>,
    /// Name/version of the program that created the torrent.
    pub created_by: Option<String>,
    /// Web seeds ([BEP-19](http://bittorrent.org/beps/bep_0019.html)).
    pub url_seeds: Vec<String>,
    /// HTTP seeds ([BEP-17](http://bittorrent.org/beps/bep_0017.html)).
    pub http_seeds: Vec<String>,
    /// DHT bootstrap nodes as `(host, port)`.
    pub nodes: Vec<(String, u16)>,
    /// Top-level keys this crate does not interpret, kept verbatim.
    pub extra: BTreeMap<Bytes, Value>,
    info_dict: BTreeMap<Bytes, Value>,
    raw_info: Bytes,
}

/// The info dictionary from a torrent file.
///
/// The SHA-1 hash of this dictionary (in canonical bencode) is the info hash.
#[derive(Debug, Clone)]
pub struct Info {
    /// Suggested name for the file or directory.
    pub name: String,
    pub piece_length: u64,
    pub pieces: PieceLayout,
    /// The file list, padding entries included.
    pub files: FileStorage,
    /// If true, clients should only use trackers in the metainfo (no DHT/PEX).
    pub private: bool,
    /// Info keys this crate does not interpret.
    pub extra: BTreeMap<Bytes, Value>,
}

impl Info {
    pub fn total_length(&self) -> u64 {
        self.files.total_size()
    }

    pub fn piece_count(&self) -> usize {
        self.pieces.num_pieces()
    }

    pub fn is_multi_file(&self) -> bool {
        self.files.is_multi_file()
    }
}

impl Metainfo {
    /// Parses a torrent file from raw bytes.
    ///
    /// Decoding is strict: any bencode irregularity is rejected. Use
    /// [`from_decoder`](Self::from_decoder) to parse legacy files leniently.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The data is not valid bencode
    /// - The top level is not a dictionary or has no `info` dictionary
    /// - Required fields are missing (name, piece length, pieces, length or files)
    /// - The pieces field length is not a multiple of 20, or its piece count
    ///   does not match the payload size
    /// - A `files` entry is malformed
    pub fn from_bytes(data: &[u8]) -> Result<Self, MetainfoError> {
        Self::from_decoder(Decoder::new(data))
    }

    /// Parses a torrent file with a configured decoder.
    ///
    /// ```
    /// use metaforge::bencode::{DecodeMode, Decoder};
    /// use metaforge::metainfo::Metainfo;
    ///
    /// let data = b"d4:infod6:lengthi1e4:name1:a12:piece lengthi16384e\
    ///              6:pieces20:aaaaaaaaaaaaaaaaaaaaee<garbage>";
    /// assert!(Metainfo::from_bytes(data).is_err());
    ///
    /// let lenient = Decoder::new(data).mode(DecodeMode::Lenient);
    /// let metainfo = Metainfo::from_decoder(lenient).unwrap();
    /// assert_eq!(metainfo.info.name, "a");
    /// ```
    pub fn from_decoder(decoder: Decoder<'_>) -> Result<Self, MetainfoError> {
        Self::from_value(decoder.decode()?)
    }

    /// Builds a metainfo from an already decoded value.
    pub fn from_value(value: Value) -> Result<Self, MetainfoError> {
        let mut dict = value
            .into_dict()
            .ok_or(MetainfoError::InvalidField("root"))?;

        let info_value = dict
            .remove(b"info".as_slice())
            .ok_or(MetainfoError::MissingInfoDict)?;
        let raw_info = Bytes::from(encode(&info_value)?);
        let info_hash = InfoHash::from_info_bytes(&raw_info);

        let info_dict = info_value
            .into_dict()
            .ok_or(MetainfoError::InvalidField("info"))?;
        let info = parse_info(&info_dict)?;

        let announce = dict
            .get(b"announce".as_slice())
            .and_then(|v| v.as_str())
            .map(String::from);

        let announce_list = dict
            .get(b"announce-list".as_slice())
            .and_then(|v| v.as_list())
            .map(|list| {
                list.iter()
                    .filter_map(|tier| tier.as_list().map(|urls| string_list(urls)))
                    .filter(|tier: &Vec<String>| !tier.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let creation_date = dict
            .get(b"creation date".as_slice())
            .and_then(|v| v.as_integer());

        let comment = dict
            .get(b"comment".as_slice())
            .and_then(|v| v.as_str())
            .map(String::from);

        let created_by = dict
            .get(b"created by".as_slice())
            .and_then(|v| v.as_str())
            .map(String::from);

        let url_seeds = string_or_list(dict.get(b"url-list".as_slice()));
        let http_seeds = string_or_list(dict.get(b"httpseeds".as_slice()));

        let nodes = dict
            .get(b"nodes".as_slice())
            .and_then(|v| v.as_list())
            .map(|list| list.iter().filter_map(parse_node).collect())
            .unwrap_or_default();

        let extra = dict
            .into_iter()
            .filter(|(key, _)| !KNOWN_KEYS.contains(&key.as_ref()))
            .collect();

        Ok(Self {
            info,
            info_hash,
            announce,
            announce_list,
            creation_date,
            comment,
            created_by,
            url_seeds,
            http_seeds,
            nodes,
            extra,
            info_dict,
            raw_info,
        })
    }

    /// Returns the canonical bencoding of the info dictionary.
    ///
    /// This is the byte sequence the info hash is computed over.
    pub fn raw_info(&self) -> &Bytes {
        &self.raw_info
    }

    pub(crate) fn info_dict(&self) -> &BTreeMap<Bytes, Value> {
        &self.info_dict
    }

    /// Returns all tracker URLs from both `announce` and `announce-list`.
    ///
    /// The primary tracker (from `announce`) comes first, followed by
    /// trackers from `announce-list`. Duplicates are removed.
    pub fn trackers(&self) -> Vec<String> {
        let mut trackers = Vec::new();

        if let Some(ref announce) = self.announce {
            trackers.push(announce.clone());
        }

        for tier in &self.announce_list {
            for tracker in tier {
                if !trackers.contains(tracker) {
                    trackers.push(tracker.clone());
                }
            }
        }

        trackers
    }

    /// Iterates over the file list, optionally skipping padding entries.
    pub fn files(&self, include_pads: bool) -> impl Iterator<Item = &FileEntry> + '_ {
        self.info
            .files
            .entries()
            .iter()
            .filter(move |entry| include_pads || !entry.is_pad())
    }

    /// Size of the payload, padding included.
    pub fn total_size(&self) -> u64 {
        self.info.total_length()
    }

    pub fn piece_hash(&self, index: usize) -> Option<&[u8; 20]> {
        self.info.pieces.hash(index)
    }
}

fn parse_info(dict: &BTreeMap<Bytes, Value>) -> Result<Info, MetainfoError> {
    let raw_name = dict
        .get(b"name".as_slice())
        .ok_or(MetainfoError::MissingField("name"))?;
    let name = utf8_alternative(dict.get(b"name.utf-8".as_slice()))
        .or_else(|| lossy_string(raw_name))
        .filter(|name| !name.is_empty())
        .ok_or(MetainfoError::InvalidField("name"))?;

    let piece_length = dict
        .get(b"piece length".as_slice())
        .ok_or(MetainfoError::MissingField("piece length"))?
        .as_integer()
        .and_then(|n| u64::try_from(n).ok())
        .filter(|n| *n > 0)
        .ok_or(MetainfoError::InvalidField("piece length"))?;

    let pieces_bytes = dict
        .get(b"pieces".as_slice())
        .ok_or(MetainfoError::MissingField("pieces"))?
        .as_bytes()
        .ok_or(MetainfoError::InvalidField("pieces"))?;

    let pieces = PieceLayout::from_blob(piece_length, pieces_bytes)
        .ok_or(MetainfoError::InvalidField("pieces"))?;

    let private = dict
        .get(b"private".as_slice())
        .and_then(|v| v.as_integer())
        .map(|v| v == 1)
        .unwrap_or(false);

    let files = if let Some(length) = dict.get(b"length".as_slice()) {
        single_file(&name, length, dict)?
    } else if let Some(files) = dict.get(b"files".as_slice()) {
        file_list(&name, files)?
    } else {
        return Err(MetainfoError::MissingField("length or files"));
    };

    let expected = files.piece_count(piece_length);
    let actual = pieces.num_pieces() as u64;
    if expected != actual {
        return Err(MetainfoError::PieceCountMismatch { expected, actual });
    }

    let extra = dict
        .iter()
        .filter(|(key, _)| !KNOWN_INFO_KEYS.contains(&key.as_ref()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    Ok(Info {
        name,
        piece_length,
        pieces,
        files,
        private,
        extra,
    })
}

fn single_file(
    name: &str,
    length: &Value,
    dict: &BTreeMap<Bytes, Value>,
) -> Result<FileStorage, MetainfoError> {
    let size = length
        .as_integer()
        .and_then(|n| u64::try_from(n).ok())
        .ok_or(MetainfoError::InvalidField("length"))?;

    let attributes = parse_attributes(dict.get(b"attr".as_slice()));
    let mut storage = FileStorage::new(name);
    let added = match symlink_target(attributes, dict) {
        Some(_) if size != 0 => return Err(MetainfoError::InvalidField("length")),
        Some(target) => storage.add_symlink_entry(vec![name.to_string()], target, attributes),
        None => storage.add_entry(vec![name.to_string()], size, plain(attributes)),
    };
    added.map_err(|e| match e {
        StorageError::InvalidPath { .. } => MetainfoError::InvalidField("name"),
        StorageError::NegativeOrOverflowingSize { .. } => MetainfoError::InvalidField("length"),
        other => other.into(),
    })?;
    file_metadata(&mut storage, dict)?;
    Ok(storage)
}

fn file_list(name: &str, files: &Value) -> Result<FileStorage, MetainfoError> {
    let list = files
        .as_list()
        .ok_or(MetainfoError::InvalidField("files"))?;

    let mut storage = FileStorage::new(name);
    storage.set_multi_file(true);

    for (index, entry) in list.iter().enumerate() {
        let malformed = |reason| MetainfoError::MalformedFileList { index, reason };

        let entry = entry
            .as_dict()
            .ok_or_else(|| malformed("entry is not a dictionary"))?;

        let length = entry
            .get(b"length".as_slice())
            .and_then(|v| v.as_integer())
            .ok_or_else(|| malformed("missing or non-integer length"))?;
        let size = u64::try_from(length).map_err(|_| malformed("negative length"))?;

        let segments = match utf8_segments(entry.get(b"path.utf-8".as_slice())) {
            Some(segments) => segments,
            None => {
                let path = entry
                    .get(b"path".as_slice())
                    .and_then(|v| v.as_list())
                    .ok_or_else(|| malformed("missing path list"))?;
                if path.is_empty() {
                    return Err(malformed("empty path"));
                }
                path.iter()
                    .map(lossy_string)
                    .collect::<Option<Vec<_>>>()
                    .ok_or_else(|| malformed("path segment is not a byte string"))?
            }
        };

        let attributes = parse_attributes(entry.get(b"attr".as_slice()));
        let added = match symlink_target(attributes, entry) {
            Some(_) if size != 0 => return Err(malformed("symlink with non-zero length")),
            Some(target) => storage.add_symlink_entry(segments, target, attributes),
            None => storage.add_entry(segments, size, plain(attributes)),
        };
        added.map_err(|e| match e {
            StorageError::InvalidPath { .. } => malformed("invalid path segment"),
            StorageError::NegativeOrOverflowingSize { .. } => malformed("total size out of range"),
            other => other.into(),
        })?;
        file_metadata(&mut storage, entry)?;
    }

    Ok(storage)
}

/// The `symlink path` of an entry flagged as a link. A link flag without a
/// target is ignored.
fn symlink_target(
    attributes: FileAttributes,
    dict: &BTreeMap<Bytes, Value>,
) -> Option<Vec<String>> {
    if !attributes.symlink {
        return None;
    }
    dict.get(b"symlink path".as_slice())
        .and_then(|v| v.as_list())
        .filter(|list| !list.is_empty())?
        .iter()
        .map(lossy_string)
        .collect()
}

fn plain(attributes: FileAttributes) -> FileAttributes {
    FileAttributes {
        symlink: false,
        ..attributes
    }
}

/// Applies `mtime` and `sha1` of a file dictionary to the last entry added.
/// Values of the wrong type or length are ignored.
fn file_metadata(
    storage: &mut FileStorage,
    dict: &BTreeMap<Bytes, Value>,
) -> Result<(), MetainfoError> {
    let index = storage.num_files().saturating_sub(1);
    let mtime = dict
        .get(b"mtime".as_slice())
        .and_then(|v| v.as_integer());
    let sha1 = dict
        .get(b"sha1".as_slice())
        .and_then(|v| v.as_bytes())
        .and_then(|b| <[u8; 20]>::try_from(&b[..]).ok());

    storage.set_mtime(index, mtime)?;
    storage.set_file_hash(index, sha1)?;
    Ok(())
}

/// Text of a byte string, with invalid UTF-8 sequences replaced.
fn lossy_string(value: &Value) -> Option<String> {
    value
        .as_bytes()
        .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
}

/// A `name.utf-8` value, used only when it is valid UTF-8.
fn utf8_alternative(value: Option<&Value>) -> Option<String> {
    value?.as_str().filter(|s| !s.is_empty()).map(String::from)
}

/// A `path.utf-8` list, used only when every segment is valid UTF-8.
fn utf8_segments(value: Option<&Value>) -> Option<Vec<String>> {
    let list = value?.as_list().filter(|list| !list.is_empty())?;
    list.iter()
        .map(|segment| segment.as_str().map(String::from))
        .collect()
}

fn parse_attributes(attr: Option<&Value>) -> FileAttributes {
    attr.and_then(|v| v.as_str())
        .map(FileAttributes::from_attr)
        .unwrap_or_default()
}

fn string_list(values: &[Value]) -> Vec<String> {
    values
        .iter()
        .filter_map(|v| v.as_str().map(String::from))
        .collect()
}

/// `url-list` and `httpseeds` hold either one string or a list of them.
fn string_or_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::List(list)) => string_list(list),
        Some(single) => single
            .as_str()
            .filter(|s| !s.is_empty())
            .map(|s| vec![s.to_string()])
            .unwrap_or_default(),
        None => Vec::new(),
    }
}

fn parse_node(value: &Value) -> Option<(String, u16)> {
    match value.as_list()?.as_slice() {
        [host, port] => {
            let host = host.as_str()?.to_string();
            let port = u16::try_from(port.as_integer()?).ok()?;
            Some((host, port))
        }
        _ => None,
    }
}
