use super::*;
use crate::bencode::{encode, DecodeError, DecodeMode, Decoder, Value};
use crate::hasher::{MemorySource, PieceHasher, PieceLayout};
use crate::storage::FileStorage;
use bytes::Bytes;
use std::collections::BTreeSet;

fn dict(pairs: Vec<(&'static str, Value)>) -> Value {
    Value::Dict(
        pairs
            .into_iter()
            .map(|(k, v)| (Bytes::from_static(k.as_bytes()), v))
            .collect(),
    )
}

fn single_info(length: i64, piece_length: i64, pieces: usize) -> Value {
    dict(vec![
        ("name", "file.bin".into()),
        ("length", length.into()),
        ("piece length", piece_length.into()),
        ("pieces", Value::bytes(vec![7u8; pieces * 20])),
    ])
}

fn multi_info(files: Vec<Value>, pieces: usize) -> Value {
    dict(vec![
        ("name", "dir".into()),
        ("files", Value::List(files)),
        ("piece length", 16384i64.into()),
        ("pieces", Value::bytes(vec![7u8; pieces * 20])),
    ])
}

fn file(path: &[&str], length: i64) -> Value {
    dict(vec![
        ("length", length.into()),
        ("path", Value::List(path.iter().map(|s| Value::string(s)).collect())),
    ])
}

fn torrent(info: Value) -> Vec<u8> {
    encode(&dict(vec![("info", info)])).unwrap()
}

fn build_album(pad: bool) -> (FileStorage, Vec<u8>, InfoHash) {
    let mut storage = FileStorage::new("album");
    let mut source = MemorySource::new();
    source.add_file(&mut storage, "01 intro.flac", vec![1u8; 1000]).unwrap();
    source.add_file(&mut storage, "disc2/02 song.flac", vec![2u8; 3000]).unwrap();
    source.add_file(&mut storage, "cover.jpg", vec![3u8; 17]).unwrap();
    if pad {
        storage.pad_files(1024, None).unwrap();
    }

    let layout = PieceHasher::new(storage.clone(), 1024, source)
        .run(|_| {})
        .unwrap();
    let builder = MetainfoBuilder::new(&storage, layout)
        .unwrap()
        .add_tracker("http://tracker.example.com/announce", 0)
        .creation_date(Some(1_600_000_000));
    let hash = builder.info_hash().unwrap();
    (storage, builder.build().unwrap(), hash)
}

#[test]
fn test_build_parse_roundtrip() {
    let (storage, bytes, hash) = build_album(false);
    let metainfo = Metainfo::from_bytes(&bytes).unwrap();

    assert_eq!(metainfo.info_hash, hash);
    assert_eq!(metainfo.info.name, "album");
    assert_eq!(metainfo.info.piece_length, 1024);
    assert!(metainfo.info.is_multi_file());
    assert_eq!(metainfo.total_size(), 4017);
    assert_eq!(metainfo.info.piece_count(), 4);
    assert_eq!(metainfo.info.files.entries(), storage.entries());
    assert_eq!(metainfo.creation_date, Some(1_600_000_000));
    assert_eq!(
        metainfo.created_by.as_deref(),
        Some(crate::constants::CREATED_BY)
    );
    assert_eq!(
        metainfo.trackers(),
        vec!["http://tracker.example.com/announce".to_string()]
    );
    assert!(metainfo.piece_hash(3).is_some());
    assert!(metainfo.piece_hash(4).is_none());
}

#[test]
fn test_build_is_deterministic() {
    let (_, first, first_hash) = build_album(true);
    let (_, second, second_hash) = build_album(true);
    assert_eq!(first, second);
    assert_eq!(first_hash, second_hash);
}

#[test]
fn test_padding_alignment_and_filtering() {
    let (storage, bytes, _) = build_album(true);
    let metainfo = Metainfo::from_bytes(&bytes).unwrap();

    let pads: Vec<_> = metainfo.files(true).filter(|f| f.is_pad()).collect();
    assert_eq!(pads.len(), 2);
    for pad in pads {
        assert_eq!((pad.offset + pad.size) % 1024, 0);
        assert_eq!(pad.path[0], crate::constants::PAD_DIR);
    }

    let real: BTreeSet<String> = metainfo.files(false).map(|f| f.display_path()).collect();
    let original: BTreeSet<String> = storage.real_files().map(|f| f.display_path()).collect();
    assert_eq!(real, original);
    assert_eq!(real.len(), 3);

    let aligned = metainfo
        .files(false)
        .skip(1)
        .all(|f| f.offset % 1024 == 0);
    assert!(aligned);
}

#[test]
fn test_info_hash_ignores_source_key_order() {
    let mut sorted = b"d4:infod6:lengthi5e4:name1:a12:piece lengthi16384e6:pieces20:".to_vec();
    sorted.extend_from_slice(&[9u8; 20]);
    sorted.extend_from_slice(b"ee");

    let mut shuffled = b"d4:infod6:pieces20:".to_vec();
    shuffled.extend_from_slice(&[9u8; 20]);
    shuffled.extend_from_slice(b"12:piece lengthi16384e4:name1:a6:lengthi5eee");

    let a = Metainfo::from_bytes(&sorted).unwrap();
    let b = Metainfo::from_bytes(&shuffled).unwrap();

    assert_eq!(a.info_hash, b.info_hash);
    assert_eq!(a.raw_info(), b.raw_info());
    assert_eq!(
        a.info_hash,
        InfoHash::from_info_bytes(&sorted[b"d4:info".len()..sorted.len() - 1])
    );
}

#[test]
fn test_single_file_parse() {
    let metainfo = Metainfo::from_bytes(&torrent(single_info(40000, 16384, 3))).unwrap();

    assert!(!metainfo.info.is_multi_file());
    let files: Vec<_> = metainfo.files(true).collect();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].path, vec!["file.bin".to_string()]);
    assert_eq!(files[0].size, 40000);
    assert_eq!(metainfo.piece_hash(2), Some(&[7u8; 20]));
    assert!(!metainfo.info.private);
}

#[test]
fn test_auxiliary_fields() {
    let value = dict(vec![
        ("info", single_info(10, 16384, 1)),
        ("announce", "http://a/announce".into()),
        (
            "announce-list",
            Value::List(vec![
                Value::List(vec!["http://a/announce".into(), "http://b/announce".into()]),
                Value::List(vec!["http://c/announce".into()]),
            ]),
        ),
        ("url-list", "http://seed/file.bin".into()),
        (
            "httpseeds",
            Value::List(vec!["http://h1".into(), "http://h2".into()]),
        ),
        (
            "nodes",
            Value::List(vec![
                Value::List(vec!["127.0.0.1".into(), 6881i64.into()]),
                Value::List(vec!["bad".into(), 70000i64.into()]),
            ]),
        ),
        ("comment", "hi".into()),
        ("source", "archive".into()),
    ]);
    let metainfo = Metainfo::from_bytes(&encode(&value).unwrap()).unwrap();

    assert_eq!(
        metainfo.trackers(),
        ["http://a/announce", "http://b/announce", "http://c/announce"]
    );
    assert_eq!(metainfo.url_seeds, ["http://seed/file.bin"]);
    assert_eq!(metainfo.http_seeds, ["http://h1", "http://h2"]);
    assert_eq!(metainfo.nodes, vec![("127.0.0.1".to_string(), 6881)]);
    assert_eq!(metainfo.comment.as_deref(), Some("hi"));
    assert_eq!(metainfo.extra.len(), 1);
    assert_eq!(
        metainfo.extra.get(b"source".as_slice()).and_then(|v| v.as_str()),
        Some("archive")
    );
}

#[test]
fn test_rebuild_keeps_info_hash() {
    let mut info = single_info(10, 16384, 1);
    if let Value::Dict(ref mut d) = info {
        d.insert(Bytes::from_static(b"x-custom"), Value::string("kept"));
    }
    let bytes = encode(&dict(vec![
        ("info", info),
        ("announce", "http://a/announce".into()),
        ("source", "archive".into()),
    ]))
    .unwrap();
    let original = Metainfo::from_bytes(&bytes).unwrap();
    assert!(original.info.extra.contains_key(b"x-custom".as_slice()));

    let rebuilt = MetainfoBuilder::from_metainfo(&original)
        .comment("edited")
        .add_tracker("http://b/announce", 1)
        .build()
        .unwrap();
    let rebuilt = Metainfo::from_bytes(&rebuilt).unwrap();

    assert_eq!(rebuilt.info_hash, original.info_hash);
    assert_eq!(rebuilt.comment.as_deref(), Some("edited"));
    assert_eq!(rebuilt.trackers(), ["http://a/announce", "http://b/announce"]);
    assert!(rebuilt.extra.contains_key(b"source".as_slice()));
}

#[test]
fn test_private_flag() {
    let mut storage = FileStorage::new("p");
    storage.add_file("p.bin", 5).unwrap();
    let layout = PieceLayout::new(16384, vec![[0u8; 20]]);
    let bytes = MetainfoBuilder::new(&storage, layout)
        .unwrap()
        .private(true)
        .build()
        .unwrap();
    assert!(Metainfo::from_bytes(&bytes).unwrap().info.private);
}

#[test]
fn test_rejects_non_dict_root() {
    assert!(matches!(
        Metainfo::from_bytes(b"li1ee"),
        Err(MetainfoError::InvalidField("root"))
    ));
}

#[test]
fn test_rejects_missing_info() {
    let bytes = encode(&dict(vec![("announce", "http://a".into())])).unwrap();
    assert!(matches!(
        Metainfo::from_bytes(&bytes),
        Err(MetainfoError::MissingInfoDict)
    ));
}

#[test]
fn test_rejects_invalid_info_fields() {
    assert!(matches!(
        Metainfo::from_bytes(&torrent(single_info(10, 0, 1))),
        Err(MetainfoError::InvalidField("piece length"))
    ));
    assert!(matches!(
        Metainfo::from_bytes(&torrent(single_info(10, -5, 1))),
        Err(MetainfoError::InvalidField("piece length"))
    ));
    assert!(matches!(
        Metainfo::from_bytes(&torrent(single_info(-1, 16384, 1))),
        Err(MetainfoError::InvalidField("length"))
    ));

    let mut info = single_info(10, 16384, 1);
    if let Value::Dict(ref mut d) = info {
        d.insert(Bytes::from_static(b"pieces"), Value::bytes(vec![0u8; 21]));
    }
    assert!(matches!(
        Metainfo::from_bytes(&torrent(info)),
        Err(MetainfoError::InvalidField("pieces"))
    ));

    let mut info = single_info(10, 16384, 1);
    if let Value::Dict(ref mut d) = info {
        d.remove(b"name".as_slice());
    }
    assert!(matches!(
        Metainfo::from_bytes(&torrent(info)),
        Err(MetainfoError::MissingField("name"))
    ));

    let mut info = single_info(10, 16384, 1);
    if let Value::Dict(ref mut d) = info {
        d.remove(b"length".as_slice());
    }
    assert!(matches!(
        Metainfo::from_bytes(&torrent(info)),
        Err(MetainfoError::MissingField("length or files"))
    ));
}

#[test]
fn test_rejects_piece_count_mismatch() {
    assert!(matches!(
        Metainfo::from_bytes(&torrent(single_info(20000, 16384, 1))),
        Err(MetainfoError::PieceCountMismatch {
            expected: 2,
            actual: 1
        })
    ));
    assert!(matches!(
        Metainfo::from_bytes(&torrent(single_info(100, 16384, 2))),
        Err(MetainfoError::PieceCountMismatch {
            expected: 1,
            actual: 2
        })
    ));
}

#[test]
fn test_rejects_malformed_file_list() {
    let cases = [
        (vec![file(&["ok"], 1), Value::Integer(3)], 1),
        (vec![file(&["neg"], -1)], 0),
        (vec![file(&[], 1)], 0),
        (vec![file(&["ok"], 1), file(&["..", "etc"], 1)], 1),
        (vec![file(&["a/b"], 1)], 0),
    ];

    for (files, bad_index) in cases {
        match Metainfo::from_bytes(&torrent(multi_info(files, 1))) {
            Err(MetainfoError::MalformedFileList { index, .. }) => assert_eq!(index, bad_index),
            other => panic!("expected malformed file list, got {other:?}"),
        }
    }

    let missing_path = dict(vec![("length", 1i64.into())]);
    assert!(matches!(
        Metainfo::from_bytes(&torrent(multi_info(vec![missing_path], 1))),
        Err(MetainfoError::MalformedFileList { index: 0, .. })
    ));
}

#[test]
fn test_latin1_name_is_repaired_without_changing_info_hash() {
    let mut raw_info = b"d6:lengthi1e4:name3:c\xe9t12:piece lengthi16384e6:pieces20:".to_vec();
    raw_info.extend_from_slice(&[b'a'; 20]);
    raw_info.push(b'e');

    let mut bytes = b"d4:info".to_vec();
    bytes.extend_from_slice(&raw_info);
    bytes.push(b'e');

    let metainfo = Metainfo::from_bytes(&bytes).unwrap();
    assert_eq!(metainfo.info.name, "c\u{FFFD}t");
    assert_eq!(metainfo.raw_info().as_ref(), raw_info.as_slice());
    assert_eq!(metainfo.info_hash, InfoHash::from_info_bytes(&raw_info));

    let rebuilt = MetainfoBuilder::from_metainfo(&metainfo).info_hash().unwrap();
    assert_eq!(rebuilt, metainfo.info_hash);
}

#[test]
fn test_non_utf8_path_segments_and_utf8_alternatives() {
    let latin1 = dict(vec![
        ("length", 1i64.into()),
        ("path", Value::List(vec![Value::bytes(b"caf\xe9.txt".to_vec())])),
    ]);
    let with_alternative = dict(vec![
        ("length", 1i64.into()),
        ("path", Value::List(vec![Value::bytes(b"na\xefve.txt".to_vec())])),
        ("path.utf-8", Value::List(vec![Value::string("naïve.txt")])),
    ]);
    let mut info = multi_info(vec![latin1, with_alternative], 1);
    if let Value::Dict(ref mut d) = info {
        d.insert(Bytes::from_static(b"name"), Value::bytes(b"r\xe9pertoire".to_vec()));
        d.insert(Bytes::from_static(b"name.utf-8"), Value::string("répertoire"));
    }

    let metainfo = Metainfo::from_bytes(&torrent(info)).unwrap();
    assert_eq!(metainfo.info.name, "répertoire");
    let paths: Vec<String> = metainfo.files(false).map(|f| f.display_path()).collect();
    assert_eq!(paths, vec!["caf\u{FFFD}.txt", "naïve.txt"]);

    let mut info = single_info(10, 16384, 1);
    if let Value::Dict(ref mut d) = info {
        d.insert(Bytes::from_static(b"name"), Value::Integer(5));
    }
    assert!(matches!(
        Metainfo::from_bytes(&torrent(info)),
        Err(MetainfoError::InvalidField("name"))
    ));
}

#[test]
fn test_file_metadata_roundtrip() {
    let mut storage = FileStorage::new("release");
    let mut source = MemorySource::new();
    source.add_file(&mut storage, "bin/tool", vec![5u8; 3000]).unwrap();
    source.add_file(&mut storage, "README", vec![6u8; 200]).unwrap();
    storage.add_symlink("tool", "bin/tool").unwrap();
    storage.set_mtime(0, Some(1_650_000_000)).unwrap();
    storage.set_mtime(2, Some(1_650_000_100)).unwrap();
    storage.set_file_hash(1, Some([0x42; 20])).unwrap();

    let layout = PieceHasher::new(storage.clone(), 1024, source)
        .run(|_| {})
        .unwrap();
    let bytes = MetainfoBuilder::new(&storage, layout).unwrap().build().unwrap();
    let metainfo = Metainfo::from_bytes(&bytes).unwrap();

    assert_eq!(metainfo.info.files.entries(), storage.entries());
    let link = &metainfo.info.files.entries()[2];
    assert!(link.is_symlink());
    assert_eq!(
        link.symlink_target,
        Some(vec!["bin".to_string(), "tool".to_string()])
    );
    assert_eq!(link.mtime, Some(1_650_000_100));
    assert_eq!(metainfo.info.files.entries()[1].sha1, Some([0x42; 20]));
    assert_eq!(metainfo.total_size(), 3200);
}

#[test]
fn test_symlink_entries_validation() {
    let link = |length: i64, target: Option<&str>| {
        let mut pairs = vec![
            ("length", length.into()),
            ("path", Value::List(vec![Value::string("link")])),
            ("attr", "l".into()),
        ];
        if let Some(target) = target {
            pairs.push(("symlink path", Value::List(vec![Value::string(target)])));
        }
        dict(pairs)
    };

    assert!(matches!(
        Metainfo::from_bytes(&torrent(multi_info(vec![file(&["a"], 1), link(5, Some("a"))], 1))),
        Err(MetainfoError::MalformedFileList { index: 1, .. })
    ));
    assert!(matches!(
        Metainfo::from_bytes(&torrent(multi_info(vec![file(&["a"], 1), link(0, Some(".."))], 1))),
        Err(MetainfoError::MalformedFileList { index: 1, .. })
    ));

    // A link flag without a target leaves an ordinary file.
    let metainfo =
        Metainfo::from_bytes(&torrent(multi_info(vec![file(&["a"], 1), link(4, None)], 1))).unwrap();
    let entry = &metainfo.info.files.entries()[1];
    assert!(!entry.is_symlink());
    assert_eq!(entry.size, 4);
    assert_eq!(entry.symlink_target, None);

    let mut info = single_info(10, 16384, 1);
    if let Value::Dict(ref mut d) = info {
        d.insert(Bytes::from_static(b"mtime"), Value::Integer(-3));
        d.insert(Bytes::from_static(b"sha1"), Value::bytes(vec![1u8; 19]));
    }
    let metainfo = Metainfo::from_bytes(&torrent(info)).unwrap();
    assert_eq!(metainfo.info.files.entries()[0].mtime, Some(-3));
    assert_eq!(metainfo.info.files.entries()[0].sha1, None);
    assert!(metainfo.info.extra.is_empty());
}

#[test]
fn test_strict_and_lenient_duplicate_keys() {
    let info = encode(&single_info(10, 16384, 1)).unwrap();
    let mut bytes = b"d7:comment1:a7:comment1:b4:info".to_vec();
    bytes.extend_from_slice(&info);
    bytes.push(b'e');

    assert!(matches!(
        Metainfo::from_bytes(&bytes),
        Err(MetainfoError::Decode(DecodeError::DuplicateKey { .. }))
    ));

    let metainfo =
        Metainfo::from_decoder(Decoder::new(&bytes).mode(DecodeMode::Lenient)).unwrap();
    assert_eq!(metainfo.comment.as_deref(), Some("b"));
}

#[test]
fn test_truncated_torrent() {
    let bytes = torrent(single_info(10, 16384, 1));
    assert!(matches!(
        Metainfo::from_bytes(&bytes[..bytes.len() - 5]),
        Err(MetainfoError::Decode(_))
    ));
}
