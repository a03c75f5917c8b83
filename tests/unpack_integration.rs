mod common;

use std::fs;

use bagunpack::container::{Arena, DEFAULT_CAPACITY, decode, decode_to_vec};
use bagunpack::error::{Error, ErrorKind};
use bagunpack::io::DUMP_FILE_NAME;
use bagunpack::{UnpackOptions, Unpacker};
use common::{BlockBuilder, DDS, container, decoded, literal_container, write_file};
use tempfile::tempdir;

fn unpacker_into(out: &std::path::Path, dump: bool) -> Unpacker {
    Unpacker::new(UnpackOptions {
        dump,
        out_dir: Some(out.to_path_buf()),
        ..Default::default()
    })
}

#[test]
fn map_with_signature_at_44_extracts_dds() {
    let dir = tempdir().unwrap();
    let mut body = vec![0x5A; 32];
    body.extend_from_slice(&DDS);
    body.extend_from_slice(&[0x42; 64]);
    let src = write_file(dir.path(), "rock.bmap", &literal_container(&body));

    let mut unpacker = Unpacker::default();
    let report = unpacker.unpack_path(&src.to_string_lossy()).unwrap();
    assert_eq!(report.payload_offset, 44);

    let dds = fs::read(dir.path().join("rock.dds")).unwrap();
    assert_eq!(dds, decoded(&body)[44..]);
    assert_eq!(&dds[..5], &DDS);
    assert!(!dir.path().join("rock.raw.bmap").exists());
}

#[test]
fn map_without_signature_is_invalid_format() {
    let dir = tempdir().unwrap();
    let src = write_file(dir.path(), "plain.bmap", &literal_container(b"DDDS | nothing"));

    let mut unpacker = Unpacker::default();
    let err = unpacker.unpack_path(&src.to_string_lossy()).unwrap_err();
    assert!(matches!(err, Error::MissingSignature { .. }));
    assert_eq!(err.kind(), ErrorKind::InvalidFormat);
    assert!(!dir.path().join("plain.dds").exists());
}

#[test]
fn signature_found_at_37_after_match_expansion() {
    // 21 literal bytes, then a 4-byte match; the signature follows.
    let dir = tempdir().unwrap();
    let block = BlockBuilder::new()
        .token(b"abcdefghijklmnopqrstu", 4, 4)
        .last(&[b'D', b'D', b'S', 0x20, 0x7C, 9, 9]);
    let src = write_file(dir.path(), "tile.bmap", &container(0x04, &[block]));

    let mut unpacker = unpacker_into(dir.path(), false);
    let report = unpacker.unpack_path(&src.to_string_lossy()).unwrap();
    assert_eq!(report.payload_offset, 37);
    assert_eq!(report.asset.inflated_size, 37 + 7);
}

#[test]
fn non_map_asset_gets_raw_output() {
    let dir = tempdir().unwrap();
    let src = write_file(dir.path(), "tree.bmsh", &literal_container(b"mesh bytes"));

    let mut unpacker = Unpacker::default();
    unpacker.unpack_path(&src.to_string_lossy()).unwrap();
    assert_eq!(
        fs::read(dir.path().join("tree.raw.bmsh")).unwrap(),
        decoded(b"mesh bytes")
    );
}

#[test]
fn unpacking_twice_is_idempotent() {
    let dir = tempdir().unwrap();
    let block = BlockBuilder::new().token(b"xyz", 3, 30).last(b"tail");
    let src = write_file(dir.path(), "a.bmsh", &container(0x07, &[block]));
    let out = dir.path().join("a.raw.bmsh");

    let mut unpacker = Unpacker::default();
    unpacker.unpack_path(&src.to_string_lossy()).unwrap();
    let first = fs::read(&out).unwrap();
    unpacker.unpack_path(&src.to_string_lossy()).unwrap();
    assert_eq!(fs::read(&out).unwrap(), first);
}

#[test]
fn dump_concatenates_decoded_outputs() {
    let src_dir = tempdir().unwrap();
    let out_dir = tempdir().unwrap();
    let a = write_file(src_dir.path(), "one.bmap", &literal_container(b"first file"));
    let b = write_file(
        src_dir.path(),
        "two.bmsh",
        &container(0x04, &[BlockBuilder::new().token(b"ab", 2, 10).last(b"")]),
    );

    let mut unpacker = unpacker_into(out_dir.path(), true);
    unpacker.unpack_path(&a.to_string_lossy()).unwrap();
    unpacker.unpack_path(&b.to_string_lossy()).unwrap();
    let summary = unpacker.finish().unwrap();

    let dump = fs::read(out_dir.path().join(DUMP_FILE_NAME)).unwrap();
    let mut expected = decoded(b"first file");
    expected.extend(decoded(b"abababababab"));
    assert_eq!(dump, expected);
    assert_eq!(summary.bytes_written, dump.len() as u64);
}

#[test]
fn dump_with_only_failures_leaves_no_file() {
    let src_dir = tempdir().unwrap();
    let out_dir = tempdir().unwrap();
    let mut enc = literal_container(b"secret");
    enc[0] = 0x08;
    let src = write_file(src_dir.path(), "locked.bmsh", &enc);

    let mut unpacker = unpacker_into(out_dir.path(), true);
    let err = unpacker.unpack_path(&src.to_string_lossy()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::EncryptedFormat);
    let summary = unpacker.finish().unwrap();
    assert!(summary.dump_file.is_none());
    assert!(!out_dir.path().join(DUMP_FILE_NAME).exists());
}

#[test]
fn unknown_tag_is_unsupported() {
    let mut input = literal_container(b"x");
    input[0] = 0x05;
    let err = decode_to_vec(&input, DEFAULT_CAPACITY).unwrap_err();
    assert!(matches!(err, Error::UnsupportedFormat(0x05)));
    assert_eq!(err.kind().code(), -6);
}

#[test]
fn arena_reuse_across_formats() {
    let standard = container(0x04, &[BlockBuilder::new().last(b"standard")]);
    let legacy = container(0x07, &[BlockBuilder::new().last(b"legacy")]);

    let mut arena = Arena::new(4096);
    decode(&standard, &mut arena).unwrap();
    assert_eq!(arena.as_slice(), &decoded(b"standard")[..]);
    decode(&legacy, &mut arena).unwrap();
    assert_eq!(arena.as_slice(), &decoded(b"legacy")[..]);
}

#[test]
fn quoted_path_with_backslashes_resolves() {
    let dir = tempdir().unwrap();
    write_file(dir.path(), "q.bmsh", &literal_container(b"quoted"));
    let raw = format!("\"{}\\q.bmsh\"  ", dir.path().display());

    let mut unpacker = Unpacker::default();
    let report = unpacker.unpack_path(&raw).unwrap();
    assert_eq!(report.asset.file_name, "q.bmsh");
}
