//! Store/deflate round-trip, directory entries, and contract-error
//! scenarios (spec §8: laws 1-2, 9-11; scenarios S1-S2, S5-S6).

mod common;

use common::{VecReader, VecWriter};
use streaming_zip::writer::AddOptions;
use streaming_zip::{GetDataOptions, ZipError, ZipReader, ZipWriter};

async fn extract(data: &[u8], name: &str, password: Option<&str>) -> streaming_zip::Result<Vec<u8>> {
    let mut reader = ZipReader::new(VecReader::new(data.to_vec()));
    let mut out = VecWriter::default();
    reader
        .get_data(
            name,
            GetDataOptions {
                password,
                ..GetDataOptions::default()
            },
            &mut out,
        )
        .await
}

#[tokio::test]
async fn s1_store_round_trip() {
    let writer = ZipWriter::new(VecWriter::default());
    writer
        .add(
            "hello.txt",
            b"hello",
            AddOptions {
                level: 0,
                ..AddOptions::default()
            },
        )
        .await
        .unwrap();
    writer.close().await.unwrap();
    let archive = writer.get_data().await.unwrap();

    let mut reader = ZipReader::new(VecReader::new(archive.clone()));
    let entries = reader.get_entries().await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].name, "hello.txt");
    assert_eq!(entries[0].crc32, 0x3610_A686);
    assert_eq!(entries[0].compression_method, 0);

    let data = extract(&archive, "hello.txt", None).await.unwrap();
    assert_eq!(data, b"hello");
}

#[tokio::test]
async fn s2_deflate_round_trip() {
    let payload = vec![0x41u8; 1024];
    let writer = ZipWriter::new(VecWriter::default());
    writer
        .add(
            "a.bin",
            &payload,
            AddOptions {
                level: 5,
                ..AddOptions::default()
            },
        )
        .await
        .unwrap();
    writer.close().await.unwrap();
    let archive = writer.get_data().await.unwrap();

    let mut reader = ZipReader::new(VecReader::new(archive.clone()));
    let entries = reader.get_entries().await.unwrap();
    assert_eq!(entries[0].compression_method, 8);
    assert!(entries[0].compressed_size < 20);

    let data = extract(&archive, "a.bin", None).await.unwrap();
    assert_eq!(data, payload);
}

#[tokio::test]
async fn directory_entry_has_no_payload_and_trailing_slash() {
    let writer = ZipWriter::new(VecWriter::default());
    writer
        .add(
            "d",
            b"",
            AddOptions {
                directory: true,
                ..AddOptions::default()
            },
        )
        .await
        .unwrap();
    writer.close().await.unwrap();
    let archive = writer.get_data().await.unwrap();

    let mut reader = ZipReader::new(VecReader::new(archive));
    let entries = reader.get_entries().await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].name, "d/");
    assert!(entries[0].directory);
    assert_eq!(entries[0].uncompressed_size, 0);
}

#[tokio::test]
async fn duplicate_name_is_rejected_and_state_is_unchanged() {
    let writer = ZipWriter::new(VecWriter::default());
    writer
        .add("x", b"one", AddOptions::default())
        .await
        .unwrap();
    let err = writer
        .add("x", b"two", AddOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ZipError::DuplicatedName(_)));

    writer.close().await.unwrap();
    let archive = writer.get_data().await.unwrap();
    let mut reader = ZipReader::new(VecReader::new(archive.clone()));
    let entries = reader.get_entries().await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(extract(&archive, "x", None).await.unwrap(), b"one");
}

#[tokio::test]
async fn entry_comment_over_limit_is_rejected() {
    let writer = ZipWriter::new(VecWriter::default());
    let oversized = "x".repeat(65536);
    let err = writer
        .add(
            "c.txt",
            b"data",
            AddOptions {
                comment: Some(oversized),
                ..AddOptions::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ZipError::FileEntryCommentTooLarge(_)));
}

#[tokio::test]
async fn archive_comment_over_limit_is_rejected() {
    let writer = ZipWriter::new(VecWriter::default());
    let err = writer.set_comment("x".repeat(65536)).await.unwrap_err();
    assert!(matches!(err, ZipError::ZipFileCommentTooLarge));
}

#[tokio::test]
async fn s5_bad_eocdr_is_rejected() {
    let garbage = vec![0u8; 10];
    let mut reader = ZipReader::new(VecReader::new(garbage));
    let err = reader.get_entries().await.unwrap_err();
    assert!(matches!(err, ZipError::EndOfCentralDirectoryNotFound));
}

#[tokio::test]
async fn crc_detects_tampered_store_payload() {
    let writer = ZipWriter::new(VecWriter::default());
    writer
        .add(
            "x",
            b"some bytes to store",
            AddOptions {
                level: 0,
                ..AddOptions::default()
            },
        )
        .await
        .unwrap();
    writer.close().await.unwrap();
    let mut archive = writer.get_data().await.unwrap();

    // Flip a byte inside the stored (uncompressed) payload region; the
    // local header is 30 bytes + name length ("x" -> 1 byte).
    let payload_offset = 30 + 1;
    archive[payload_offset] ^= 0xFF;

    let err = extract(&archive, "x", None).await.unwrap_err();
    assert!(matches!(err, ZipError::InvalidSignature));
}

#[tokio::test]
async fn eocdr_search_finds_record_behind_archive_comment() {
    let writer = ZipWriter::new(VecWriter::default());
    writer
        .add("x", b"hi", AddOptions::default())
        .await
        .unwrap();
    writer.set_comment("c".repeat(4000)).await.unwrap();
    writer.close().await.unwrap();
    let archive = writer.get_data().await.unwrap();

    let mut reader = ZipReader::new(VecReader::new(archive));
    let entries = reader.get_entries().await.unwrap();
    assert_eq!(entries.len(), 1);
}
