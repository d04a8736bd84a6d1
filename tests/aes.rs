//! WinZip-AES round-trip, wrong-password, and tampered-ciphertext scenarios
//! (spec §8 laws 3-4, 6; scenarios S3, S6).

mod common;

use common::{VecReader, VecWriter};
use streaming_zip::writer::AddOptions;
use streaming_zip::{GetDataOptions, ZipError, ZipReader, ZipWriter};

async fn write_encrypted(name: &str, data: &[u8], password: &str) -> Vec<u8> {
    let writer = ZipWriter::new(VecWriter::default());
    writer
        .add(
            name,
            data,
            AddOptions {
                password: Some(password),
                ..AddOptions::default()
            },
        )
        .await
        .unwrap();
    writer.close().await.unwrap();
    writer.get_data().await.unwrap()
}

async fn extract(archive: &[u8], name: &str, password: Option<&str>) -> streaming_zip::Result<Vec<u8>> {
    let mut reader = ZipReader::new(VecReader::new(archive.to_vec()));
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

/// Byte offset of the start of the local file header's compressed-data
/// region for `name` (30-byte fixed header + name, no extra field on write).
async fn data_region(archive: &[u8], name: &str) -> (u64, u64) {
    let mut reader = ZipReader::new(VecReader::new(archive.to_vec()));
    let entry = reader.find_entry(name).await.unwrap().unwrap();
    let start = entry.local_header_offset + 30 + name.len() as u64;
    (start, entry.compressed_size)
}

#[tokio::test]
async fn s3_aes_round_trip_marks_method_99_with_ae_strength_3() {
    let archive = write_encrypted("secret.txt", b"top secret", "hunter2").await;

    let mut reader = ZipReader::new(VecReader::new(archive.clone()));
    let entries = reader.get_entries().await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].compression_method, 99);
    assert!(entries[0].is_encrypted());
    let aes = entries[0].aes.expect("AES extra present");
    assert_eq!(aes.strength, 3);
    assert_eq!(aes.inner_compression_method, 8);

    let data = extract(&archive, "secret.txt", Some("hunter2")).await.unwrap();
    assert_eq!(data, b"top secret");
}

#[tokio::test]
async fn wrong_password_fails_verifier_with_overwhelming_probability() {
    let archive = write_encrypted("secret.txt", b"top secret", "hunter2").await;
    let err = extract(&archive, "secret.txt", Some("hunter3"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ZipError::InvalidPassword | ZipError::InvalidSignature
    ));
}

#[tokio::test]
async fn missing_password_for_encrypted_entry_is_rejected() {
    let archive = write_encrypted("secret.txt", b"top secret", "hunter2").await;
    let err = extract(&archive, "secret.txt", None).await.unwrap_err();
    assert!(matches!(err, ZipError::Encrypted));
}

#[tokio::test]
async fn s6_tampered_ciphertext_fails_hmac_tag() {
    let mut archive = write_encrypted("x", b"some plaintext bytes", "hunter2").await;
    let (start, _) = data_region(&archive, "x").await;
    // First byte past the 18-byte salt+verifier preamble is ciphertext.
    let ciphertext_offset = (start + 18) as usize;
    archive[ciphertext_offset] ^= 0xFF;

    let err = extract(&archive, "x", Some("hunter2")).await.unwrap_err();
    assert!(matches!(err, ZipError::InvalidSignature));
}

#[tokio::test]
async fn tampered_tag_fails_verification() {
    let mut archive = write_encrypted("x", b"some plaintext bytes", "hunter2").await;
    let (start, compressed_size) = data_region(&archive, "x").await;
    // The trailing 10 bytes of the region are the HMAC-SHA1 tag.
    let tag_offset = (start + compressed_size - 1) as usize;
    archive[tag_offset] ^= 0xFF;

    let err = extract(&archive, "x", Some("hunter2")).await.unwrap_err();
    assert!(matches!(err, ZipError::InvalidSignature));
}
