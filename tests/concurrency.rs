//! Writer serializer concurrency (spec §4.7/§5): concurrent `add` calls must
//! still produce a valid archive with sink writes in a well-defined order.

mod common;

use common::{VecReader, VecWriter};
use streaming_zip::writer::AddOptions;
use streaming_zip::{ZipReader, ZipWriter};

#[tokio::test]
async fn concurrent_adds_all_land_and_extract_correctly() {
    let writer = ZipWriter::new(VecWriter::default());

    let mut tasks = Vec::new();
    for i in 0..16 {
        let writer = writer.clone();
        tasks.push(tokio::spawn(async move {
            let name = format!("file{i}.txt");
            let data = format!("payload number {i}").into_bytes();
            writer.add(&name, &data, AddOptions::default()).await
        }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    writer.close().await.unwrap();
    let archive = writer.get_data().await.unwrap();

    let mut reader = ZipReader::new(VecReader::new(archive.clone()));
    let entries = reader.get_entries().await.unwrap();
    assert_eq!(entries.len(), 16);

    for i in 0..16 {
        let name = format!("file{i}.txt");
        let mut out = VecWriter::default();
        let data = reader
            .get_data(&name, Default::default(), &mut out)
            .await
            .unwrap();
        assert_eq!(data, format!("payload number {i}").into_bytes());
    }
}

#[tokio::test]
async fn buffered_write_option_still_serializes_onto_one_sink() {
    let writer = ZipWriter::new(VecWriter::default());

    let mut tasks = Vec::new();
    for i in 0..8 {
        let writer = writer.clone();
        tasks.push(tokio::spawn(async move {
            let name = format!("b{i}.txt");
            writer
                .add(
                    &name,
                    b"buffered",
                    AddOptions {
                        buffered_write: true,
                        ..AddOptions::default()
                    },
                )
                .await
        }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    writer.close().await.unwrap();
    let archive = writer.get_data().await.unwrap();
    let mut reader = ZipReader::new(VecReader::new(archive));
    let entries = reader.get_entries().await.unwrap();
    assert_eq!(entries.len(), 8);
}
