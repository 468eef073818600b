//! Integration tests for writing and reading files

mod common;

use std::io::Write;

use ::common::fs::{FsConfig, FsError, PrivateFs};
use ::common::linked_data::LD_RAW_CODEC;
use tempfile::NamedTempFile;

#[tokio::test]
async fn test_write_read() {
    let (fs, cap, _temp) = common::setup_test_env().await;

    let cap = fs
        .write_file(&cap, "/root/file.txt", b"hello, world!")
        .await
        .unwrap();
    let data = fs.read_file(&cap, "/root/file.txt").await.unwrap();
    assert_eq!(data, b"hello, world!");
}

#[tokio::test]
async fn test_write_returns_new_capability() {
    let (fs, cap) = common::setup_memory_env().await;

    let next = fs.write_file(&cap, "/root/a.txt", b"a").await.unwrap();
    assert_ne!(next, cap);
    assert_ne!(next.forest(), cap.forest());
    assert_ne!(next.private_ref(), cap.private_ref());
}

#[tokio::test]
async fn test_overwrite_replaces_content() {
    let (fs, cap) = common::setup_memory_env().await;

    let cap = fs.write_file(&cap, "/root/f.txt", b"first").await.unwrap();
    let cap = fs.write_file(&cap, "/root/f.txt", b"second").await.unwrap();
    assert_eq!(fs.read_file(&cap, "/root/f.txt").await.unwrap(), b"second");
    assert_eq!(common::names(&fs, &cap, "/root").await, vec!["f.txt"]);
}

#[tokio::test]
async fn test_write_empty_file() {
    let (fs, cap) = common::setup_memory_env().await;

    let cap = fs.write_file(&cap, "/root/empty", b"").await.unwrap();
    assert!(fs.read_file(&cap, "/root/empty").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_write_at_top_level() {
    let (fs, cap) = common::setup_memory_env().await;

    let cap = fs.write_file(&cap, "top.txt", b"top").await.unwrap();
    assert_eq!(fs.read_file(&cap, "/top.txt").await.unwrap(), b"top");
    assert_eq!(common::names(&fs, &cap, "/").await, vec!["root", "top.txt"]);
}

#[tokio::test]
async fn test_write_requires_parent() {
    let (fs, cap) = common::setup_memory_env().await;

    let result = fs.write_file(&cap, "/root/missing/file.txt", b"x").await;
    assert!(matches!(result, Err(FsError::NotFound(_))));
}

#[tokio::test]
async fn test_write_onto_directory_fails() {
    let (fs, cap) = common::setup_memory_env().await;

    let result = fs.write_file(&cap, "/root", b"x").await;
    assert!(matches!(result, Err(FsError::NotAFile(_))));
}

#[tokio::test]
async fn test_write_under_file_fails() {
    let (fs, cap) = common::setup_memory_env().await;

    let cap = fs.write_file(&cap, "/root/f.txt", b"x").await.unwrap();
    let result = fs.write_file(&cap, "/root/f.txt/inner", b"y").await;
    assert!(matches!(result, Err(FsError::NotADirectory(_))));
}

#[tokio::test]
async fn test_write_to_top_directory_fails() {
    let (fs, cap) = common::setup_memory_env().await;

    let result = fs.write_file(&cap, "/", b"x").await;
    assert!(matches!(result, Err(FsError::InvalidPath(_))));
}

#[tokio::test]
async fn test_read_missing_file() {
    let (fs, cap) = common::setup_memory_env().await;

    let result = fs.read_file(&cap, "/root/nope.txt").await;
    assert!(matches!(result, Err(FsError::NotFound(_))));
}

#[tokio::test]
async fn test_read_directory_fails() {
    let (fs, cap) = common::setup_memory_env().await;

    let result = fs.read_file(&cap, "/root").await;
    assert!(matches!(result, Err(FsError::NotAFile(_))));
}

#[tokio::test]
async fn test_chunked_file_roundtrip() {
    let (fs, cap) = common::setup_chunked_env().await;
    let data: Vec<u8> = (0..1000u32).map(|i| (i % 251) as u8).collect();

    let cap = fs.write_file(&cap, "/root/big.bin", &data).await.unwrap();
    assert_eq!(fs.read_file(&cap, "/root/big.bin").await.unwrap(), data);

    let (_, meta) = fs.ls(&cap, "/root").await.unwrap().remove(0);
    assert_eq!(meta.size, 1000);
}

#[tokio::test]
async fn test_write_file_from_path() {
    let (fs, cap) = common::setup_chunked_env().await;
    let data = vec![42u8; 500];

    let mut source = NamedTempFile::new().unwrap();
    source.write_all(&data).unwrap();
    source.flush().unwrap();

    let cap = fs
        .write_file_from_path(&cap, "/root/from_disk.bin", source.path())
        .await
        .unwrap();
    assert_eq!(fs.read_file(&cap, "/root/from_disk.bin").await.unwrap(), data);
}

#[tokio::test]
async fn test_write_file_from_missing_path() {
    let (fs, cap) = common::setup_memory_env().await;
    let temp = tempfile::tempdir().unwrap();
    let missing = temp.path().join("does-not-exist");

    let result = fs.write_file_from_path(&cap, "/root/x", &missing).await;
    match result {
        Err(FsError::SourceRead { path, .. }) => assert_eq!(path, missing),
        other => panic!("expected SourceRead, got {:?}", other),
    }
}

#[tokio::test]
async fn test_read_file_to_path() {
    let (fs, cap, temp) = common::setup_test_env().await;
    let cap = fs
        .write_file(&cap, "/root/file.txt", b"to disk")
        .await
        .unwrap();

    let sink = temp.path().join("out.txt");
    let written = fs.read_file_to_path(&cap, "/root/file.txt", &sink).await.unwrap();
    assert_eq!(written, sink);
    assert_eq!(std::fs::read(&sink).unwrap(), b"to disk");
}

#[tokio::test]
async fn test_read_filestream_to_path() {
    let (fs, cap) = common::setup_chunked_env().await;
    let data: Vec<u8> = (0..777u32).map(|i| (i * 7 % 256) as u8).collect();
    let cap = fs.write_file(&cap, "/root/stream.bin", &data).await.unwrap();

    let temp = tempfile::tempdir().unwrap();
    let sink = temp.path().join("stream.bin");
    let written = fs
        .read_filestream_to_path(&cap, "/root/stream.bin", &sink)
        .await
        .unwrap();
    assert_eq!(written, sink);
    assert_eq!(std::fs::read(&sink).unwrap(), data);
}

#[tokio::test]
async fn test_read_to_unwritable_sink() {
    let (fs, cap) = common::setup_memory_env().await;
    let cap = fs.write_file(&cap, "/root/f.txt", b"x").await.unwrap();

    let temp = tempfile::tempdir().unwrap();
    let sink = temp.path().join("no-such-dir").join("out.txt");

    let result = fs.read_file_to_path(&cap, "/root/f.txt", &sink).await;
    assert!(matches!(result, Err(FsError::SinkWrite { .. })));

    let result = fs.read_filestream_to_path(&cap, "/root/f.txt", &sink).await;
    assert!(matches!(result, Err(FsError::SinkWrite { .. })));
}

#[tokio::test]
async fn test_failed_stream_leaves_no_sink() {
    common::init_tracing();
    let store = common::FlakyStore::new();
    let fs = PrivateFs::with_config(store.clone(), FsConfig::new(64, 16));
    let cap = fs.init(common::TEST_KEY).await.unwrap();

    let before = store.written().len();
    let data = vec![7u8; 200];
    let cap = fs.write_file(&cap, "/root/big.bin", &data).await.unwrap();

    // four chunks are stored before any node; lose the last one
    let last_chunk = store.written()[before + 3];
    assert_eq!(last_chunk.codec(), LD_RAW_CODEC);
    store.lose(last_chunk);

    let temp = tempfile::tempdir().unwrap();
    let sink = temp.path().join("big.bin");
    let result = fs.read_filestream_to_path(&cap, "/root/big.bin", &sink).await;
    assert!(matches!(result, Err(FsError::Storage(_))));
    assert!(!sink.exists());
    assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 0);
}
