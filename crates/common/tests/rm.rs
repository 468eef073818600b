//! Integration tests for rm

mod common;

use ::common::fs::FsError;

#[tokio::test]
async fn test_rm_file() {
    let (fs, cap, _temp) = common::setup_test_env().await;

    let cap = fs.write_file(&cap, "/root/file.txt", b"data").await.unwrap();
    let cap = fs.rm(&cap, "/root/file.txt").await.unwrap();

    let result = fs.read_file(&cap, "/root/file.txt").await;
    assert!(matches!(result, Err(FsError::NotFound(_))));
    assert!(fs.ls(&cap, "/root").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_rm_directory_removes_subtree() {
    let (fs, cap) = common::setup_memory_env().await;

    let cap = fs.mkdir(&cap, "/root/dir1").await.unwrap();
    let cap = fs
        .write_file(&cap, "/root/dir1/file.txt", b"inside")
        .await
        .unwrap();
    let cap = fs.rm(&cap, "/root/dir1").await.unwrap();

    let result = fs.read_file(&cap, "/root/dir1/file.txt").await;
    assert!(matches!(result, Err(FsError::NotFound(_))));
    let result = fs.ls(&cap, "/root/dir1").await;
    assert!(matches!(result, Err(FsError::NotFound(_))));
}

#[tokio::test]
async fn test_rm_missing_fails() {
    let (fs, cap) = common::setup_memory_env().await;

    let result = fs.rm(&cap, "/root/nothing").await;
    assert!(matches!(result, Err(FsError::NotFound(_))));
}

#[tokio::test]
async fn test_rm_top_directory_fails() {
    let (fs, cap) = common::setup_memory_env().await;

    let result = fs.rm(&cap, "/").await;
    assert!(matches!(result, Err(FsError::InvalidPath(_))));
}

#[tokio::test]
async fn test_rm_keeps_siblings() {
    let (fs, cap) = common::setup_memory_env().await;

    let cap = fs.write_file(&cap, "/root/a.txt", b"a").await.unwrap();
    let cap = fs.write_file(&cap, "/root/b.txt", b"b").await.unwrap();
    let cap = fs.rm(&cap, "/root/a.txt").await.unwrap();

    assert_eq!(common::names(&fs, &cap, "/root").await, vec!["b.txt"]);
    assert_eq!(fs.read_file(&cap, "/root/b.txt").await.unwrap(), b"b");
}

#[tokio::test]
async fn test_rm_is_not_destructive() {
    let (fs, cap) = common::setup_memory_env().await;

    let before = fs.write_file(&cap, "/root/keep.txt", b"old").await.unwrap();
    let after = fs.rm(&before, "/root/keep.txt").await.unwrap();

    assert!(fs.read_file(&after, "/root/keep.txt").await.is_err());
    assert_eq!(fs.read_file(&before, "/root/keep.txt").await.unwrap(), b"old");
}
