//! Integration tests for mv (move/rename)

mod common;

use ::common::fs::FsError;

#[tokio::test]
async fn test_mv_file() {
    let (fs, cap, _temp) = common::setup_test_env().await;

    let cap = fs.write_file(&cap, "/root/old.txt", b"data").await.unwrap();
    let cap = fs.mv(&cap, "/root/old.txt", "/root/new.txt").await.unwrap();

    let result = fs.read_file(&cap, "/root/old.txt").await;
    assert!(matches!(result, Err(FsError::NotFound(_))));
    assert_eq!(fs.read_file(&cap, "/root/new.txt").await.unwrap(), b"data");
}

#[tokio::test]
async fn test_mv_file_to_subdir() {
    let (fs, cap) = common::setup_memory_env().await;

    let cap = fs.write_file(&cap, "/root/file.txt", b"data").await.unwrap();
    let cap = fs.mkdir(&cap, "/root/subdir").await.unwrap();
    let cap = fs
        .mv(&cap, "/root/file.txt", "/root/subdir/file.txt")
        .await
        .unwrap();

    assert_eq!(common::names(&fs, &cap, "/root").await, vec!["subdir"]);
    assert_eq!(
        fs.read_file(&cap, "/root/subdir/file.txt").await.unwrap(),
        b"data"
    );
}

#[tokio::test]
async fn test_mv_file_out_of_subdir() {
    let (fs, cap) = common::setup_memory_env().await;

    let cap = fs.mkdir(&cap, "/root/a").await.unwrap();
    let cap = fs.mkdir(&cap, "/root/a/b").await.unwrap();
    let cap = fs.write_file(&cap, "/root/a/b/f", b"f").await.unwrap();
    let cap = fs.mv(&cap, "/root/a/b/f", "/root/f").await.unwrap();

    assert!(fs.ls(&cap, "/root/a/b").await.unwrap().is_empty());
    assert_eq!(fs.read_file(&cap, "/root/f").await.unwrap(), b"f");
}

#[tokio::test]
async fn test_mv_directory() {
    let (fs, cap) = common::setup_memory_env().await;

    let cap = fs.mkdir(&cap, "/root/src").await.unwrap();
    let cap = fs.write_file(&cap, "/root/src/file", b"x").await.unwrap();
    let cap = fs.mkdir(&cap, "/root/dst").await.unwrap();
    let cap = fs.mv(&cap, "/root/src", "/root/dst/moved").await.unwrap();

    assert_eq!(common::names(&fs, &cap, "/root").await, vec!["dst"]);
    assert_eq!(fs.read_file(&cap, "/root/dst/moved/file").await.unwrap(), b"x");

    // the moved directory is still writable
    let cap = fs.write_file(&cap, "/root/dst/moved/more", b"y").await.unwrap();
    assert_eq!(
        common::names(&fs, &cap, "/root/dst/moved").await,
        vec!["file", "more"]
    );
}

#[tokio::test]
async fn test_mv_into_self_fails() {
    let (fs, cap) = common::setup_memory_env().await;

    let cap = fs.mkdir(&cap, "/root/dir").await.unwrap();
    let result = fs.mv(&cap, "/root/dir", "/root/dir/inner").await;
    assert!(matches!(result, Err(FsError::MoveIntoSelf { .. })));

    let result = fs.mv(&cap, "/root/dir", "/root/dir").await;
    assert!(matches!(result, Err(FsError::MoveIntoSelf { .. })));
}

#[tokio::test]
async fn test_mv_sibling_with_shared_prefix() {
    let (fs, cap) = common::setup_memory_env().await;

    let cap = fs.mkdir(&cap, "/root/foo").await.unwrap();
    let cap = fs.mv(&cap, "/root/foo", "/root/foobar").await.unwrap();
    assert_eq!(common::names(&fs, &cap, "/root").await, vec!["foobar"]);
}

#[tokio::test]
async fn test_mv_missing_source() {
    let (fs, cap) = common::setup_memory_env().await;

    let result = fs.mv(&cap, "/root/none", "/root/other").await;
    assert!(matches!(result, Err(FsError::NotFound(_))));
}

#[tokio::test]
async fn test_mv_existing_destination() {
    let (fs, cap) = common::setup_memory_env().await;

    let cap = fs.write_file(&cap, "/root/a", b"a").await.unwrap();
    let cap = fs.write_file(&cap, "/root/b", b"b").await.unwrap();
    let result = fs.mv(&cap, "/root/a", "/root/b").await;
    assert!(matches!(result, Err(FsError::AlreadyExists(_))));

    // nothing changed under the old capability
    assert_eq!(fs.read_file(&cap, "/root/a").await.unwrap(), b"a");
    assert_eq!(fs.read_file(&cap, "/root/b").await.unwrap(), b"b");
}

#[tokio::test]
async fn test_mv_top_level_fails() {
    let (fs, cap) = common::setup_memory_env().await;

    let result = fs.mv(&cap, "/", "/root/x").await;
    assert!(matches!(result, Err(FsError::InvalidPath(_))));
}
