//! End to end walk through a typical session

mod common;

use ::common::fs::{FsError, PrivateFs, RootCapability};
use ::common::store::MemoryBlockStore;

#[tokio::test]
async fn test_full_session() {
    common::init_tracing();
    let fs = PrivateFs::new(MemoryBlockStore::new());

    let forest = fs.create_forest().await.unwrap();
    let cap = fs.create_root(&forest, b"test").await.unwrap();
    assert!(fs.ls(&cap, "root/").await.unwrap().is_empty());

    let cap = fs
        .write_file(&cap, "/root/file.txt", b"hello, world!")
        .await
        .unwrap();
    assert_eq!(
        fs.read_file(&cap, "/root/file.txt").await.unwrap(),
        b"hello, world!"
    );

    let cap = fs.mkdir(&cap, "/root/dir1").await.unwrap();
    let cap = fs
        .cp(&cap, "/root/file.txt", "/root/dir1/file.txt")
        .await
        .unwrap();
    assert_eq!(common::names(&fs, &cap, "/root/dir1").await, vec!["file.txt"]);

    let cap = fs
        .mv(&cap, "/root/file.txt", "/root/file1.txt")
        .await
        .unwrap();
    assert!(matches!(
        fs.read_file(&cap, "/root/file.txt").await,
        Err(FsError::NotFound(_))
    ));
    assert_eq!(
        fs.read_file(&cap, "/root/file1.txt").await.unwrap(),
        b"hello, world!"
    );
    assert_eq!(
        common::names(&fs, &cap, "/root").await,
        vec!["dir1", "file1.txt"]
    );

    let cap = fs.rm(&cap, "/root/dir1").await.unwrap();
    assert!(matches!(
        fs.read_file(&cap, "/root/dir1/file.txt").await,
        Err(FsError::NotFound(_))
    ));

    // hand the state to someone holding only the two strings
    let (forest, private_ref) = cap.to_strings();
    let reopened = RootCapability::from_strings(&forest, &private_ref).unwrap();
    assert_eq!(common::names(&fs, &reopened, "/root").await, vec!["file1.txt"]);

    // or only the forest and the key
    let latest = fs
        .load_with_key(reopened.forest(), b"test")
        .await
        .unwrap();
    assert_eq!(latest, cap);
}
