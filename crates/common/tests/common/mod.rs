//! Shared test utilities for private file system integration tests
#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use common::fs::{FsConfig, PrivateFs, RootCapability};
use common::linked_data::Cid;
use common::store::{BlobsStore, BlockStore, BlockStoreError, MemoryBlockStore};
use tempfile::TempDir;

/// Key material used across tests, like a caller would hand in
pub const TEST_KEY: &[u8] = b"test";

/// Install a tracing subscriber once; `RUST_LOG` controls verbosity
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Set up a file system over an on-disk blobs store with a fresh tree
pub async fn setup_test_env() -> (PrivateFs<BlobsStore>, RootCapability, TempDir) {
    init_tracing();
    let temp_dir = TempDir::new().unwrap();
    let blob_path = temp_dir.path().join("blobs");

    let blobs = BlobsStore::fs(&blob_path).await.unwrap();
    let fs = PrivateFs::new(blobs);
    let cap = fs.init(TEST_KEY).await.unwrap();

    (fs, cap, temp_dir)
}

/// Set up a file system over an in-memory store with tiny chunks, so
/// small test payloads exercise the chunked layout
pub async fn setup_chunked_env() -> (PrivateFs<MemoryBlockStore>, RootCapability) {
    init_tracing();
    let fs = PrivateFs::with_config(MemoryBlockStore::new(), FsConfig::new(64, 16));
    let cap = fs.init(TEST_KEY).await.unwrap();
    (fs, cap)
}

/// Set up a file system over an in-memory store
pub async fn setup_memory_env() -> (PrivateFs<MemoryBlockStore>, RootCapability) {
    init_tracing();
    let fs = PrivateFs::new(MemoryBlockStore::new());
    let cap = fs.init(TEST_KEY).await.unwrap();
    (fs, cap)
}

/// Names of a directory listing, in listing order
pub async fn names<S: BlockStore>(fs: &PrivateFs<S>, cap: &RootCapability, path: &str) -> Vec<String> {
    fs.ls(cap, path)
        .await
        .unwrap()
        .into_iter()
        .map(|(name, _)| name)
        .collect()
}

/// A memory store whose writes can be switched off and whose blocks can be
/// made to disappear
#[derive(Clone, Default)]
pub struct FlakyStore {
    inner: MemoryBlockStore,
    fail_puts: Arc<AtomicBool>,
    written: Arc<Mutex<Vec<Cid>>>,
    lost: Arc<Mutex<HashSet<Cid>>>,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_puts(&self, fail: bool) {
        self.fail_puts.store(fail, Ordering::SeqCst);
    }

    /// Every CID handed out so far, in put order
    pub fn written(&self) -> Vec<Cid> {
        self.written.lock().unwrap().clone()
    }

    /// Make `cid` read as missing from now on
    pub fn lose(&self, cid: Cid) {
        self.lost.lock().unwrap().insert(cid);
    }
}

#[async_trait]
impl BlockStore for FlakyStore {
    async fn put_block(&self, bytes: Vec<u8>, codec: u64) -> Result<Cid, BlockStoreError> {
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(BlockStoreError::Default(anyhow::anyhow!("store is offline")));
        }
        let cid = self.inner.put_block(bytes, codec).await?;
        self.written.lock().unwrap().push(cid);
        Ok(cid)
    }

    async fn get_block(&self, cid: &Cid) -> Result<Option<Bytes>, BlockStoreError> {
        if self.lost.lock().unwrap().contains(cid) {
            return Ok(None);
        }
        self.inner.get_block(cid).await
    }
}
