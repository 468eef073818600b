//! Block store contract
//!
//! The file system never talks to storage directly. Everything goes through
//! [`BlockStore`]: a content-addressed put/get keyed by [`Cid`].
//!
//! Implementations must uphold:
//! - `put_block` is idempotent: identical bytes and codec yield the identical CID
//! - `get_block` on an unknown CID returns `Ok(None)`, never an error
//!
//! Two implementations ship with the crate:
//! - [`MemoryBlockStore`]: a process-local map, handy for tests and embedding
//! - [`BlobsStore`]: an iroh-blobs store (on disk or in memory)

mod blobs;
mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::linked_data::{BlockEncoded, Cid, CodecError, DagCborCodec};

pub use blobs::{BlobsStore, BlobsStoreError};
pub use memory::MemoryBlockStore;

#[derive(Debug, thiserror::Error)]
pub enum BlockStoreError {
    #[error("block store error: {0}")]
    Default(#[from] anyhow::Error),
    #[error("block store i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
    #[error("block {0} is referenced but missing from the store")]
    Missing(Cid),
}

#[async_trait]
pub trait BlockStore: Send + Sync {
    /// Store `bytes` under `codec`, returning their content identifier
    async fn put_block(&self, bytes: Vec<u8>, codec: u64) -> Result<Cid, BlockStoreError>;

    /// Fetch the bytes stored under `cid`, or `None` if they were never put
    async fn get_block(&self, cid: &Cid) -> Result<Option<Bytes>, BlockStoreError>;

    /// Check whether `cid` is present
    async fn has_block(&self, cid: &Cid) -> Result<bool, BlockStoreError> {
        Ok(self.get_block(cid).await?.is_some())
    }
}

#[async_trait]
impl<S> BlockStore for Arc<S>
where
    S: BlockStore + ?Sized,
{
    async fn put_block(&self, bytes: Vec<u8>, codec: u64) -> Result<Cid, BlockStoreError> {
        (**self).put_block(bytes, codec).await
    }

    async fn get_block(&self, cid: &Cid) -> Result<Option<Bytes>, BlockStoreError> {
        (**self).get_block(cid).await
    }

    async fn has_block(&self, cid: &Cid) -> Result<bool, BlockStoreError> {
        (**self).has_block(cid).await
    }
}

/// Fetch a block that must exist, turning absence into [`BlockStoreError::Missing`]
pub async fn require_block<S>(store: &S, cid: &Cid) -> Result<Bytes, BlockStoreError>
where
    S: BlockStore + ?Sized,
{
    match store.get_block(cid).await? {
        Some(bytes) => Ok(bytes),
        None => {
            tracing::error!("require_block: block {} NOT FOUND in store", cid);
            Err(BlockStoreError::Missing(*cid))
        }
    }
}

/// Encode a value as DAG-CBOR and store it
pub async fn put_cbor<S, T>(store: &S, value: &T) -> Result<Cid, BlockStoreError>
where
    S: BlockStore + ?Sized,
    T: BlockEncoded<DagCborCodec> + Sync,
{
    let data = value.encode()?;
    store.put_block(data, value.codec()).await
}

/// Load and decode a DAG-CBOR value that must exist
pub async fn get_cbor<S, T>(store: &S, cid: &Cid) -> Result<T, BlockStoreError>
where
    S: BlockStore + ?Sized,
    T: BlockEncoded<DagCborCodec>,
{
    let bytes = require_block(store, cid).await?;
    Ok(T::decode(&bytes)?)
}
