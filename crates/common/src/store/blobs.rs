use std::future::IntoFuture;
use std::ops::Deref;
use std::path::Path;
use std::sync::Arc;

use anyhow::anyhow;
use async_trait::async_trait;
use bytes::Bytes;
use iroh_blobs::{
    api::{
        blobs::{BlobStatus, Blobs},
        tags::Tags,
        ExportBaoError, RequestError,
    },
    store::{fs::FsStore, mem::MemStore},
    BlobsProtocol, Hash,
};

use crate::linked_data::{blake3_digest, cid_from_digest, Cid, CodecError};

use super::{BlockStore, BlockStoreError};

/// Block store over a local iroh-blobs store
///
/// iroh-blobs addresses content by BLAKE3, the same digest our CIDs carry,
/// so a CID maps onto a blob hash by stripping its codec and multihash
/// prefix. The blob itself carries no codec, so every CID handed out by
/// [`BlockStore::put_block`] is also recorded as a tag. A CID without a tag
/// was never put and reads as absent, even when its digest names a blob.
#[derive(Clone, Debug)]
pub struct BlobsStore {
    pub inner: Arc<BlobsProtocol>,
}

impl Deref for BlobsStore {
    type Target = Arc<BlobsProtocol>;
    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BlobsStoreError {
    #[error("blobs store error: {0}")]
    Default(#[from] anyhow::Error),
    #[error("blob store i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("export bao error: {0}")]
    ExportBao(#[from] ExportBaoError),
    #[error("request error: {0}")]
    Request(#[from] RequestError),
    #[error("decode error: {0}")]
    Decode(#[from] CodecError),
}

impl From<BlobsStoreError> for BlockStoreError {
    fn from(err: BlobsStoreError) -> Self {
        match err {
            BlobsStoreError::Io(err) => BlockStoreError::Io(err),
            BlobsStoreError::Decode(err) => BlockStoreError::Codec(err),
            err => BlockStoreError::Default(anyhow::Error::new(err)),
        }
    }
}

impl BlobsStore {
    /// Load a blob store from the given path on disk
    pub async fn fs(path: &Path) -> Result<Self, BlobsStoreError> {
        tracing::debug!("BlobsStore::fs called with path: {:?}", path);
        let store = FsStore::load(path).await?;
        tracing::debug!("BlobsStore::fs completed loading FsStore");
        let blobs = BlobsProtocol::new(&store, None);
        Ok(Self {
            inner: Arc::new(blobs),
        })
    }

    /// Load a memory blobs store
    pub async fn memory() -> Result<Self, BlobsStoreError> {
        let store = MemStore::new();
        let blobs = BlobsProtocol::new(&store, None);
        Ok(Self {
            inner: Arc::new(blobs),
        })
    }

    /// Get a handle to the underlying blobs client against
    ///  the store
    pub fn blobs(&self) -> &Blobs {
        self.inner.store().blobs()
    }

    /// Get a handle to the tags client against the store
    pub fn tags(&self) -> &Tags {
        self.inner.store().tags()
    }

    /// Whether `cid` was handed out by a put against this store
    async fn is_recorded(&self, cid: &Cid, hash: &Hash) -> Result<bool, BlobsStoreError> {
        let tag = self.tags().get(tag_name(cid)).await?;
        Ok(tag.is_some_and(|info| info.hash == *hash))
    }

    /// Get a blob as bytes
    pub async fn get(&self, hash: &Hash) -> Result<Bytes, BlobsStoreError> {
        let bytes = self.blobs().get_bytes(*hash).await?;
        Ok(bytes)
    }

    /// Store a vec of bytes as a blob
    pub async fn put(&self, data: Vec<u8>) -> Result<Hash, BlobsStoreError> {
        let hash = self.blobs().add_bytes(data).into_future().await?.hash;
        Ok(hash)
    }

    /// Check whether a blob is completely present
    pub async fn stat(&self, hash: &Hash) -> Result<bool, BlobsStoreError> {
        let stat = self
            .blobs()
            .status(*hash)
            .await
            .map_err(|err| BlobsStoreError::Default(anyhow!(err)))?;
        Ok(matches!(stat, BlobStatus::Complete { .. }))
    }
}

fn hash_for(cid: &Cid) -> Result<Hash, CodecError> {
    Ok(Hash::from_bytes(blake3_digest(cid)?))
}

fn tag_name(cid: &Cid) -> String {
    format!("cid/{}", cid)
}

#[async_trait]
impl BlockStore for BlobsStore {
    async fn put_block(&self, bytes: Vec<u8>, codec: u64) -> Result<Cid, BlockStoreError> {
        let hash = self.put(bytes).await?;
        let cid = cid_from_digest(codec, hash.as_bytes())?;
        self.tags()
            .set(tag_name(&cid), hash)
            .await
            .map_err(BlobsStoreError::from)?;
        tracing::debug!("BlobsStore::put_block: stored {} as {}", hash, cid);
        Ok(cid)
    }

    async fn get_block(&self, cid: &Cid) -> Result<Option<Bytes>, BlockStoreError> {
        let hash = match hash_for(cid) {
            Ok(hash) => hash,
            Err(err) => {
                // nothing we could have stored carries a foreign hash
                tracing::debug!("BlobsStore::get_block: {} is not a blake3 cid: {}", cid, err);
                return Ok(None);
            }
        };
        if !self.is_recorded(cid, &hash).await? || !self.stat(&hash).await? {
            tracing::debug!("BlobsStore::get_block: {} NOT FOUND", cid);
            return Ok(None);
        }
        Ok(Some(self.get(&hash).await?))
    }

    async fn has_block(&self, cid: &Cid) -> Result<bool, BlockStoreError> {
        let hash = match hash_for(cid) {
            Ok(hash) => hash,
            Err(_) => return Ok(false),
        };
        Ok(self.is_recorded(cid, &hash).await? && self.stat(&hash).await?)
    }
}
