use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;

use crate::linked_data::{content_id, Cid};

use super::{BlockStore, BlockStoreError};

/// In-memory content-addressed block store
///
/// Clones share the same underlying map.
#[derive(Debug, Clone, Default)]
pub struct MemoryBlockStore {
    blocks: Arc<RwLock<HashMap<Cid, Bytes>>>,
}

impl MemoryBlockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct blocks held
    pub fn len(&self) -> usize {
        self.blocks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.read().is_empty()
    }

    /// Total bytes held across all blocks
    pub fn total_bytes(&self) -> usize {
        self.blocks.read().values().map(Bytes::len).sum()
    }

    /// Overwrite a stored block in place. Only useful to simulate corruption.
    pub fn tamper(&self, cid: &Cid, bytes: Vec<u8>) -> bool {
        let mut blocks = self.blocks.write();
        match blocks.get_mut(cid) {
            Some(slot) => {
                *slot = Bytes::from(bytes);
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl BlockStore for MemoryBlockStore {
    async fn put_block(&self, bytes: Vec<u8>, codec: u64) -> Result<Cid, BlockStoreError> {
        let cid = content_id(codec, &bytes)?;
        self.blocks
            .write()
            .entry(cid)
            .or_insert_with(|| Bytes::from(bytes));
        tracing::trace!("MemoryBlockStore::put_block: {}", cid);
        Ok(cid)
    }

    async fn get_block(&self, cid: &Cid) -> Result<Option<Bytes>, BlockStoreError> {
        Ok(self.blocks.read().get(cid).cloned())
    }

    async fn has_block(&self, cid: &Cid) -> Result<bool, BlockStoreError> {
        Ok(self.blocks.read().contains_key(cid))
    }
}
