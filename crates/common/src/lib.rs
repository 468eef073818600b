/**
 * Symmetric cryptography.
 *  - Authenticated encryption of nodes and chunks
 *  - The deterministic key hierarchy
 */
pub mod crypto;
/**
 * The private forest: an append-only index from
 *  opaque name points to encrypted blocks.
 */
pub mod forest;
/**
 * The private file system itself: encrypted nodes,
 *  root capabilities and the tree operations engine.
 */
pub mod fs;
/**
 * Internal wrapper around IPLD, renamed to
 *  something a little more down-to-earth.
 * Content identifiers and DAG-CBOR encoding
 *  for everything we put in a block store.
 */
pub mod linked_data;
/**
 * Storage layer.
 *  The block store contract, plus an in-memory
 *  and an iroh-blobs backed implementation.
 */
pub mod store;

pub mod prelude {
    pub use crate::crypto::{Secret, SecretError};
    pub use crate::forest::{NamePoint, PrivateForest};
    pub use crate::fs::{
        EntryMetadata, FsConfig, FsError, NodeKind, PrivateFs, RootCapability,
    };
    pub use crate::linked_data::{multibase, Cid};
    pub use crate::store::{BlobsStore, BlockStore, BlockStoreError, MemoryBlockStore};
}
