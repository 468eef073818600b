//! Private file system
//!
//! A tree of encrypted directory and file nodes, indexed by a
//! [`PrivateForest`](crate::forest::PrivateForest) and reachable only through a
//! [`RootCapability`]. Every mutation goes through the same four steps:
//!
//! 1. **Resolve**: walk the path from the root, resolving each entry's label
//!    in the forest and decrypting the node it points at
//! 2. **Mutate**: change the in-memory copy of the affected directories
//! 3. **Persist**: write the new leaf, then every modified ancestor bottom-up,
//!    each under a fresh revision key
//! 4. **Repoint**: index the new revisions in the forest, store it and hand
//!    back a new capability
//!
//! Stored blocks are never changed, so any capability handed out earlier keeps
//! opening the state it was created for.
//!
//! ```ignore
//! let fs = PrivateFs::new(MemoryBlockStore::new());
//! let cap = fs.init(b"wnfs key").await?;
//! let cap = fs.write_file(&cap, "/root/file.txt", b"hello, world!").await?;
//! assert_eq!(fs.read_file(&cap, "/root/file.txt").await?, b"hello, world!");
//! ```

mod capability;
mod config;
mod file;
mod maybe_mime;
mod node;
mod path;
mod private_fs;
mod session;

pub use capability::{CapabilityError, PrivateRef, RootCapability};
pub use config::{FsConfig, DEFAULT_CHUNK_SIZE, DEFAULT_INLINE_THRESHOLD};
pub use file::{FileContent, PrivateFile};
pub use maybe_mime::MaybeMime;
pub use node::{
    EntryMetadata, Metadata, NodeError, NodeKind, NodeLink, PrivateDirectory, PrivateNode,
};
pub use path::FsPath;
pub use private_fs::{FsError, PrivateFs, DEFAULT_ROOT_DIR};
