use std::collections::BTreeMap;

use mime::Mime;
use serde::{Deserialize, Serialize};

use crate::crypto::{Secret, SecretError};
use crate::forest::NamePoint;
use crate::linked_data::{BlockEncoded, Cid, CodecError, DagCborCodec, LD_RAW_CODEC};
use crate::store::{require_block, BlockStore, BlockStoreError};

use super::file::PrivateFile;
use super::maybe_mime::MaybeMime;

/**
 * Nodes
 * =====
 * A tree is made of two kinds of nodes, both always stored encrypted:
 *  - Files: content inline or as an ordered list of chunk blocks
 *  - Directories: a map of entries, one per child
 * A node is DAG-CBOR encoded, sealed with its revision key and stored
 *  as a raw block. The block store only ever sees ciphertext.
 */

#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    #[error("secret error: {0}")]
    Secret(#[from] SecretError),
    #[error("integrity error: {0}")]
    Integrity(#[source] SecretError),
    #[error("malformed node: {0}")]
    Malformed(#[source] CodecError),
    #[error("sealed entry name is not valid utf-8")]
    SealedName,
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
    #[error("block store error: {0}")]
    BlockStore(#[from] BlockStoreError),
    #[error("source read error: {0}")]
    Source(#[source] std::io::Error),
    #[error("sink write error: {0}")]
    Sink(#[source] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeKind {
    File,
    Dir,
}

/// Creation / modification times, seconds since the UNIX epoch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    created: i64,
    modified: i64,
}

impl Default for Metadata {
    fn default() -> Self {
        Self::new()
    }
}

impl Metadata {
    pub fn new() -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            created: now,
            modified: now,
        }
    }

    pub fn touch(&mut self) {
        self.modified = chrono::Utc::now().timestamp();
    }

    pub fn created(&self) -> i64 {
        self.created
    }

    pub fn modified(&self) -> i64 {
        self.modified
    }
}

// Everything a parent needs to reach (and list) a child:
//  the forest label of the child's revision, the key that
//  opens it, and a few fields for listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeLink {
    label: NamePoint,
    key: Secret,
    kind: NodeKind,
    size: u64,
    mime: MaybeMime,
    modified: i64,
}

impl NodeLink {
    pub fn label(&self) -> &NamePoint {
        &self.label
    }

    pub fn key(&self) -> &Secret {
        &self.key
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn is_dir(&self) -> bool {
        self.kind == NodeKind::Dir
    }

    pub fn is_file(&self) -> bool {
        self.kind == NodeKind::File
    }

    /// The same child linked under another name. Files get their MIME type
    /// guessed again.
    pub fn renamed(&self, name: &str) -> NodeLink {
        let mut link = self.clone();
        if link.is_file() {
            link.mime = MaybeMime::from_name(name);
        }
        link
    }

    pub fn metadata(&self) -> EntryMetadata {
        EntryMetadata {
            kind: self.kind,
            size: self.size,
            mime: self.mime.0.clone(),
            modified: self.modified,
        }
    }
}

/// Listing information for one directory entry
#[derive(Debug, Clone, PartialEq)]
pub struct EntryMetadata {
    pub kind: NodeKind,
    /// Content length for files, number of entries for directories
    pub size: u64,
    pub mime: Option<Mime>,
    pub modified: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Entry {
    // the name sealed with the directory's name key
    sealed_name: Vec<u8>,
    link: NodeLink,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrivateDirectory {
    // derives entry points and seals names; stable across revisions
    name_key: Secret,
    metadata: Metadata,
    entries: BTreeMap<NamePoint, Entry>,
}

impl PrivateDirectory {
    pub fn new() -> Result<Self, NodeError> {
        Ok(Self {
            name_key: Secret::generate()?,
            metadata: Metadata::new(),
            entries: BTreeMap::new(),
        })
    }

    fn point(&self, segment: &str) -> NamePoint {
        NamePoint::derive(&self.name_key, segment)
    }

    pub fn get(&self, segment: &str) -> Option<&NodeLink> {
        self.entries.get(&self.point(segment)).map(|entry| &entry.link)
    }

    pub fn contains(&self, segment: &str) -> bool {
        self.entries.contains_key(&self.point(segment))
    }

    /// Link `segment` to a child, replacing whatever was there
    pub fn insert(&mut self, segment: &str, link: NodeLink) -> Result<Option<NodeLink>, NodeError> {
        let sealed_name = self.name_key.encrypt(segment.as_bytes())?;
        let previous = self
            .entries
            .insert(self.point(segment), Entry { sealed_name, link });
        self.metadata.touch();
        Ok(previous.map(|entry| entry.link))
    }

    pub fn remove(&mut self, segment: &str) -> Option<NodeLink> {
        let removed = self.entries.remove(&self.point(segment));
        if removed.is_some() {
            self.metadata.touch();
        }
        removed.map(|entry| entry.link)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Unseal every entry name. Sorted by name.
    pub fn list(&self) -> Result<Vec<(String, &NodeLink)>, NodeError> {
        let mut items = self
            .entries
            .values()
            .map(|entry| {
                let name = self
                    .name_key
                    .decrypt(&entry.sealed_name)
                    .map_err(NodeError::Integrity)?;
                let name = String::from_utf8(name).map_err(|_| NodeError::SealedName)?;
                Ok((name, &entry.link))
            })
            .collect::<Result<Vec<_>, NodeError>>()?;
        items.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(items)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PrivateNode {
    File(PrivateFile),
    Dir(PrivateDirectory),
}

impl BlockEncoded<DagCborCodec> for PrivateNode {}

impl PrivateNode {
    pub fn kind(&self) -> NodeKind {
        match self {
            PrivateNode::File(_) => NodeKind::File,
            PrivateNode::Dir(_) => NodeKind::Dir,
        }
    }

    /// Build the link a parent stores for this node
    pub fn link(&self, label: NamePoint, key: Secret, name: &str) -> NodeLink {
        let (size, mime, modified) = match self {
            PrivateNode::File(file) => (file.size(), MaybeMime::from_name(name), file.metadata().modified()),
            PrivateNode::Dir(dir) => (dir.len() as u64, MaybeMime(None), dir.metadata().modified()),
        };
        NodeLink {
            label,
            key,
            kind: self.kind(),
            size,
            mime,
            modified,
        }
    }

    pub fn encrypt(&self, key: &Secret) -> Result<Vec<u8>, NodeError> {
        let data = self.encode()?;
        Ok(key.encrypt(&data)?)
    }

    /// Decrypt and decode a node; any failure means the block is not what
    /// the key expects.
    pub fn decrypt(ciphertext: &[u8], key: &Secret) -> Result<Self, NodeError> {
        let data = key.decrypt(ciphertext).map_err(NodeError::Integrity)?;
        Self::decode(&data).map_err(NodeError::Malformed)
    }

    pub async fn store<S>(&self, key: &Secret, store: &S) -> Result<Cid, NodeError>
    where
        S: BlockStore + ?Sized,
    {
        let data = self.encrypt(key)?;
        // NOTE: nodes are always stored as raw since they are encrypted blobs
        let cid = store.put_block(data, LD_RAW_CODEC).await?;
        tracing::debug!("PrivateNode::store: stored {:?} node as {}", self.kind(), cid);
        Ok(cid)
    }

    pub async fn load<S>(cid: &Cid, key: &Secret, store: &S) -> Result<Self, NodeError>
    where
        S: BlockStore + ?Sized,
    {
        tracing::debug!("PrivateNode::load: reading node {}", cid);
        let blob = require_block(store, cid).await?;
        let node = Self::decrypt(&blob, key)?;
        tracing::debug!("PrivateNode::load: decrypted {:?} node {}", node.kind(), cid);
        Ok(node)
    }
}
