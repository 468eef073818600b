use std::collections::BTreeMap;

use tokio::io::AsyncRead;

use crate::crypto::Secret;
use crate::forest::{ForestError, NamePoint, PrivateForest};
use crate::linked_data::Cid;
use crate::store::{BlockStore, BlockStoreError};

use super::capability::{PrivateRef, RootCapability};
use super::config::FsConfig;
use super::file::PrivateFile;
use super::node::{EntryMetadata, NodeError, NodeLink, PrivateDirectory, PrivateNode};
use super::path::FsPath;
use super::FsError;

/// A directory loaded during an operation, plus what it needs to be
/// written back
struct DirCursor {
    dir: PrivateDirectory,
    // the revision we loaded
    label: NamePoint,
    // name under the parent, empty for the top directory
    segment: String,
    // key the next revision of this directory is sealed with
    next_key: Secret,
    children: BTreeMap<String, DirCursor>,
    dirty: bool,
}

impl DirCursor {
    fn mark_unlinked(&mut self, segment: &str) {
        self.children.remove(segment);
        self.dirty = true;
    }
}

/// One operation against one capability.
///
/// The session owns a private copy of the forest and a working tree of every
/// directory it had to open, so each directory is fetched and decrypted at
/// most once. Nothing already stored is touched: [`Session::commit`] writes
/// new revisions of the dirty directories and hands back a new capability.
pub(crate) struct Session<'a, S: ?Sized> {
    store: &'a S,
    config: &'a FsConfig,
    forest: PrivateForest,
    root: DirCursor,
}

impl<'a, S> Session<'a, S>
where
    S: BlockStore + ?Sized,
{
    pub async fn open(
        store: &'a S,
        config: &'a FsConfig,
        capability: &RootCapability,
    ) -> Result<Self, FsError> {
        let root_path = FsPath::root();
        let forest = PrivateForest::load(capability.forest(), store)
            .await
            .map_err(|e| forest_error(e, &root_path))?;

        let private_ref = capability.private_ref();
        let cid = match forest.resolve(private_ref.label()) {
            Ok(cid) => cid,
            Err(ForestError::NotFound(_)) => return Err(FsError::NotFound(root_path.to_string())),
            Err(e) => return Err(forest_error(e, &root_path)),
        };
        let dir = match load_node(store, &cid, private_ref.key(), &root_path).await? {
            PrivateNode::Dir(dir) => dir,
            PrivateNode::File(_) => return Err(FsError::NotADirectory(root_path.to_string())),
        };

        tracing::debug!(
            "Session::open: root {:?} resolved to {} in forest {}",
            private_ref.label(),
            cid,
            capability.forest()
        );

        Ok(Self {
            store,
            config,
            forest,
            root: DirCursor {
                dir,
                label: *private_ref.label(),
                segment: String::new(),
                next_key: private_ref.key().ratchet(),
                children: BTreeMap::new(),
                dirty: false,
            },
        })
    }

    /// The directory at `path`, loading it on first use. With `dirty` set,
    /// the directory and all of its ancestors will be rewritten on commit.
    async fn dir_mut(&mut self, path: &FsPath, dirty: bool) -> Result<&mut DirCursor, FsError> {
        let store = self.store;
        let forest = &self.forest;
        let mut cursor = &mut self.root;
        let mut walked = FsPath::root();

        cursor.dirty |= dirty;
        for segment in path.segments() {
            walked = walked.join(segment);
            if !cursor.children.contains_key(segment) {
                let child = load_child(store, forest, cursor, segment, &walked).await?;
                cursor.children.insert(segment.clone(), child);
            }
            cursor = cursor
                .children
                .get_mut(segment)
                .ok_or_else(|| FsError::NotFound(walked.to_string()))?;
            cursor.dirty |= dirty;
        }
        Ok(cursor)
    }

    /// The link stored for `path` in its parent
    pub async fn link(&mut self, path: &FsPath) -> Result<NodeLink, FsError> {
        let (parent, name) = path
            .split_last()
            .ok_or_else(|| FsError::InvalidPath(path.to_string()))?;
        let cursor = self.dir_mut(&parent, false).await?;
        cursor
            .dir
            .get(name)
            .cloned()
            .ok_or_else(|| FsError::NotFound(path.to_string()))
    }

    /// Fail unless the parent of `path` is a directory without an entry
    /// named like the last segment
    pub async fn ensure_absent(&mut self, path: &FsPath) -> Result<(), FsError> {
        let (parent, name) = path
            .split_last()
            .ok_or_else(|| FsError::InvalidPath(path.to_string()))?;
        let cursor = self.dir_mut(&parent, false).await?;
        if cursor.dir.contains(name) {
            return Err(FsError::AlreadyExists(path.to_string()));
        }
        Ok(())
    }

    /// Link an existing child at `path`, replacing any previous entry
    pub async fn link_at(&mut self, path: &FsPath, link: NodeLink) -> Result<(), FsError> {
        let (parent, name) = path
            .split_last()
            .ok_or_else(|| FsError::InvalidPath(path.to_string()))?;
        let cursor = self.dir_mut(&parent, true).await?;
        cursor
            .dir
            .insert(name, link)
            .map_err(|e| node_error(e, path))?;
        cursor.mark_unlinked(name);
        Ok(())
    }

    /// Drop the entry at `path` from its parent
    pub async fn unlink(&mut self, path: &FsPath) -> Result<NodeLink, FsError> {
        let (parent, name) = path
            .split_last()
            .ok_or_else(|| FsError::InvalidPath(path.to_string()))?;
        let cursor = self.dir_mut(&parent, true).await?;
        let link = cursor
            .dir
            .remove(name)
            .ok_or_else(|| FsError::NotFound(path.to_string()))?;
        cursor.mark_unlinked(name);
        Ok(link)
    }

    /// Write a new empty directory at `path`
    pub async fn create_dir(&mut self, path: &FsPath) -> Result<(), FsError> {
        self.ensure_absent(path).await?;
        let dir = PrivateDirectory::new().map_err(|e| node_error(e, path))?;
        let node = PrivateNode::Dir(dir);
        self.write_node(path, node).await
    }

    /// Write a file at `path` from `reader`, replacing an existing file
    pub async fn write_file<R>(&mut self, path: &FsPath, reader: R) -> Result<u64, FsError>
    where
        R: AsyncRead + Unpin,
    {
        let (parent, name) = path
            .split_last()
            .ok_or_else(|| FsError::InvalidPath(path.to_string()))?;
        let cursor = self.dir_mut(&parent, false).await?;
        if cursor.dir.get(name).is_some_and(|link| link.is_dir()) {
            return Err(FsError::NotAFile(path.to_string()));
        }
        let key = cursor.next_key.derive_child(name);

        let file = PrivateFile::from_reader(reader, &key, self.config, self.store)
            .await
            .map_err(|e| node_error(e, path))?;
        let size = file.size();
        self.write_node(path, PrivateNode::File(file)).await?;
        Ok(size)
    }

    // Store a freshly built leaf under the key its parent's next revision
    // expects, index it and link it
    async fn write_node(&mut self, path: &FsPath, node: PrivateNode) -> Result<(), FsError> {
        let (parent, name) = path
            .split_last()
            .ok_or_else(|| FsError::InvalidPath(path.to_string()))?;
        let store = self.store;
        let cursor = self.dir_mut(&parent, true).await?;

        let key = cursor.next_key.derive_child(name);
        let label = NamePoint::derive(&key, name);
        let cid = node
            .store(&key, store)
            .await
            .map_err(|e| node_error(e, path))?;
        let link = node.link(label, key, name);
        cursor
            .dir
            .insert(name, link)
            .map_err(|e| node_error(e, path))?;
        cursor.mark_unlinked(name);

        self.forest.put(label, cid);
        tracing::debug!("Session::write_node: wrote {:?} {} as {}", node.kind(), path, cid);
        Ok(())
    }

    /// Load the file at `path` with the key that opens its content
    pub async fn file(&mut self, path: &FsPath) -> Result<(PrivateFile, Secret), FsError> {
        let link = self.link(path).await?;
        if link.is_dir() {
            return Err(FsError::NotAFile(path.to_string()));
        }
        let cid = resolve(&self.forest, link.label(), path)?;
        match load_node(self.store, &cid, link.key(), path).await? {
            PrivateNode::File(file) => Ok((file, link.key().clone())),
            PrivateNode::Dir(_) => Err(FsError::Integrity {
                path: path.to_string(),
                reason: "file entry points at a directory".to_string(),
            }),
        }
    }

    /// Entries of the directory at `path`, sorted by name
    pub async fn list(&mut self, path: &FsPath) -> Result<Vec<(String, EntryMetadata)>, FsError> {
        let cursor = self.dir_mut(path, false).await?;
        let entries = cursor
            .dir
            .list()
            .map_err(|e| node_error(e, path))?
            .into_iter()
            .map(|(name, link)| (name, link.metadata()))
            .collect();
        Ok(entries)
    }

    /// Persist every dirty directory bottom-up, then the forest
    pub async fn commit(mut self) -> Result<RootCapability, FsError> {
        let store = self.store;
        let link = persist_dir(store, &mut self.forest, &mut self.root, &FsPath::root()).await?;

        let forest_cid = self
            .forest
            .store(store)
            .await
            .map_err(|e| forest_error(e, &FsPath::root()))?;
        let capability = RootCapability::new(
            forest_cid,
            PrivateRef::new(*link.label(), link.key().clone()),
        );
        tracing::info!(
            "Session::commit: root {:?} -> {:?}, forest {}",
            self.root.label,
            link.label(),
            forest_cid
        );
        Ok(capability)
    }
}

async fn load_child<S>(
    store: &S,
    forest: &PrivateForest,
    parent: &DirCursor,
    segment: &str,
    path: &FsPath,
) -> Result<DirCursor, FsError>
where
    S: BlockStore + ?Sized,
{
    let link = parent
        .dir
        .get(segment)
        .ok_or_else(|| FsError::NotFound(path.to_string()))?;
    if !link.is_dir() {
        return Err(FsError::NotADirectory(path.to_string()));
    }

    let cid = resolve(forest, link.label(), path)?;
    let dir = match load_node(store, &cid, link.key(), path).await? {
        PrivateNode::Dir(dir) => dir,
        PrivateNode::File(_) => {
            return Err(FsError::Integrity {
                path: path.to_string(),
                reason: "directory entry points at a file".to_string(),
            })
        }
    };

    Ok(DirCursor {
        dir,
        label: *link.label(),
        segment: segment.to_string(),
        next_key: parent.next_key.derive_child(segment),
        children: BTreeMap::new(),
        dirty: false,
    })
}

// Writes the next revision of `cursor` and of every dirty directory below it
async fn persist_dir<S>(
    store: &S,
    forest: &mut PrivateForest,
    cursor: &mut DirCursor,
    path: &FsPath,
) -> Result<NodeLink, FsError>
where
    S: BlockStore + ?Sized,
{
    let children = std::mem::take(&mut cursor.children);
    for (segment, mut child) in children {
        let still_linked = cursor
            .dir
            .get(&segment)
            .is_some_and(|link| link.label() == &child.label);
        if !child.dirty || !still_linked {
            continue;
        }
        let child_path = path.join(&segment);
        let link = Box::pin(persist_dir(store, forest, &mut child, &child_path)).await?;
        cursor
            .dir
            .insert(&segment, link)
            .map_err(|e| node_error(e, &child_path))?;
    }

    let node = PrivateNode::Dir(cursor.dir.clone());
    let label = NamePoint::derive(&cursor.next_key, &cursor.segment);
    let cid = node
        .store(&cursor.next_key, store)
        .await
        .map_err(|e| node_error(e, path))?;
    forest.put(label, cid);

    tracing::debug!("persist_dir: {} stored as {}", path, cid);
    Ok(node.link(label, cursor.next_key.clone(), &cursor.segment))
}

async fn load_node<S>(
    store: &S,
    cid: &Cid,
    key: &Secret,
    path: &FsPath,
) -> Result<PrivateNode, FsError>
where
    S: BlockStore + ?Sized,
{
    PrivateNode::load(cid, key, store)
        .await
        .map_err(|e| node_error(e, path))
}

fn resolve(forest: &PrivateForest, label: &NamePoint, path: &FsPath) -> Result<Cid, FsError> {
    forest.resolve(label).map_err(|e| forest_error(e, path))
}

pub(crate) fn forest_error(err: ForestError, path: &FsPath) -> FsError {
    match err {
        ForestError::Conflict { name, candidates } => {
            tracing::warn!(
                "forest conflict at {}: {:?} holds {} values",
                path,
                name,
                candidates.len()
            );
            FsError::Conflict {
                path: path.to_string(),
                candidates,
            }
        }
        ForestError::NotFound(name) => FsError::Integrity {
            path: path.to_string(),
            reason: format!("{:?} is not indexed in the forest", name),
        },
        ForestError::Malformed(reason) => FsError::Integrity {
            path: path.to_string(),
            reason,
        },
        ForestError::BlockStore(BlockStoreError::Codec(e)) => FsError::Integrity {
            path: path.to_string(),
            reason: e.to_string(),
        },
        ForestError::BlockStore(e) => FsError::Storage(e),
    }
}

pub(crate) fn node_error(err: NodeError, path: &FsPath) -> FsError {
    match err {
        NodeError::Integrity(_) | NodeError::Malformed(_) | NodeError::SealedName => {
            FsError::Integrity {
                path: path.to_string(),
                reason: err.to_string(),
            }
        }
        NodeError::BlockStore(e) => FsError::Storage(e),
        NodeError::Codec(e) => FsError::Codec(e),
        NodeError::Secret(e) => FsError::Crypto(e),
        NodeError::Source(source) => FsError::SourceRead {
            path: path.to_string().into(),
            source,
        },
        NodeError::Sink(source) => FsError::SinkWrite {
            path: path.to_string().into(),
            source,
        },
    }
}
