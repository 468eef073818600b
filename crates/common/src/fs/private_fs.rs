use std::path::{Path, PathBuf};

use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufReader, BufWriter};

use crate::crypto::{Secret, SecretError};
use crate::forest::{NamePoint, PrivateForest};
use crate::linked_data::{Cid, CodecError};
use crate::store::{BlockStore, BlockStoreError};

use super::capability::{CapabilityError, PrivateRef, RootCapability};
use super::config::FsConfig;
use super::node::{EntryMetadata, PrivateDirectory, PrivateNode};
use super::path::FsPath;
use super::session::{forest_error, node_error, Session};

/// Name of the directory every new tree starts with
pub const DEFAULT_ROOT_DIR: &str = "root";

#[derive(Debug, thiserror::Error)]
pub enum FsError {
    #[error("path not found: {0}")]
    NotFound(String),
    #[error("path already exists: {0}")]
    AlreadyExists(String),
    #[error("conflicting revisions at {path}: {} candidates", .candidates.len())]
    Conflict { path: String, candidates: Vec<Cid> },
    #[error("integrity check failed at {path}: {reason}")]
    Integrity { path: String, reason: String },
    #[error("storage error: {0}")]
    Storage(#[from] BlockStoreError),
    #[error("failed to read source {path:?}: {source}")]
    SourceRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write sink {path:?}: {source}")]
    SinkWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("not a directory: {0}")]
    NotADirectory(String),
    #[error("not a file: {0}")]
    NotAFile(String),
    #[error("cannot move '{from}' to '{to}': destination is inside source")]
    MoveIntoSelf { from: String, to: String },
    #[error("invalid path: {0}")]
    InvalidPath(String),
    #[error("invalid capability: {0}")]
    InvalidCapability(#[from] CapabilityError),
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
    #[error("crypto error: {0}")]
    Crypto(#[from] SecretError),
}

/// The tree operations engine
///
/// Every operation takes the capability of the state it applies to and
/// mutations return the capability of the new state. The engine holds no
/// tree state of its own, so one value can serve any number of trees.
#[derive(Debug, Clone)]
pub struct PrivateFs<S> {
    store: S,
    config: FsConfig,
}

impl<S> PrivateFs<S>
where
    S: BlockStore,
{
    pub fn new(store: S) -> Self {
        Self::with_config(store, FsConfig::default())
    }

    pub fn with_config(store: S, config: FsConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &FsConfig {
        &self.config
    }

    /// Store an empty forest
    pub async fn create_forest(&self) -> Result<Cid, FsError> {
        let cid = PrivateForest::new()
            .store(&self.store)
            .await
            .map_err(|e| forest_error(e, &FsPath::root()))?;
        tracing::debug!("PrivateFs::create_forest: empty forest {}", cid);
        Ok(cid)
    }

    /// Create the first revision of a tree inside `forest`, with its keys
    /// derived from `wnfs_key`. The tree starts with one empty directory,
    /// [`DEFAULT_ROOT_DIR`].
    pub async fn create_root(&self, forest: &Cid, wnfs_key: &[u8]) -> Result<RootCapability, FsError> {
        let root_path = FsPath::root();
        let mut forest = self.load_forest(forest).await?;

        let key = Secret::from_key_material(wnfs_key);
        let label = NamePoint::derive(&key, "");
        if forest.contains(&label) {
            return Err(FsError::AlreadyExists(root_path.to_string()));
        }

        let dir_path = root_path.join(DEFAULT_ROOT_DIR);
        let dir_key = key.derive_child(DEFAULT_ROOT_DIR);
        let dir_label = NamePoint::derive(&dir_key, DEFAULT_ROOT_DIR);
        let dir = PrivateNode::Dir(PrivateDirectory::new().map_err(|e| node_error(e, &dir_path))?);
        let dir_cid = dir
            .store(&dir_key, &self.store)
            .await
            .map_err(|e| node_error(e, &dir_path))?;
        forest.put(dir_label, dir_cid);

        let mut top = PrivateDirectory::new().map_err(|e| node_error(e, &root_path))?;
        top.insert(DEFAULT_ROOT_DIR, dir.link(dir_label, dir_key, DEFAULT_ROOT_DIR))
            .map_err(|e| node_error(e, &root_path))?;
        let top_cid = PrivateNode::Dir(top)
            .store(&key, &self.store)
            .await
            .map_err(|e| node_error(e, &root_path))?;
        forest.put(label, top_cid);

        let forest_cid = forest
            .store(&self.store)
            .await
            .map_err(|e| forest_error(e, &root_path))?;
        tracing::info!(
            "PrivateFs::create_root: new tree {:?} in forest {}",
            label,
            forest_cid
        );
        Ok(RootCapability::new(forest_cid, PrivateRef::new(label, key)))
    }

    /// Create a forest and a tree in it
    pub async fn init(&self, wnfs_key: &[u8]) -> Result<RootCapability, FsError> {
        let forest = self.create_forest().await?;
        self.create_root(&forest, wnfs_key).await
    }

    /// Find the latest revision of the tree keyed by `wnfs_key` in `forest`.
    ///
    /// Revision keys are a ratchet over the first one, so we walk it forward
    /// for as long as the forest knows the next root label.
    pub async fn load_with_key(&self, forest: &Cid, wnfs_key: &[u8]) -> Result<RootCapability, FsError> {
        let loaded = self.load_forest(forest).await?;

        let mut key = Secret::from_key_material(wnfs_key);
        let mut label = NamePoint::derive(&key, "");
        if !loaded.contains(&label) {
            return Err(FsError::NotFound(FsPath::root().to_string()));
        }

        let mut revision = 0u64;
        loop {
            let next_key = key.ratchet();
            let next_label = NamePoint::derive(&next_key, "");
            if !loaded.contains(&next_label) {
                break;
            }
            key = next_key;
            label = next_label;
            revision += 1;
        }

        tracing::debug!(
            "PrivateFs::load_with_key: latest revision {} at {:?}",
            revision,
            label
        );
        Ok(RootCapability::new(*forest, PrivateRef::new(label, key)))
    }

    /// Write `content` to `path`, replacing an existing file
    pub async fn write_file(
        &self,
        capability: &RootCapability,
        path: &str,
        content: &[u8],
    ) -> Result<RootCapability, FsError> {
        let path = parse_non_root(path)?;
        tracing::debug!("PrivateFs::write_file: {} ({} bytes)", path, content.len());

        let mut session = self.session(capability).await?;
        session.write_file(&path, content).await?;
        session.commit().await
    }

    /// Write the contents of a local file to `path`, streaming it chunk by
    /// chunk
    pub async fn write_file_from_path(
        &self,
        capability: &RootCapability,
        path: &str,
        source: &Path,
    ) -> Result<RootCapability, FsError> {
        let path = parse_non_root(path)?;
        tracing::debug!("PrivateFs::write_file_from_path: {:?} -> {}", source, path);

        let file = File::open(source)
            .await
            .map_err(|e| source_error(source, e))?;

        let mut session = self.session(capability).await?;
        let size = session
            .write_file(&path, BufReader::new(file))
            .await
            .map_err(|e| match e {
                FsError::SourceRead { source: err, .. } => source_error(source, err),
                e => e,
            })?;
        tracing::debug!("PrivateFs::write_file_from_path: read {} bytes", size);
        session.commit().await
    }

    /// Read the whole file at `path` into memory
    pub async fn read_file(&self, capability: &RootCapability, path: &str) -> Result<Vec<u8>, FsError> {
        let path = parse_non_root(path)?;
        let mut session = self.session(capability).await?;
        let (file, key) = session.file(&path).await?;
        file.read_content(&key, &self.store)
            .await
            .map_err(|e| node_error(e, &path))
    }

    /// Read the file at `path` and write it to `sink` in one go. Returns the
    /// sink path.
    pub async fn read_file_to_path(
        &self,
        capability: &RootCapability,
        path: &str,
        sink: &Path,
    ) -> Result<PathBuf, FsError> {
        let content = self.read_file(capability, path).await?;
        tokio::fs::write(sink, &content)
            .await
            .map_err(|e| sink_error(sink, e))?;
        tracing::debug!(
            "PrivateFs::read_file_to_path: {} bytes to {:?}",
            content.len(),
            sink
        );
        Ok(sink.to_path_buf())
    }

    /// Stream the file at `path` into `sink` one chunk at a time. Returns the
    /// sink path.
    ///
    /// Content lands in a temporary file next to `sink` that only replaces it
    /// once every chunk was decrypted and written, so a failed read never
    /// leaves partial plaintext behind.
    pub async fn read_filestream_to_path(
        &self,
        capability: &RootCapability,
        path: &str,
        sink: &Path,
    ) -> Result<PathBuf, FsError> {
        let path = parse_non_root(path)?;
        let mut session = self.session(capability).await?;
        let (file, key) = session.file(&path).await?;

        let dir = sink
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let (out, staged) = tempfile::NamedTempFile::new_in(dir)
            .map_err(|e| sink_error(sink, e))?
            .into_parts();
        let mut writer = BufWriter::new(File::from_std(out));
        let written = file
            .write_content_to(&key, &self.store, &mut writer)
            .await
            .map_err(|e| match node_error(e, &path) {
                FsError::SinkWrite { source, .. } => sink_error(sink, source),
                e => e,
            })?;
        writer.shutdown().await.map_err(|e| sink_error(sink, e))?;
        drop(writer);
        staged.persist(sink).map_err(|e| sink_error(sink, e.error))?;

        tracing::debug!(
            "PrivateFs::read_filestream_to_path: streamed {} bytes to {:?}",
            written,
            sink
        );
        Ok(sink.to_path_buf())
    }

    /// Create an empty directory. The parent must exist.
    pub async fn mkdir(&self, capability: &RootCapability, path: &str) -> Result<RootCapability, FsError> {
        let path = parse_non_root(path)?;
        tracing::debug!("PrivateFs::mkdir: {}", path);

        let mut session = self.session(capability).await?;
        session.create_dir(&path).await?;
        session.commit().await
    }

    /// Remove a file or a whole directory
    pub async fn rm(&self, capability: &RootCapability, path: &str) -> Result<RootCapability, FsError> {
        let path = parse_non_root(path)?;
        tracing::debug!("PrivateFs::rm: {}", path);

        let mut session = self.session(capability).await?;
        session.unlink(&path).await?;
        session.commit().await
    }

    /// Copy a file or directory. Content is shared with the source, not
    /// re-encrypted.
    pub async fn cp(
        &self,
        capability: &RootCapability,
        from: &str,
        to: &str,
    ) -> Result<RootCapability, FsError> {
        let from = parse_non_root(from)?;
        let to = parse_non_root(to)?;
        tracing::debug!("PrivateFs::cp: {} -> {}", from, to);

        let mut session = self.session(capability).await?;
        let link = session.link(&from).await?;
        session.ensure_absent(&to).await?;
        if let Some((_, name)) = to.split_last() {
            session.link_at(&to, link.renamed(name)).await?;
        }
        session.commit().await
    }

    /// Move or rename a file or directory
    ///
    /// # Errors
    ///
    /// - `NotFound` - source path doesn't exist
    /// - `AlreadyExists` - destination path already exists
    /// - `MoveIntoSelf` - destination is the source or lies inside it
    /// - `InvalidPath` - either path is the top directory
    pub async fn mv(
        &self,
        capability: &RootCapability,
        from: &str,
        to: &str,
    ) -> Result<RootCapability, FsError> {
        let from = parse_non_root(from)?;
        let to = parse_non_root(to)?;
        if to.starts_with(&from) {
            return Err(FsError::MoveIntoSelf {
                from: from.to_string(),
                to: to.to_string(),
            });
        }
        tracing::debug!("PrivateFs::mv: {} -> {}", from, to);

        let mut session = self.session(capability).await?;
        let link = session.link(&from).await?;
        session.ensure_absent(&to).await?;
        session.unlink(&from).await?;
        if let Some((_, name)) = to.split_last() {
            session.link_at(&to, link.renamed(name)).await?;
        }
        session.commit().await
    }

    /// List a directory, sorted by name
    pub async fn ls(
        &self,
        capability: &RootCapability,
        path: &str,
    ) -> Result<Vec<(String, EntryMetadata)>, FsError> {
        let path = FsPath::parse(path)?;
        let mut session = self.session(capability).await?;
        session.list(&path).await
    }

    pub async fn load_forest(&self, forest: &Cid) -> Result<PrivateForest, FsError> {
        PrivateForest::load(forest, &self.store)
            .await
            .map_err(|e| forest_error(e, &FsPath::root()))
    }

    /// Store the union of two forests. Lineages that diverged from a common
    /// revision show up as conflicts in the result.
    pub async fn merge_forests(&self, a: &Cid, b: &Cid) -> Result<Cid, FsError> {
        let (left, right) = futures::try_join!(self.load_forest(a), self.load_forest(b))?;
        let mut merged = left.merge(&right);

        let conflicts = merged.conflicts().count();
        if conflicts > 0 {
            tracing::warn!(
                "PrivateFs::merge_forests: {} and {} diverged on {} labels",
                a,
                b,
                conflicts
            );
        }

        let cid = merged
            .store(&self.store)
            .await
            .map_err(|e| forest_error(e, &FsPath::root()))?;
        tracing::debug!("PrivateFs::merge_forests: merged into {}", cid);
        Ok(cid)
    }

    async fn session(&self, capability: &RootCapability) -> Result<Session<'_, S>, FsError> {
        Session::open(&self.store, &self.config, capability).await
    }
}

fn parse_non_root(path: &str) -> Result<FsPath, FsError> {
    let parsed = FsPath::parse(path)?;
    if parsed.is_root() {
        return Err(FsError::InvalidPath(path.to_string()));
    }
    Ok(parsed)
}

fn source_error(source: &Path, err: std::io::Error) -> FsError {
    FsError::SourceRead {
        path: source.to_path_buf(),
        source: err,
    }
}

fn sink_error(sink: &Path, source: std::io::Error) -> FsError {
    FsError::SinkWrite {
        path: sink.to_path_buf(),
        source,
    }
}
