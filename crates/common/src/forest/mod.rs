//! Private forest
//!
//! The forest is the only plaintext index the block store ever sees. It maps
//! [`NamePoint`]s to the set of encrypted blocks stored under them:
//!
//! ```text
//! NamePoint(k_root_3, "")      -> { bafkr..a }
//! NamePoint(k_docs_3, "docs")  -> { bafkr..b }
//! NamePoint(k_docs_2, "docs")  -> { bafkr..c }      <- older revision, still resolvable
//! NamePoint(k_x_7, "x")        -> { bafkr..d, bafkr..e }  <- two writers diverged
//! ```
//!
//! The map only grows. Every mutation of the tree adds labels for the
//! revisions it wrote and leaves older ones alone, which keeps every
//! previously handed out root capability resolvable.
//!
//! A label holding more than one value means two lineages wrote the same
//! revision independently. We never pick a winner: lookups through
//! [`PrivateForest::resolve`] fail with [`ForestError::Conflict`] and the
//! caller decides.
//!
//! In the block store the forest is a trie of shard blocks holding up to
//! [`BUCKET_SIZE`] names each, so a commit only rewrites the shards on the
//! paths of the names it added.

mod name;
mod shard;

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::linked_data::Cid;
use crate::store::{BlockStore, BlockStoreError};

pub use name::{NamePoint, NamePointError, NAME_POINT_SIZE};
pub use shard::BUCKET_SIZE;

use shard::{load_shard, nibbles, store_shard, Prefix, MAX_DEPTH};

#[derive(Debug, thiserror::Error)]
pub enum ForestError {
    #[error("name point {0} is not indexed")]
    NotFound(NamePoint),
    #[error("name point {name} holds {} conflicting values", .candidates.len())]
    Conflict {
        name: NamePoint,
        candidates: Vec<Cid>,
    },
    #[error("malformed forest: {0}")]
    Malformed(String),
    #[error("block store error: {0}")]
    BlockStore(#[from] BlockStoreError),
}

/// How a single name point differs between two forests
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForestChange {
    pub name: NamePoint,
    /// Values only present in the left forest
    pub removed: BTreeSet<Cid>,
    /// Values only present in the right forest
    pub added: BTreeSet<Cid>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PrivateForest {
    entries: BTreeMap<NamePoint, BTreeSet<Cid>>,
    // stored shards no put has touched since
    #[serde(skip)]
    shards: BTreeMap<Prefix, Cid>,
}

impl PartialEq for PrivateForest {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl Eq for PrivateForest {}

impl PrivateForest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index `cid` under `name`. Existing values are kept.
    ///
    /// Returns `true` if the value was not present yet.
    pub fn put(&mut self, name: NamePoint, cid: Cid) -> bool {
        let added = self.entries.entry(name).or_default().insert(cid);
        if added && !self.shards.is_empty() {
            let path = nibbles(&name);
            for depth in 0..=MAX_DEPTH {
                self.shards.remove(&path[..depth]);
            }
        }
        added
    }

    /// All values indexed under `name`, empty if the name is unknown
    pub fn get(&self, name: &NamePoint) -> BTreeSet<Cid> {
        self.entries.get(name).cloned().unwrap_or_default()
    }

    pub fn contains(&self, name: &NamePoint) -> bool {
        self.entries.contains_key(name)
    }

    /// Resolve `name` to exactly one value
    pub fn resolve(&self, name: &NamePoint) -> Result<Cid, ForestError> {
        let values = self
            .entries
            .get(name)
            .filter(|values| !values.is_empty())
            .ok_or(ForestError::NotFound(*name))?;
        if values.len() > 1 {
            return Err(ForestError::Conflict {
                name: *name,
                candidates: values.iter().copied().collect(),
            });
        }
        values
            .iter()
            .next()
            .copied()
            .ok_or(ForestError::NotFound(*name))
    }

    /// Number of indexed names
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NamePoint, &BTreeSet<Cid>)> {
        self.entries.iter()
    }

    /// Union of both forests. Names written by both sides keep every value,
    /// which is how diverged lineages become visible.
    pub fn merge(&self, other: &PrivateForest) -> PrivateForest {
        let mut merged = self.clone();
        for (name, values) in other.entries.iter() {
            for value in values {
                merged.put(*name, *value);
            }
        }
        merged
    }

    /// Names holding more than one value
    pub fn conflicts(&self) -> impl Iterator<Item = (&NamePoint, &BTreeSet<Cid>)> {
        self.entries.iter().filter(|(_, values)| values.len() > 1)
    }

    /// Every name whose value set differs between `self` and `other`
    pub fn diff(&self, other: &PrivateForest) -> Vec<ForestChange> {
        let empty = BTreeSet::new();
        let names: BTreeSet<&NamePoint> = self.entries.keys().chain(other.entries.keys()).collect();

        names
            .into_iter()
            .filter_map(|name| {
                let left = self.entries.get(name).unwrap_or(&empty);
                let right = other.entries.get(name).unwrap_or(&empty);
                if left == right {
                    return None;
                }
                Some(ForestChange {
                    name: *name,
                    removed: left.difference(right).copied().collect(),
                    added: right.difference(left).copied().collect(),
                })
            })
            .collect()
    }

    /// Write the forest into the store and return the CID of its top shard.
    /// Shards unchanged since the last load or store are not written again.
    pub async fn store<S>(&mut self, store: &S) -> Result<Cid, ForestError>
    where
        S: BlockStore + ?Sized,
    {
        let cached = self.shards.len();
        let cid = store_shard(store, &self.entries, Prefix::new(), &mut self.shards).await?;
        tracing::debug!(
            "PrivateForest::store: {} names stored as {}, {} of {} shards written",
            self.entries.len(),
            cid,
            self.shards.len() - cached,
            self.shards.len()
        );
        Ok(cid)
    }

    /// Load a forest previously written with [`PrivateForest::store`]
    pub async fn load<S>(cid: &Cid, store: &S) -> Result<Self, ForestError>
    where
        S: BlockStore + ?Sized,
    {
        tracing::debug!("PrivateForest::load: loading forest {}", cid);
        let mut forest = PrivateForest::new();
        load_shard(store, cid, Prefix::new(), &mut forest.entries, &mut forest.shards).await?;
        tracing::debug!(
            "PrivateForest::load: forest {} holds {} names in {} shards",
            cid,
            forest.entries.len(),
            forest.shards.len()
        );
        Ok(forest)
    }
}
