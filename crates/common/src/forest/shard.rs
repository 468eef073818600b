//! Sharded block layout of the forest
//!
//! Names are spread over a 16-way trie keyed on the nibbles of their bytes.
//! A subtree holding at most [`BUCKET_SIZE`] names is written as a single
//! bucket block, larger ones branch on the next nibble:
//!
//! ```text
//! branch ""  { "3" -> branch "3" { "a" -> bucket "3a" { 3a01.. , 3af2.. } ... } ... }
//! ```
//!
//! The layout only depends on the names present, so equal forests always
//! land on equal root CIDs. Persisting after a put rewrites the blocks on
//! the path to that name; every other subtree keeps its CID.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::linked_data::{BlockEncoded, Cid, DagCborCodec};
use crate::store::{get_cbor, put_cbor, BlockStore};

use super::{ForestError, NamePoint, NAME_POINT_SIZE};

/// Most names a single bucket block holds
pub const BUCKET_SIZE: usize = 32;

/// One nibble per level, so no path is longer than this
pub(super) const MAX_DEPTH: usize = NAME_POINT_SIZE * 2;

pub(super) type Entries = BTreeMap<NamePoint, BTreeSet<Cid>>;

/// Nibble path from the trie root
pub(super) type Prefix = Vec<u8>;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum ShardNode {
    Bucket(Entries),
    // keyed by the next nibble as a single hex digit
    Branch(BTreeMap<String, Cid>),
}

impl BlockEncoded<DagCborCodec> for ShardNode {}

/// Full nibble path of `name`
pub(super) fn nibbles(name: &NamePoint) -> Prefix {
    name.as_bytes()
        .iter()
        .flat_map(|byte| [byte >> 4, byte & 0x0f])
        .collect()
}

// Smallest and largest name under `prefix`. Names order by their bytes, so
// everything below a prefix is one contiguous range of the map.
fn bounds(prefix: &[u8]) -> (NamePoint, NamePoint) {
    let mut lo = [0x00u8; NAME_POINT_SIZE];
    let mut hi = [0xffu8; NAME_POINT_SIZE];
    for (depth, nibble) in prefix.iter().enumerate() {
        let byte = depth / 2;
        if depth % 2 == 0 {
            lo[byte] = nibble << 4;
            hi[byte] = (nibble << 4) | 0x0f;
        } else {
            lo[byte] |= nibble;
            hi[byte] = (hi[byte] & 0xf0) | nibble;
        }
    }
    (NamePoint::from_bytes(lo), NamePoint::from_bytes(hi))
}

fn under<'a>(
    entries: &'a Entries,
    prefix: &[u8],
) -> std::collections::btree_map::Range<'a, NamePoint, BTreeSet<Cid>> {
    let (lo, hi) = bounds(prefix);
    entries.range(lo..=hi)
}

/// Write the subtree at `prefix`, reusing every subtree already in `shards`.
/// Records the CIDs it wrote in `shards`.
pub(super) async fn store_shard<S>(
    store: &S,
    entries: &Entries,
    prefix: Prefix,
    shards: &mut BTreeMap<Prefix, Cid>,
) -> Result<Cid, ForestError>
where
    S: BlockStore + ?Sized,
{
    if let Some(cid) = shards.get(&prefix) {
        return Ok(*cid);
    }

    let names = under(entries, &prefix);
    let node = if prefix.len() >= MAX_DEPTH || names.clone().count() <= BUCKET_SIZE {
        ShardNode::Bucket(names.map(|(name, values)| (*name, values.clone())).collect())
    } else {
        let mut children = BTreeMap::new();
        for nibble in 0..16u8 {
            let mut child = prefix.clone();
            child.push(nibble);
            if under(entries, &child).next().is_none() {
                continue;
            }
            let cid = Box::pin(store_shard(store, entries, child, shards)).await?;
            children.insert(format!("{:x}", nibble), cid);
        }
        ShardNode::Branch(children)
    };

    let cid = put_cbor(store, &node).await?;
    tracing::trace!("store_shard: shard {:?} stored as {}", prefix, cid);
    shards.insert(prefix, cid);
    Ok(cid)
}

/// Read the subtree at `cid` into `entries`, remembering each block it read
/// in `shards`
pub(super) async fn load_shard<S>(
    store: &S,
    cid: &Cid,
    prefix: Prefix,
    entries: &mut Entries,
    shards: &mut BTreeMap<Prefix, Cid>,
) -> Result<(), ForestError>
where
    S: BlockStore + ?Sized,
{
    if prefix.len() > MAX_DEPTH {
        return Err(ForestError::Malformed(format!("shard {} is nested too deep", cid)));
    }

    let node: ShardNode = get_cbor(store, cid).await?;
    match node {
        ShardNode::Bucket(names) => {
            for (name, values) in names {
                if !nibbles(&name).starts_with(&prefix) {
                    return Err(ForestError::Malformed(format!(
                        "{:?} sits outside of shard {}",
                        name, cid
                    )));
                }
                entries.entry(name).or_default().extend(values);
            }
        }
        ShardNode::Branch(children) => {
            for (digit, child_cid) in children {
                let nibble = match u8::from_str_radix(&digit, 16) {
                    Ok(nibble) if digit.len() == 1 => nibble,
                    _ => {
                        return Err(ForestError::Malformed(format!(
                            "shard {} branches on {:?}",
                            cid, digit
                        )))
                    }
                };
                let mut child = prefix.clone();
                child.push(nibble);
                Box::pin(load_shard(store, &child_cid, child, entries, shards)).await?;
            }
        }
    }

    shards.insert(prefix, *cid);
    Ok(())
}
