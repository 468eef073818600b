//! Content identifiers and block codecs
//!
//! Everything that lands in a block store is addressed by a CIDv1 built from
//! a codec tag and the BLAKE3 digest of the stored bytes. Two codecs are in
//! use:
//!
//! - [`LD_RAW_CODEC`] for opaque bytes (every encrypted node and file chunk)
//! - [`LD_CBOR_CODEC`] for plaintext DAG-CBOR structures (the private forest)

use multihash::Multihash;
use serde::de::DeserializeOwned;
use serde::Serialize;

pub use cid::multibase;
pub use cid::Cid;

/// Multicodec tag for raw bytes
pub const LD_RAW_CODEC: u64 = 0x55;
/// Multicodec tag for DAG-CBOR
pub const LD_CBOR_CODEC: u64 = 0x71;
/// Multihash code for BLAKE3 (256 bit output)
pub const BLAKE3_HASH_CODE: u64 = 0x1e;
/// Size of a BLAKE3 digest in bytes
pub const BLAKE3_DIGEST_SIZE: usize = 32;

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("encode error: {0}")]
    Encode(String),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("multihash error: {0}")]
    Multihash(#[from] multihash::Error),
    #[error("unsupported hash code {0:#x}, expected blake3")]
    UnsupportedHash(u64),
}

/// A serialization format with a multicodec tag
pub trait Codec {
    const CODE: u64;

    fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, CodecError>;
    fn decode<T: DeserializeOwned>(data: &[u8]) -> Result<T, CodecError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DagCborCodec;

impl Codec for DagCborCodec {
    const CODE: u64 = LD_CBOR_CODEC;

    fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, CodecError> {
        serde_ipld_dagcbor::to_vec(value).map_err(|e| CodecError::Encode(e.to_string()))
    }

    fn decode<T: DeserializeOwned>(data: &[u8]) -> Result<T, CodecError> {
        serde_ipld_dagcbor::from_slice(data).map_err(|e| CodecError::Decode(e.to_string()))
    }
}

/// Types that know how to turn themselves into a block and back
pub trait BlockEncoded<C: Codec>: Serialize + DeserializeOwned {
    fn encode(&self) -> Result<Vec<u8>, CodecError> {
        C::encode(self)
    }

    fn decode(data: &[u8]) -> Result<Self, CodecError> {
        C::decode(data)
    }

    fn codec(&self) -> u64 {
        C::CODE
    }
}

/// Compute the content identifier of `data` stored under `codec`
pub fn content_id(codec: u64, data: &[u8]) -> Result<Cid, CodecError> {
    let digest = blake3::hash(data);
    cid_from_digest(codec, digest.as_bytes())
}

/// Build a CIDv1 around an already computed BLAKE3 digest
pub fn cid_from_digest(codec: u64, digest: &[u8; BLAKE3_DIGEST_SIZE]) -> Result<Cid, CodecError> {
    let hash = Multihash::<64>::wrap(BLAKE3_HASH_CODE, digest)?;
    Ok(Cid::new_v1(codec, hash))
}

/// Extract the BLAKE3 digest a CID was built from
pub fn blake3_digest(cid: &Cid) -> Result<[u8; BLAKE3_DIGEST_SIZE], CodecError> {
    let hash = cid.hash();
    if hash.code() != BLAKE3_HASH_CODE || hash.digest().len() != BLAKE3_DIGEST_SIZE {
        return Err(CodecError::UnsupportedHash(hash.code()));
    }
    let mut out = [0u8; BLAKE3_DIGEST_SIZE];
    out.copy_from_slice(hash.digest());
    Ok(out)
}

/// Check that `data` hashes to `cid`
pub fn verify(cid: &Cid, data: &[u8]) -> Result<bool, CodecError> {
    let expected = blake3_digest(cid)?;
    Ok(blake3::hash(data).as_bytes() == &expected)
}
