use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::crypto::{Secret, SECRET_SIZE};
use crate::forest::{NamePoint, NAME_POINT_SIZE};
use crate::linked_data::multibase::{self, Base};
use crate::linked_data::Cid;

const PRIVATE_REF_SIZE: usize = NAME_POINT_SIZE + SECRET_SIZE;

#[derive(Debug, thiserror::Error)]
pub enum CapabilityError {
    #[error("invalid forest cid: {0}")]
    Cid(#[from] cid::Error),
    #[error("invalid private ref encoding: {0}")]
    Multibase(#[from] multibase::Error),
    #[error("invalid private ref size, expected {PRIVATE_REF_SIZE}, got {0}")]
    InvalidSize(usize),
    #[error("malformed capability: {0}")]
    Malformed(String),
}

/// Label and key of one revision of the root directory.
///
/// Never written to the block store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrivateRef {
    label: NamePoint,
    key: Secret,
}

impl PrivateRef {
    pub fn new(label: NamePoint, key: Secret) -> Self {
        Self { label, key }
    }

    pub fn label(&self) -> &NamePoint {
        &self.label
    }

    pub fn key(&self) -> &Secret {
        &self.key
    }

    pub fn to_bytes(&self) -> [u8; PRIVATE_REF_SIZE] {
        let mut buff = [0u8; PRIVATE_REF_SIZE];
        buff[..NAME_POINT_SIZE].copy_from_slice(self.label.as_bytes());
        buff[NAME_POINT_SIZE..].copy_from_slice(self.key.bytes());
        buff
    }

    pub fn from_slice(data: &[u8]) -> Result<Self, CapabilityError> {
        if data.len() != PRIVATE_REF_SIZE {
            return Err(CapabilityError::InvalidSize(data.len()));
        }
        let label = NamePoint::from_slice(&data[..NAME_POINT_SIZE])
            .map_err(|e| CapabilityError::Malformed(e.to_string()))?;
        let key = Secret::from_slice(&data[NAME_POINT_SIZE..])
            .map_err(|e| CapabilityError::Malformed(e.to_string()))?;
        Ok(Self { label, key })
    }
}

impl fmt::Display for PrivateRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", multibase::encode(Base::Base58Btc, self.to_bytes()))
    }
}

impl FromStr for PrivateRef {
    type Err = CapabilityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (_, bytes) = multibase::decode(s)?;
        Self::from_slice(&bytes)
    }
}

/// Everything needed to reopen one state of a tree: the forest to resolve
/// labels in, and the private ref of the root revision.
///
/// Capabilities are immutable values. Each mutation hands back a new one
/// and the old one keeps opening the old state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "CapabilityStrings", into = "CapabilityStrings")]
pub struct RootCapability {
    forest: Cid,
    private_ref: PrivateRef,
}

impl RootCapability {
    pub fn new(forest: Cid, private_ref: PrivateRef) -> Self {
        Self {
            forest,
            private_ref,
        }
    }

    pub fn forest(&self) -> &Cid {
        &self.forest
    }

    pub fn private_ref(&self) -> &PrivateRef {
        &self.private_ref
    }

    /// The forest cid and the encoded private ref, in that order
    pub fn to_strings(&self) -> (String, String) {
        (self.forest.to_string(), self.private_ref.to_string())
    }

    pub fn from_strings(forest: &str, private_ref: &str) -> Result<Self, CapabilityError> {
        Ok(Self {
            forest: Cid::try_from(forest)?,
            private_ref: private_ref.parse()?,
        })
    }
}

impl fmt::Display for RootCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.forest, self.private_ref)
    }
}

impl FromStr for RootCapability {
    type Err = CapabilityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (forest, private_ref) = s
            .split_once(':')
            .ok_or_else(|| CapabilityError::Malformed(format!("missing separator in {s:?}")))?;
        Self::from_strings(forest, private_ref)
    }
}

#[derive(Serialize, Deserialize)]
struct CapabilityStrings {
    forest: String,
    private_ref: String,
}

impl From<RootCapability> for CapabilityStrings {
    fn from(cap: RootCapability) -> Self {
        let (forest, private_ref) = cap.to_strings();
        Self {
            forest,
            private_ref,
        }
    }
}

impl TryFrom<CapabilityStrings> for RootCapability {
    type Error = CapabilityError;

    fn try_from(strings: CapabilityStrings) -> Result<Self, Self::Error> {
        Self::from_strings(&strings.forest, &strings.private_ref)
    }
}
