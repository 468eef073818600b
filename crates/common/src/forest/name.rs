use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::crypto::Secret;

/// Size of a name point in bytes
pub const NAME_POINT_SIZE: usize = 32;

const NAME_POINT_DOMAIN: &[u8] = b"privfs/name-point";

#[derive(Debug, thiserror::Error)]
pub enum NamePointError {
    #[error("invalid name point hex: {0}")]
    Hex(#[from] hex::FromHexError),
    #[error("invalid name point size, expected {NAME_POINT_SIZE}, got {0}")]
    InvalidSize(usize),
}

/// A private label for a path segment
///
/// Name points are derived from a key and a segment with keyed BLAKE3. Without
/// the key they reveal nothing about the name, so they can sit in plaintext
/// inside the forest. Serialized as lowercase hex, which also keeps them
/// usable as DAG-CBOR map keys.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NamePoint([u8; NAME_POINT_SIZE]);

impl NamePoint {
    pub fn derive(key: &Secret, segment: &str) -> Self {
        Self(key.keyed_hash(NAME_POINT_DOMAIN, segment.as_bytes()))
    }

    pub fn from_bytes(bytes: [u8; NAME_POINT_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn from_slice(data: &[u8]) -> Result<Self, NamePointError> {
        if data.len() != NAME_POINT_SIZE {
            return Err(NamePointError::InvalidSize(data.len()));
        }
        let mut buff = [0u8; NAME_POINT_SIZE];
        buff.copy_from_slice(data);
        Ok(Self(buff))
    }

    pub fn as_bytes(&self) -> &[u8; NAME_POINT_SIZE] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for NamePoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for NamePoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NamePoint({}..)", &self.to_hex()[..12])
    }
}

impl FromStr for NamePoint {
    type Err = NamePointError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s)?;
        Self::from_slice(&bytes)
    }
}

impl Serialize for NamePoint {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for NamePoint {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        NamePoint::from_str(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_derivation_depends_on_key_and_segment() {
        let key = Secret::from_key_material(b"test");
        let other = Secret::from_key_material(b"other");

        assert_eq!(
            NamePoint::derive(&key, "file.txt"),
            NamePoint::derive(&key, "file.txt")
        );
        assert_ne!(
            NamePoint::derive(&key, "file.txt"),
            NamePoint::derive(&key, "file1.txt")
        );
        assert_ne!(
            NamePoint::derive(&key, "file.txt"),
            NamePoint::derive(&other, "file.txt")
        );
    }

    #[test]
    fn test_name_point_is_not_a_child_key() {
        let key = Secret::from_key_material(b"test");
        let point = NamePoint::derive(&key, "dir");
        assert_ne!(point.as_bytes(), &*key.derive_child("dir"));
    }

    #[test]
    fn test_hex_roundtrip() {
        let point = NamePoint::derive(&Secret::default(), "x");
        let parsed: NamePoint = point.to_string().parse().unwrap();
        assert_eq!(parsed, point);

        assert!(matches!(
            "abcd".parse::<NamePoint>(),
            Err(NamePointError::InvalidSize(2))
        ));
        assert!("zz".parse::<NamePoint>().is_err());
    }

    #[test]
    fn test_serializes_as_string() {
        let point = NamePoint::derive(&Secret::default(), "x");
        let json = serde_json::to_string(&point).unwrap();
        assert_eq!(json, format!("\"{}\"", point.to_hex()));
    }
}
