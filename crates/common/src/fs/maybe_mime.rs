use std::path::Path;
use std::str::FromStr;

use mime::Mime;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// An optional MIME type that serializes as a plain string (or null)
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MaybeMime(pub Option<Mime>);

impl MaybeMime {
    /// Guess the MIME type from the extension of an entry name
    pub fn from_name(name: &str) -> Self {
        MaybeMime(mime_guess::from_path(Path::new(name)).first())
    }

    pub fn as_ref(&self) -> Option<&Mime> {
        self.0.as_ref()
    }
}

impl Serialize for MaybeMime {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match &self.0 {
            Some(mime) => serializer.serialize_str(mime.as_ref()),
            None => serializer.serialize_none(),
        }
    }
}

impl<'de> Deserialize<'de> for MaybeMime {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let opt: Option<String> = Option::deserialize(deserializer)?;
        match opt {
            Some(s) => {
                let mime = Mime::from_str(&s).map_err(serde::de::Error::custom)?;
                Ok(MaybeMime(Some(mime)))
            }
            None => Ok(MaybeMime(None)),
        }
    }
}
