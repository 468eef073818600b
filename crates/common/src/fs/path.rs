use std::fmt;

use super::FsError;

/// A normalized path inside a private tree
///
/// Empty segments are dropped, so leading, trailing and repeated slashes do
/// not matter and the empty path names the top directory.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FsPath {
    segments: Vec<String>,
}

impl FsPath {
    pub fn parse(path: &str) -> Result<Self, FsError> {
        let segments = path
            .split('/')
            .filter(|segment| !segment.is_empty())
            .map(|segment| match segment {
                "." | ".." => Err(FsError::InvalidPath(path.to_string())),
                s if s.contains('\0') => Err(FsError::InvalidPath(path.to_string())),
                s => Ok(s.to_string()),
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { segments })
    }

    pub fn root() -> Self {
        Self::default()
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Split into parent and final segment. `None` for the top directory.
    pub fn split_last(&self) -> Option<(FsPath, &str)> {
        let (last, parent) = self.segments.split_last()?;
        Some((
            FsPath {
                segments: parent.to_vec(),
            },
            last.as_str(),
        ))
    }

    pub fn join(&self, segment: &str) -> FsPath {
        let mut segments = self.segments.clone();
        segments.push(segment.to_string());
        FsPath { segments }
    }

    /// Whether `self` is `other` or lies beneath it
    pub fn starts_with(&self, other: &FsPath) -> bool {
        self.segments.starts_with(&other.segments)
    }
}

impl fmt::Display for FsPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.segments.join("/"))
    }
}
