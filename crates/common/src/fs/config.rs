use serde::{Deserialize, Serialize};

/// Default size of a file chunk (256 KiB)
pub const DEFAULT_CHUNK_SIZE: usize = 256 * 1024;
/// Files up to this size are stored inside their node (16 KiB)
pub const DEFAULT_INLINE_THRESHOLD: usize = 16 * 1024;

/// Tuning knobs for how file content is laid out in blocks
///
/// Nothing here affects how existing trees are read: readers follow whatever
/// layout a file node records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FsConfig {
    /// Maximum plaintext bytes per chunk block
    pub chunk_size: usize,
    /// Files at or below this size skip chunking entirely
    pub inline_threshold: usize,
}

impl Default for FsConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            inline_threshold: DEFAULT_INLINE_THRESHOLD,
        }
    }
}

impl FsConfig {
    pub fn new(chunk_size: usize, inline_threshold: usize) -> Self {
        Self {
            chunk_size,
            inline_threshold,
        }
    }

    /// Chunk size actually used, never zero
    pub fn chunk_size(&self) -> usize {
        self.chunk_size.max(1)
    }

    /// Inline threshold actually used, never above the chunk size
    pub fn inline_threshold(&self) -> usize {
        self.inline_threshold.min(self.chunk_size())
    }
}
