use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::crypto::Secret;
use crate::linked_data::{Cid, LD_RAW_CODEC};
use crate::store::{require_block, BlockStore};

use super::config::FsConfig;
use super::node::{Metadata, NodeError};

/// Where the bytes of a file live
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FileContent {
    /// Small files are kept inside the (encrypted) file node
    Inline(Vec<u8>),
    /// Ordered chunk blocks, each sealed with the file key
    Chunked(Vec<Cid>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrivateFile {
    metadata: Metadata,
    size: u64,
    content: FileContent,
}

impl PrivateFile {
    pub async fn from_bytes<S>(
        data: &[u8],
        key: &Secret,
        config: &FsConfig,
        store: &S,
    ) -> Result<Self, NodeError>
    where
        S: BlockStore + ?Sized,
    {
        Self::from_reader(data, key, config, store).await
    }

    /// Build a file from a byte source, encrypting and storing chunks as
    /// they are read. At most one chunk is held in memory.
    pub async fn from_reader<R, S>(
        mut reader: R,
        key: &Secret,
        config: &FsConfig,
        store: &S,
    ) -> Result<Self, NodeError>
    where
        R: AsyncRead + Unpin,
        S: BlockStore + ?Sized,
    {
        let chunk_size = config.chunk_size();

        let (first, eof) = fill_chunk(&mut reader, chunk_size).await?;
        if eof && first.len() <= config.inline_threshold() {
            tracing::debug!("PrivateFile::from_reader: {} bytes inline", first.len());
            return Ok(Self {
                metadata: Metadata::new(),
                size: first.len() as u64,
                content: FileContent::Inline(first),
            });
        }

        let mut chunks = Vec::new();
        let mut size = 0u64;
        let mut chunk = first;
        let mut eof = eof;
        loop {
            if !chunk.is_empty() {
                size += chunk.len() as u64;
                let sealed = key.encrypt(&chunk)?;
                chunks.push(store.put_block(sealed, LD_RAW_CODEC).await?);
            }
            if eof {
                break;
            }
            (chunk, eof) = fill_chunk(&mut reader, chunk_size).await?;
        }

        tracing::debug!(
            "PrivateFile::from_reader: {} bytes in {} chunks",
            size,
            chunks.len()
        );
        Ok(Self {
            metadata: Metadata::new(),
            size,
            content: FileContent::Chunked(chunks),
        })
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn content(&self) -> &FileContent {
        &self.content
    }

    /// Chunk blocks this file references
    pub fn blocks(&self) -> &[Cid] {
        match &self.content {
            FileContent::Inline(_) => &[],
            FileContent::Chunked(chunks) => chunks,
        }
    }

    /// Read the whole file into memory
    pub async fn read_content<S>(&self, key: &Secret, store: &S) -> Result<Vec<u8>, NodeError>
    where
        S: BlockStore + ?Sized,
    {
        let mut buf = Vec::with_capacity(self.size as usize);
        self.write_content_to(key, store, &mut buf).await?;
        Ok(buf)
    }

    /// Stream the file into `writer` chunk by chunk, returning the number of
    /// bytes written
    pub async fn write_content_to<S, W>(
        &self,
        key: &Secret,
        store: &S,
        writer: &mut W,
    ) -> Result<u64, NodeError>
    where
        S: BlockStore + ?Sized,
        W: AsyncWrite + Unpin,
    {
        let mut written = 0u64;
        match &self.content {
            FileContent::Inline(data) => {
                writer.write_all(data).await.map_err(NodeError::Sink)?;
                written += data.len() as u64;
            }
            FileContent::Chunked(chunks) => {
                for cid in chunks {
                    let sealed = require_block(store, cid).await?;
                    let chunk = key.decrypt(&sealed).map_err(NodeError::Integrity)?;
                    writer.write_all(&chunk).await.map_err(NodeError::Sink)?;
                    written += chunk.len() as u64;
                }
            }
        }
        writer.flush().await.map_err(NodeError::Sink)?;
        Ok(written)
    }
}

// Read until `chunk_size` bytes are buffered or the source is exhausted
async fn fill_chunk<R>(reader: &mut R, chunk_size: usize) -> Result<(Vec<u8>, bool), NodeError>
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; chunk_size];
    let mut filled = 0;
    while filled < chunk_size {
        let n = reader
            .read(&mut buf[filled..])
            .await
            .map_err(NodeError::Source)?;
        if n == 0 {
            buf.truncate(filled);
            return Ok((buf, true));
        }
        filled += n;
    }
    Ok((buf, false))
}
