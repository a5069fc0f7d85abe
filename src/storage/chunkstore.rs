//! Local chunk files.
//!
//! Every chunk is one file named after its id directly under the data directory.
//! The store knows nothing about padding or metadata; callers hand it the exact
//! bytes to keep.

use std::io;
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

#[derive(Debug, Clone)]
pub struct ChunkStore {
    root: PathBuf,
}

impl ChunkStore {
    pub async fn open(root: impl AsRef<Path>) -> io::Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves a chunk id to its file, refusing ids that could leave the data directory.
    pub fn chunk_path(&self, chunk_id: &str) -> io::Result<PathBuf> {
        let invalid = chunk_id.is_empty()
            || chunk_id.starts_with('.')
            || chunk_id.contains("..")
            || chunk_id.contains('/')
            || chunk_id.contains('\\');

        if invalid {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid chunk id: {:?}", chunk_id),
            ));
        }

        Ok(self.root.join(chunk_id))
    }

    /// Appends to the chunk file, creating it if needed.
    pub async fn append(&self, chunk_id: &str, data: &[u8]) -> io::Result<()> {
        let path = self.chunk_path(chunk_id)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        file.write_all(data).await?;
        file.flush().await?;
        Ok(())
    }

    /// Replaces the chunk file's contents.
    pub async fn write(&self, chunk_id: &str, data: &[u8]) -> io::Result<()> {
        let path = self.chunk_path(chunk_id)?;
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&path)
            .await?;
        file.write_all(data).await?;
        file.flush().await?;
        Ok(())
    }

    /// Whole chunk file as stored, padding included.
    pub async fn read(&self, chunk_id: &str) -> io::Result<Vec<u8>> {
        let path = self.chunk_path(chunk_id)?;
        fs::read(&path).await
    }

    /// Reads at most `capacity` bytes from a fresh handle and keeps the first `used_bytes`.
    pub async fn read_used(
        &self,
        chunk_id: &str,
        capacity: usize,
        used_bytes: usize,
    ) -> io::Result<Vec<u8>> {
        let path = self.chunk_path(chunk_id)?;
        let file = fs::File::open(&path).await?;

        let mut buf = Vec::with_capacity(used_bytes.min(capacity));
        file.take(capacity as u64).read_to_end(&mut buf).await?;

        if buf.len() < used_bytes {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!(
                    "chunk {} holds {} bytes, record claims {}",
                    chunk_id,
                    buf.len(),
                    used_bytes
                ),
            ));
        }
        buf.truncate(used_bytes);
        Ok(buf)
    }

    pub async fn remove(&self, chunk_id: &str) -> io::Result<()> {
        let path = self.chunk_path(chunk_id)?;
        fs::remove_file(&path).await
    }

    pub async fn exists(&self, chunk_id: &str) -> bool {
        match self.chunk_path(chunk_id) {
            Ok(path) => fs::try_exists(&path).await.unwrap_or(false),
            Err(_) => false,
        }
    }
}
