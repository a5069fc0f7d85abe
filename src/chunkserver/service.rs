//! Request handling core of a chunk-server node.
//!
//! ## Operations
//! - **create_file**: one chunk per incoming message, padded to capacity, recorded
//!   before the next message is read; the file record is written last.
//! - **open_file / stream_file**: resolve the file record, then read each local chunk
//!   back and strip its padding.
//! - **remove_file**: best-effort fan-out of chunk deletes to every replica, then
//!   removal of the chunk and file records.
//! - **push_chunk / delete_chunk**: replica targets driven by other nodes.

use super::client::PeerClient;
use super::error::{ChunkServerError, Result};
use super::protocol::{FileChunkData, GenericResponse};
use super::records::MetadataRecords;
use super::types::{ChunkRecord, FileRecord, now_secs};
use crate::config::NodeConfig;
use crate::membership::{LivenessService, NodeId};
use crate::storage::ChunkStore;

use futures::stream::{self, BoxStream};
use futures::{Stream, StreamExt};
use std::fmt::Display;
use std::io;
use std::sync::Arc;
use uuid::Uuid;

pub struct ChunkServer {
    config: Arc<NodeConfig>,
    local_id: NodeId,
    chunks: ChunkStore,
    records: Arc<MetadataRecords>,
    liveness: Arc<LivenessService>,
    peers: Arc<dyn PeerClient>,
}

impl ChunkServer {
    pub fn new(
        config: Arc<NodeConfig>,
        chunks: ChunkStore,
        records: Arc<MetadataRecords>,
        liveness: Arc<LivenessService>,
        peers: Arc<dyn PeerClient>,
    ) -> Self {
        Self {
            local_id: liveness.local_id().clone(),
            config,
            chunks,
            records,
            liveness,
            peers,
        }
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn local_id(&self) -> &NodeId {
        &self.local_id
    }

    pub fn chunks(&self) -> &ChunkStore {
        &self.chunks
    }

    pub fn records(&self) -> &Arc<MetadataRecords> {
        &self.records
    }

    /// Ingests an upload stream. Aborts on the first failure without rolling back
    /// chunks already written.
    pub async fn create_file<S, E>(&self, mut messages: S) -> Result<FileRecord>
    where
        S: Stream<Item = std::result::Result<FileChunkData, E>> + Unpin,
        E: Display,
    {
        let file_id = Uuid::new_v4().to_string();
        let capacity = self.config.chunk_capacity;

        let mut file_name = String::new();
        let mut total_size: u64 = 0;
        let mut chunk_refs = Vec::new();

        while let Some(message) = messages.next().await {
            let message = message.map_err(|e| {
                ChunkServerError::WriteFailure(format!("failed to receive upload stream: {}", e))
            })?;

            let used_bytes = message.payload.len();
            if used_bytes > capacity {
                return Err(ChunkServerError::PayloadTooLarge(format!(
                    "payload of {} bytes exceeds the {} byte chunk capacity",
                    used_bytes, capacity
                )));
            }

            let chunk_id = Uuid::new_v4().to_string();
            let mut padded = message.payload;
            padded.resize(capacity, 0);

            self.chunks.append(&chunk_id, &padded).await.map_err(|e| {
                ChunkServerError::WriteFailure(format!("failed to write chunk {}: {}", chunk_id, e))
            })?;

            let chunk = ChunkRecord {
                id: chunk_id,
                nominal_size: capacity as u64,
                used_bytes: used_bytes as u64,
                file_id: file_id.clone(),
                replicas: vec![self.local_id.clone()],
            };
            self.records.put_chunk(&chunk).await?;
            tracing::debug!("Stored chunk {} ({} bytes) of file {}", chunk.id, used_bytes, file_id);

            total_size += chunk.used_bytes;
            chunk_refs.push(chunk.chunk_ref());
            file_name = message.file_name;
        }

        let now = now_secs();
        let file = FileRecord {
            id: file_id,
            name: file_name,
            total_size,
            desired_replicas: self.config.desired_replicas,
            created_at: now,
            updated_at: now,
            chunks: chunk_refs,
        };
        self.records.put_file(&file).await?;

        tracing::info!(
            "Created file {} ({:?}, {} bytes in {} chunks)",
            file.id,
            file.name,
            file.total_size,
            file.chunks.len()
        );
        Ok(file)
    }

    pub async fn open_file(&self, file_id: &str) -> Result<FileRecord> {
        self.records.load_file(file_id).await
    }

    /// Streams the file's chunks in order from the local disk.
    pub fn stream_file(&self, file: FileRecord) -> BoxStream<'static, Result<FileChunkData>> {
        let chunks = self.chunks.clone();
        let capacity = self.config.chunk_capacity;
        let FileRecord {
            name,
            chunks: chunk_refs,
            ..
        } = file;

        stream::iter(chunk_refs)
            .then(move |chunk_ref| {
                let chunks = chunks.clone();
                let file_name = name.clone();
                async move {
                    let payload = chunks
                        .read_used(&chunk_ref.id, capacity, chunk_ref.used_bytes as usize)
                        .await
                        .map_err(|e| {
                            ChunkServerError::ChunkUnavailable(format!(
                                "failed to read chunk {}: {}",
                                chunk_ref.id, e
                            ))
                        })?;
                    Ok(FileChunkData { payload, file_name })
                }
            })
            .boxed()
    }

    /// Removes a file and every replica of its chunks. Only the file lookup can fail;
    /// everything after it is logged and skipped.
    pub async fn remove_file(&self, file_id: &str) -> Result<GenericResponse> {
        let file = self.records.load_file(file_id).await?;

        for chunk_ref in &file.chunks {
            let replicas = match self.records.load_chunk(&chunk_ref.id).await {
                Ok((chunk, _)) => chunk.replicas,
                Err(e) => {
                    tracing::warn!(
                        "No usable record for chunk {} ({}), deleting local copy only",
                        chunk_ref.id, e
                    );
                    vec![self.local_id.clone()]
                }
            };

            for replica in &replicas {
                if let Err(e) = self.delete_replica(replica, &chunk_ref.id).await {
                    tracing::warn!("Failed to delete chunk {} on {}: {}", chunk_ref.id, replica, e);
                }
            }

            if let Err(e) = self.records.delete_chunk(&chunk_ref.id).await {
                tracing::warn!("Failed to delete record of chunk {}: {}", chunk_ref.id, e);
            }
        }

        if let Err(e) = self.records.delete_file(file_id).await {
            tracing::warn!("Failed to delete record of file {}: {}", file_id, e);
        }

        tracing::info!("Removed file {} ({} chunks)", file_id, file.chunks.len());
        Ok(GenericResponse::success())
    }

    async fn delete_replica(&self, replica: &NodeId, chunk_id: &str) -> Result<()> {
        if replica == &self.local_id {
            self.delete_chunk(chunk_id).await?;
            return Ok(());
        }

        let addr = self
            .liveness
            .resolve_addr(replica)
            .await
            .map_err(|e| ChunkServerError::MetadataReadFailure(e.to_string()))?
            .ok_or_else(|| {
                ChunkServerError::ChunkUnavailable(format!("{} has no live worker entry", replica))
            })?;

        self.peers.delete_chunk(&addr, chunk_id).await
    }

    /// Stores a replica pushed by the chunk's owner. No metadata is written here.
    pub async fn push_chunk(&self, chunk_id: &str, data: &[u8]) -> Result<GenericResponse> {
        self.chunks.write(chunk_id, data).await.map_err(|e| {
            ChunkServerError::WriteFailure(format!("failed to store replica {}: {}", chunk_id, e))
        })?;

        tracing::debug!("Stored replica of chunk {} ({} bytes)", chunk_id, data.len());
        Ok(GenericResponse::success())
    }

    pub async fn delete_chunk(&self, chunk_id: &str) -> Result<GenericResponse> {
        match self.chunks.remove(chunk_id).await {
            Ok(()) => {
                tracing::debug!("Deleted local chunk {}", chunk_id);
                Ok(GenericResponse::success())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(ChunkServerError::NotFound(format!("chunk {}", chunk_id)))
            }
            Err(e) => Err(ChunkServerError::WriteFailure(format!(
                "failed to delete chunk {}: {}",
                chunk_id, e
            ))),
        }
    }
}
