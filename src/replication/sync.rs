//! Sync job: pushes one chunk to freshly selected peers and records who now holds it.

use crate::chunkserver::client::PeerClient;
use crate::chunkserver::records::MetadataRecords;
use crate::chunkserver::types::ChunkRecord;
use crate::config::{NodeConfig, ReplicaUpdateMode};
use crate::membership::{LivenessService, NodeId};
use crate::storage::{ChunkStore, select_replicas};

use anyhow::{Context, Result, anyhow, bail};
use bytes::Bytes;
use std::sync::Arc;

/// Conflicting writes tolerated before a versioned commit gives up.
const MAX_COMMIT_ATTEMPTS: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The listed peers received the chunk and were added to its replica set.
    Replicated(Vec<NodeId>),
    /// The selector returned nobody; nothing was pushed.
    NoEligiblePeers,
    /// Every push failed; the chunk record was left untouched.
    AllPeersFailed,
}

pub struct SyncJob {
    local_id: NodeId,
    chunks: ChunkStore,
    records: Arc<MetadataRecords>,
    liveness: Arc<LivenessService>,
    peers: Arc<dyn PeerClient>,
    update_mode: ReplicaUpdateMode,
}

impl SyncJob {
    pub fn new(
        config: &NodeConfig,
        chunks: ChunkStore,
        records: Arc<MetadataRecords>,
        liveness: Arc<LivenessService>,
        peers: Arc<dyn PeerClient>,
    ) -> Self {
        Self {
            local_id: liveness.local_id().clone(),
            chunks,
            records,
            liveness,
            peers,
            update_mode: config.replica_update,
        }
    }

    pub async fn run(&self, chunk_id: &str) -> Result<SyncOutcome> {
        let (chunk, version) = self
            .records
            .load_chunk(chunk_id)
            .await
            .with_context(|| format!("failed to load record of chunk {}", chunk_id))?;
        let file = self
            .records
            .load_file(&chunk.file_id)
            .await
            .with_context(|| format!("failed to load file {} of chunk {}", chunk.file_id, chunk_id))?;
        let workers = self
            .liveness
            .alive_workers()
            .await
            .context("failed to list live workers")?;

        let targets = select_replicas(&workers, &self.local_id, file.desired_replicas);
        if targets.is_empty() {
            tracing::warn!(
                "No replica targets for chunk {} (desired {}, {} live workers)",
                chunk_id,
                file.desired_replicas,
                workers.len()
            );
            return Ok(SyncOutcome::NoEligiblePeers);
        }

        let data = Bytes::from(
            self.chunks
                .read(chunk_id)
                .await
                .with_context(|| format!("failed to read local chunk {}", chunk_id))?,
        );

        let mut succeeded = Vec::with_capacity(targets.len());
        for peer in targets {
            match self.push_to(&peer, chunk_id, data.clone()).await {
                Ok(()) => {
                    tracing::debug!("Pushed chunk {} to {}", chunk_id, peer);
                    succeeded.push(peer);
                }
                Err(e) => {
                    tracing::warn!("Failed to push chunk {} to {}: {:#}", chunk_id, peer, e)
                }
            }
        }

        if succeeded.is_empty() {
            tracing::warn!("Chunk {} reached no peer, replica set unchanged", chunk_id);
            return Ok(SyncOutcome::AllPeersFailed);
        }

        self.commit_replicas(chunk, version, &succeeded).await?;
        tracing::info!("Replicated chunk {} to {:?}", chunk_id, succeeded);
        Ok(SyncOutcome::Replicated(succeeded))
    }

    async fn push_to(&self, peer: &NodeId, chunk_id: &str, data: Bytes) -> Result<()> {
        let addr = self
            .liveness
            .resolve_addr(peer)
            .await?
            .ok_or_else(|| anyhow!("{} has no live worker entry", peer))?;

        self.peers.push_chunk(&addr, chunk_id, data).await?;
        Ok(())
    }

    /// Writes `succeeded` into the replica set of `chunk`, read at `version`.
    ///
    /// Last-writer-wins puts the grown snapshot back unconditionally, so a concurrent
    /// commit on the same chunk can be overwritten. Versioned mode swaps on `version`
    /// and re-reads and merges on conflict.
    pub async fn commit_replicas(
        &self,
        mut chunk: ChunkRecord,
        mut version: u64,
        succeeded: &[NodeId],
    ) -> Result<()> {
        match self.update_mode {
            ReplicaUpdateMode::LastWriterWins => {
                chunk.add_replicas(succeeded);
                self.records.put_chunk(&chunk).await?;
                Ok(())
            }
            ReplicaUpdateMode::Versioned => {
                for attempt in 1..=MAX_COMMIT_ATTEMPTS {
                    if chunk.add_replicas(succeeded) == 0 && attempt > 1 {
                        return Ok(());
                    }
                    if self.records.compare_and_put_chunk(&chunk, version).await? {
                        return Ok(());
                    }

                    tracing::debug!(
                        "Replica set of chunk {} changed underneath (attempt {}), re-reading",
                        chunk.id, attempt
                    );
                    let (latest, latest_version) = self.records.load_chunk(&chunk.id).await?;
                    chunk = latest;
                    version = latest_version;
                }
                bail!(
                    "gave up updating replicas of chunk {} after {} conflicting writes",
                    chunk.id,
                    MAX_COMMIT_ATTEMPTS
                )
            }
        }
    }
}
