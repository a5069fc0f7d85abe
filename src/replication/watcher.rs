use super::pool::SyncQueue;
use crate::chunkserver::records::MetadataRecords;
use crate::chunkserver::types::ChunkRecord;
use crate::membership::NodeId;
use crate::metadata::{MetadataResult, WatchEvent, WatchStream};
use crate::shutdown::ShutdownSignal;

use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;

const RESUBSCRIBE_DELAY: Duration = Duration::from_secs(1);

/// A chunk needs a sync job only while the local node is its sole replica.
/// Once the set has grown, further writes of the record never re-trigger.
pub fn needs_sync(chunk: &ChunkRecord, local: &NodeId) -> bool {
    chunk.is_sole_replica(local)
}

pub struct ChunkWatcher {
    local_id: NodeId,
    records: Arc<MetadataRecords>,
    queue: SyncQueue,
}

impl ChunkWatcher {
    pub fn new(local_id: NodeId, records: Arc<MetadataRecords>, queue: SyncQueue) -> Self {
        Self {
            local_id,
            records,
            queue,
        }
    }

    /// Opens the watch on the chunk namespace. Call before serving requests so no
    /// chunk written afterwards is missed.
    pub async fn subscribe(&self) -> MetadataResult<WatchStream> {
        self.records
            .store()
            .watch_prefix(self.records.chunk_prefix())
            .await
    }

    pub async fn run(self, mut events: WatchStream, mut shutdown: ShutdownSignal) {
        tracing::info!("Watching {} for new chunks", self.records.chunk_prefix());

        loop {
            let next = tokio::select! {
                _ = shutdown.recv() => {
                    tracing::info!("Chunk watcher stopped");
                    return;
                }
                next = events.next() => next,
            };

            match next {
                Some(Ok(event)) => {
                    self.handle_event(event).await;
                }
                Some(Err(e)) => {
                    tracing::warn!("Chunk watch failed: {}", e);
                    match self.resubscribe(&mut shutdown).await {
                        Some(stream) => events = stream,
                        None => return,
                    }
                }
                None => {
                    tracing::warn!("Chunk watch closed by the metadata store");
                    match self.resubscribe(&mut shutdown).await {
                        Some(stream) => events = stream,
                        None => return,
                    }
                }
            }
        }
    }

    async fn resubscribe(&self, shutdown: &mut ShutdownSignal) -> Option<WatchStream> {
        loop {
            tokio::select! {
                _ = shutdown.recv() => return None,
                _ = tokio::time::sleep(RESUBSCRIBE_DELAY) => {}
            }

            match self.subscribe().await {
                Ok(stream) => {
                    tracing::info!("Chunk watch re-established");
                    return Some(stream);
                }
                Err(e) => tracing::warn!("Failed to re-establish chunk watch: {}", e),
            }
        }
    }

    /// Returns whether the event queued a sync job.
    pub async fn handle_event(&self, event: WatchEvent) -> bool {
        match event {
            WatchEvent::Put(kv) => {
                let chunk = match MetadataRecords::decode_chunk(&kv.value) {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        tracing::warn!("Skipping undecodable chunk record {}: {}", kv.key, e);
                        return false;
                    }
                };

                if !needs_sync(&chunk, &self.local_id) {
                    return false;
                }

                tracing::debug!("Queueing sync of chunk {}", chunk.id);
                let chunk_id = chunk.id;
                if !self.queue.enqueue(chunk_id.clone()).await {
                    tracing::warn!("Sync pool stopped, dropping chunk {}", chunk_id);
                    return false;
                }
                true
            }
            WatchEvent::Delete(kv) => {
                tracing::debug!("Chunk record {} deleted", kv.key);
                false
            }
        }
    }
}
