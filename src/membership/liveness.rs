use super::types::{NodeId, WorkerEntry};
use crate::config::NodeConfig;
use crate::metadata::{Lease, MetadataResult, MetadataStore};
use crate::shutdown::ShutdownSignal;

use std::sync::Arc;
use std::time::Duration;

pub struct LivenessService {
    local_id: NodeId,
    advertise_addr: String,
    worker_prefix: String,
    lease_ttl: Duration,
    keepalive_interval: Duration,
    metadata: Arc<dyn MetadataStore>,
}

impl LivenessService {
    pub fn new(
        config: &NodeConfig,
        advertise_addr: String,
        metadata: Arc<dyn MetadataStore>,
    ) -> Arc<Self> {
        Arc::new(Self {
            local_id: NodeId::new(config.node_name.clone()),
            advertise_addr,
            worker_prefix: config.worker_prefix.clone(),
            lease_ttl: config.lease_ttl,
            keepalive_interval: config.keepalive_interval,
            metadata,
        })
    }

    pub fn local_id(&self) -> &NodeId {
        &self.local_id
    }

    pub fn advertise_addr(&self) -> &str {
        &self.advertise_addr
    }

    fn worker_key(&self, node: &NodeId) -> String {
        format!("{}{}", self.worker_prefix, node)
    }

    /// Grants a fresh lease and re-binds this node's worker entry to it.
    pub async fn refresh(&self) -> MetadataResult<Lease> {
        let lease = self.metadata.grant_lease(self.lease_ttl).await?;
        self.metadata
            .put_with_lease(
                &self.worker_key(&self.local_id),
                self.advertise_addr.clone(),
                lease.id,
            )
            .await?;
        tracing::debug!("Refreshed liveness entry under lease {}", lease.id);
        Ok(lease)
    }

    /// Keepalive loop. Failed refreshes are retried on the next tick.
    pub async fn run(self: Arc<Self>, mut shutdown: ShutdownSignal) {
        tracing::info!(
            "Liveness loop started for {} at {} (ttl {:?}, every {:?})",
            self.local_id, self.advertise_addr, self.lease_ttl, self.keepalive_interval
        );

        loop {
            if let Err(e) = self.refresh().await {
                tracing::warn!("Failed to refresh liveness entry: {}", e);
            }

            tokio::select! {
                _ = shutdown.recv() => {
                    tracing::info!("Liveness loop stopped");
                    return;
                }
                _ = tokio::time::sleep(self.keepalive_interval) => {}
            }
        }
    }

    pub async fn live_workers(&self) -> MetadataResult<Vec<WorkerEntry>> {
        let kvs = self.metadata.get_prefix(&self.worker_prefix).await?;
        Ok(kvs
            .into_iter()
            .filter_map(|kv| {
                let name = kv.key.strip_prefix(&self.worker_prefix)?;
                Some(WorkerEntry {
                    id: NodeId::new(name),
                    addr: kv.value,
                })
            })
            .collect())
    }

    /// Identities of every worker whose lease has not expired.
    pub async fn alive_workers(&self) -> MetadataResult<Vec<NodeId>> {
        Ok(self
            .live_workers()
            .await?
            .into_iter()
            .map(|worker| worker.id)
            .collect())
    }

    /// Advertised address of `node`, or `None` if it has no live entry.
    pub async fn resolve_addr(&self, node: &NodeId) -> MetadataResult<Option<String>> {
        let kvs = self.metadata.get(&self.worker_key(node)).await?;
        Ok(kvs.into_iter().next().map(|kv| kv.value))
    }
}
