//! Node bootstrap.
//!
//! Wires the chunk store, metadata records, liveness, replication and the HTTP server
//! into one running node. Every background task observes the node's shutdown signal.

use super::client::{HttpPeerClient, PeerClient};
use super::handlers::router;
use super::records::MetadataRecords;
use super::service::ChunkServer;
use crate::config::NodeConfig;
use crate::membership::LivenessService;
use crate::metadata::MetadataStore;
use crate::replication::{ChunkWatcher, SyncJob, SyncPool, SyncQueue};
use crate::shutdown::{self, ShutdownTrigger};
use crate::storage::ChunkStore;

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

pub struct ChunkNode {
    server: Arc<ChunkServer>,
    local_addr: SocketAddr,
    trigger: ShutdownTrigger,
    tasks: Vec<JoinHandle<()>>,
}

impl ChunkNode {
    /// Starts a node serving on `listener`.
    ///
    /// The chunk watch is opened before the server accepts requests, so every chunk
    /// ingested by this node is seen by its watcher.
    pub async fn start(
        config: NodeConfig,
        metadata: Arc<dyn MetadataStore>,
        listener: TcpListener,
    ) -> Result<Self> {
        config.validate().context("invalid node configuration")?;
        let config = Arc::new(config);

        let local_addr = listener.local_addr()?;
        let advertise_addr = config
            .advertise_addr
            .clone()
            .unwrap_or_else(|| local_addr.to_string());

        let chunks = ChunkStore::open(&config.data_dir)
            .await
            .with_context(|| format!("failed to open data dir {}", config.data_dir.display()))?;
        let records = Arc::new(MetadataRecords::new(&config, metadata.clone()));
        let liveness = LivenessService::new(&config, advertise_addr, metadata);
        let peers: Arc<dyn PeerClient> = Arc::new(HttpPeerClient::new());

        let server = Arc::new(ChunkServer::new(
            config.clone(),
            chunks.clone(),
            records.clone(),
            liveness.clone(),
            peers.clone(),
        ));

        let (trigger, signal) = shutdown::channel();

        // 1. Replication pipeline:
        let job = Arc::new(SyncJob::new(
            &config,
            chunks,
            records.clone(),
            liveness.clone(),
            peers,
        ));
        let (queue, rx) = SyncQueue::channel(config.sync_queue_depth);
        let mut tasks = SyncPool::new(job, config.sync_workers).start(rx, signal.clone());

        let watcher = ChunkWatcher::new(liveness.local_id().clone(), records, queue);
        let events = watcher
            .subscribe()
            .await
            .context("failed to watch chunk records")?;
        tasks.push(tokio::spawn(watcher.run(events, signal.clone())));

        // 2. Liveness:
        tasks.push(tokio::spawn(liveness.clone().run(signal.clone())));

        // 3. HTTP server:
        let app = router(server.clone());
        let mut server_signal = signal;
        tasks.push(tokio::spawn(async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    server_signal.recv().await;
                    tracing::info!("HTTP server shutting down");
                })
                .await;
            if let Err(e) = result {
                tracing::error!("HTTP server error: {}", e);
            }
        }));

        tracing::info!(
            "Node {} listening on {} (advertised as {})",
            liveness.local_id(),
            local_addr,
            liveness.advertise_addr()
        );

        Ok(Self {
            server,
            local_addr,
            trigger,
            tasks,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn server(&self) -> &Arc<ChunkServer> {
        &self.server
    }

    pub fn shutdown(&self) {
        self.trigger.trigger();
    }

    /// Waits for every background task to finish. Call after `shutdown`.
    pub async fn join(self) {
        for task in self.tasks {
            if let Err(e) = task.await {
                tracing::error!("Node task panicked: {}", e);
            }
        }
    }
}
