//! Bounded sync worker pool.
//!
//! The watcher feeds chunk ids into a bounded queue; a fixed number of workers drain
//! it. A full queue makes the watcher wait instead of piling up outbound fan-outs.

use super::sync::{SyncJob, SyncOutcome};
use crate::shutdown::ShutdownSignal;

use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;

#[derive(Clone)]
pub struct SyncQueue {
    tx: mpsc::Sender<String>,
}

impl SyncQueue {
    pub fn channel(depth: usize) -> (Self, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(depth);
        (Self { tx }, rx)
    }

    /// Waits for room in the queue. Returns false once every worker has stopped.
    pub async fn enqueue(&self, chunk_id: String) -> bool {
        self.tx.send(chunk_id).await.is_ok()
    }
}

pub struct SyncPool {
    job: Arc<SyncJob>,
    worker_count: usize,
}

impl SyncPool {
    pub fn new(job: Arc<SyncJob>, worker_count: usize) -> Self {
        Self { job, worker_count }
    }

    /// Spawns the workers and returns immediately.
    pub fn start(
        self,
        rx: mpsc::Receiver<String>,
        shutdown: ShutdownSignal,
    ) -> Vec<JoinHandle<()>> {
        tracing::info!("Starting {} sync workers", self.worker_count);

        let rx = Arc::new(Mutex::new(rx));
        (0..self.worker_count)
            .map(|worker_id| {
                let job = self.job.clone();
                let rx = rx.clone();
                let shutdown = shutdown.clone();
                tokio::spawn(worker_loop(worker_id, job, rx, shutdown))
            })
            .collect()
    }
}

async fn worker_loop(
    worker_id: usize,
    job: Arc<SyncJob>,
    rx: Arc<Mutex<mpsc::Receiver<String>>>,
    mut shutdown: ShutdownSignal,
) {
    tracing::debug!("Sync worker {} started", worker_id);

    loop {
        let next = tokio::select! {
            _ = shutdown.recv() => None,
            chunk_id = async { rx.lock().await.recv().await } => chunk_id,
        };

        let Some(chunk_id) = next else {
            tracing::debug!("Sync worker {} stopped", worker_id);
            return;
        };

        match job.run(&chunk_id).await {
            Ok(SyncOutcome::Replicated(peers)) => {
                tracing::debug!(
                    "Worker {} replicated chunk {} to {} peers",
                    worker_id,
                    chunk_id,
                    peers.len()
                );
            }
            Ok(outcome) => {
                tracing::debug!("Worker {} skipped chunk {}: {:?}", worker_id, chunk_id, outcome);
            }
            Err(e) => {
                tracing::error!("Sync of chunk {} aborted: {:#}", chunk_id, e);
            }
        }
    }
}
