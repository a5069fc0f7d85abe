//! Replication Module Tests
//!
//! ## Test Scopes
//! - **Trigger rule**: only a sole-replica record owned by this node queues a job, and
//!   repeated writes of a grown record never do.
//! - **Sync job**: peer selection, push failures and the replica-set commit.
//! - **Commit race**: last-writer-wins loses a concurrent addition; versioned keeps both.
//! - **Pipeline**: watcher plus pool replicate a freshly written chunk exactly once.
//!
//! Peers are faked; the HTTP push path is covered by the cluster integration test.

#[cfg(test)]
mod tests {
    use crate::chunkserver::client::PeerClient;
    use crate::chunkserver::error::{ChunkServerError, Result as ChunkResult};
    use crate::chunkserver::records::MetadataRecords;
    use crate::chunkserver::types::{ChunkRecord, FileRecord};
    use crate::config::{NodeConfig, ReplicaUpdateMode};
    use crate::membership::{LivenessService, NodeId};
    use crate::metadata::{InMemoryMetadataStore, KeyValue, MetadataStore, WatchEvent};
    use crate::replication::pool::{SyncPool, SyncQueue};
    use crate::replication::sync::{SyncJob, SyncOutcome};
    use crate::replication::watcher::{ChunkWatcher, needs_sync};
    use crate::shutdown;
    use crate::storage::ChunkStore;

    use async_trait::async_trait;
    use bytes::Bytes;
    use std::collections::HashSet;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tempfile::TempDir;

    // Fake peer transport: records pushes, fails for listed addresses.
    #[derive(Default)]
    struct FakePeers {
        pushes: Mutex<Vec<(String, String, Vec<u8>)>>,
        failing: Mutex<HashSet<String>>,
    }

    impl FakePeers {
        fn fail(&self, addr: &str) {
            self.failing.lock().unwrap().insert(addr.to_string());
        }

        fn pushes(&self) -> Vec<(String, String, Vec<u8>)> {
            self.pushes.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PeerClient for FakePeers {
        async fn push_chunk(&self, addr: &str, chunk_id: &str, data: Bytes) -> ChunkResult<()> {
            if self.failing.lock().unwrap().contains(addr) {
                return Err(ChunkServerError::ChunkUnavailable(format!("{} is down", addr)));
            }
            self.pushes
                .lock()
                .unwrap()
                .push((addr.to_string(), chunk_id.to_string(), data.to_vec()));
            Ok(())
        }

        async fn delete_chunk(&self, _addr: &str, _chunk_id: &str) -> ChunkResult<()> {
            Ok(())
        }
    }

    struct Harness {
        _dir: TempDir,
        config: NodeConfig,
        store: Arc<InMemoryMetadataStore>,
        records: Arc<MetadataRecords>,
        chunks: ChunkStore,
        liveness: Arc<LivenessService>,
        peers: Arc<FakePeers>,
    }

    impl Harness {
        async fn new(mode: ReplicaUpdateMode, workers: &[&str]) -> Self {
            let dir = tempfile::tempdir().unwrap();
            let config = NodeConfig {
                node_name: "a".to_string(),
                chunk_capacity: 16,
                data_dir: dir.path().to_path_buf(),
                replica_update: mode,
                ..NodeConfig::default()
            };

            let store = Arc::new(InMemoryMetadataStore::new());
            let metadata: Arc<dyn MetadataStore> = store.clone();

            for name in workers {
                let peer_config = NodeConfig {
                    node_name: name.to_string(),
                    ..NodeConfig::default()
                };
                LivenessService::new(&peer_config, format!("addr-{}", name), metadata.clone())
                    .refresh()
                    .await
                    .unwrap();
            }

            let liveness = LivenessService::new(&config, "addr-a".to_string(), metadata.clone());
            let records = Arc::new(MetadataRecords::new(&config, metadata));
            let chunks = ChunkStore::open(dir.path()).await.unwrap();

            Self {
                _dir: dir,
                config,
                store,
                records,
                chunks,
                liveness,
                peers: Arc::new(FakePeers::default()),
            }
        }

        fn job(&self) -> SyncJob {
            SyncJob::new(
                &self.config,
                self.chunks.clone(),
                self.records.clone(),
                self.liveness.clone(),
                self.peers.clone(),
            )
        }

        /// Writes a padded chunk owned by `a` and the file that holds it.
        async fn seed_chunk(&self, chunk_id: &str, desired_replicas: u32) -> ChunkRecord {
            let mut padded = b"hello".to_vec();
            padded.resize(16, 0);
            self.chunks.append(chunk_id, &padded).await.unwrap();

            let chunk = ChunkRecord {
                id: chunk_id.to_string(),
                nominal_size: 16,
                used_bytes: 5,
                file_id: format!("file-{}", chunk_id),
                replicas: vec![NodeId::new("a")],
            };
            let file = FileRecord {
                id: chunk.file_id.clone(),
                name: "hello.txt".to_string(),
                total_size: 5,
                desired_replicas,
                created_at: 0,
                updated_at: 0,
                chunks: vec![chunk.chunk_ref()],
            };
            self.records.put_file(&file).await.unwrap();
            self.records.put_chunk(&chunk).await.unwrap();
            chunk
        }

        async fn replicas(&self, chunk_id: &str) -> Vec<NodeId> {
            self.records.load_chunk(chunk_id).await.unwrap().0.replicas
        }
    }

    fn chunk_event(replicas: &[&str]) -> WatchEvent {
        let chunk = ChunkRecord {
            id: "c1".to_string(),
            nominal_size: 16,
            used_bytes: 5,
            file_id: "f1".to_string(),
            replicas: replicas.iter().map(|r| NodeId::new(*r)).collect(),
        };
        WatchEvent::Put(KeyValue {
            key: "chunks/c1".to_string(),
            value: serde_json::to_string(&chunk).unwrap(),
            version: 1,
            lease: None,
        })
    }

    // ============================================================
    // TRIGGER RULE TESTS
    // ============================================================

    #[test]
    fn test_needs_sync_only_for_sole_local_replica() {
        let local = NodeId::new("a");
        let mut chunk = ChunkRecord {
            id: "c1".to_string(),
            nominal_size: 16,
            used_bytes: 5,
            file_id: "f1".to_string(),
            replicas: vec![local.clone()],
        };
        assert!(needs_sync(&chunk, &local));

        chunk.replicas = vec![NodeId::new("b")];
        assert!(!needs_sync(&chunk, &local));

        chunk.replicas = vec![local.clone(), NodeId::new("b")];
        assert!(!needs_sync(&chunk, &local));
    }

    #[tokio::test]
    async fn test_grown_record_never_requeues() {
        let h = Harness::new(ReplicaUpdateMode::LastWriterWins, &[]).await;
        let (queue, mut rx) = SyncQueue::channel(8);
        let watcher = ChunkWatcher::new(NodeId::new("a"), h.records.clone(), queue);

        assert!(watcher.handle_event(chunk_event(&["a"])).await);
        assert_eq!(rx.try_recv().unwrap(), "c1");

        for _ in 0..5 {
            assert!(!watcher.handle_event(chunk_event(&["a", "b"])).await);
        }
        assert!(!watcher.handle_event(chunk_event(&["b"])).await);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_delete_and_garbage_events_are_ignored() {
        let h = Harness::new(ReplicaUpdateMode::LastWriterWins, &[]).await;
        let (queue, mut rx) = SyncQueue::channel(8);
        let watcher = ChunkWatcher::new(NodeId::new("a"), h.records.clone(), queue);

        let garbage = WatchEvent::Put(KeyValue {
            key: "chunks/bad".to_string(),
            value: "not json".to_string(),
            version: 1,
            lease: None,
        });
        assert!(!watcher.handle_event(garbage).await);

        let deleted = match chunk_event(&["a"]) {
            WatchEvent::Put(kv) => WatchEvent::Delete(kv),
            other => other,
        };
        assert!(!watcher.handle_event(deleted).await);
        assert!(rx.try_recv().is_err());
    }

    // ============================================================
    // SYNC JOB TESTS
    // ============================================================

    #[tokio::test]
    async fn test_sync_pushes_to_selected_peers_and_records_them() {
        let h = Harness::new(ReplicaUpdateMode::LastWriterWins, &["a", "b", "c"]).await;
        h.seed_chunk("c1", 3).await;

        let outcome = h.job().run("c1").await.unwrap();
        let SyncOutcome::Replicated(peers) = outcome else {
            panic!("expected replication, got {:?}", outcome);
        };
        let peers: HashSet<NodeId> = peers.into_iter().collect();
        assert_eq!(peers, HashSet::from([NodeId::new("b"), NodeId::new("c")]));

        let replicas = h.replicas("c1").await;
        assert_eq!(replicas.len(), 3);
        assert_eq!(replicas[0], NodeId::new("a"));

        let pushes = h.peers.pushes();
        assert_eq!(pushes.len(), 2);
        let stored = h.chunks.read("c1").await.unwrap();
        for (addr, chunk_id, data) in pushes {
            assert!(addr == "addr-b" || addr == "addr-c");
            assert_eq!(chunk_id, "c1");
            assert_eq!(data, stored);
        }
    }

    #[tokio::test]
    async fn test_single_desired_replica_skips_sync() {
        let h = Harness::new(ReplicaUpdateMode::LastWriterWins, &["a", "b"]).await;
        h.seed_chunk("c1", 1).await;

        let outcome = h.job().run("c1").await.unwrap();
        assert_eq!(outcome, SyncOutcome::NoEligiblePeers);
        assert_eq!(h.replicas("c1").await, vec![NodeId::new("a")]);
        assert!(h.peers.pushes().is_empty());
    }

    #[tokio::test]
    async fn test_failed_peers_are_skipped() {
        let h = Harness::new(ReplicaUpdateMode::LastWriterWins, &["a", "b", "c"]).await;
        h.seed_chunk("c1", 3).await;
        h.peers.fail("addr-b");

        let outcome = h.job().run("c1").await.unwrap();
        assert_eq!(outcome, SyncOutcome::Replicated(vec![NodeId::new("c")]));
        assert_eq!(h.replicas("c1").await, vec![NodeId::new("a"), NodeId::new("c")]);
    }

    #[tokio::test]
    async fn test_all_peers_failing_leaves_record_untouched() {
        let h = Harness::new(ReplicaUpdateMode::LastWriterWins, &["a", "b"]).await;
        h.seed_chunk("c1", 2).await;
        h.peers.fail("addr-b");
        let before = h.store.get("chunks/c1").await.unwrap()[0].version;

        let outcome = h.job().run("c1").await.unwrap();
        assert_eq!(outcome, SyncOutcome::AllPeersFailed);
        assert_eq!(h.store.get("chunks/c1").await.unwrap()[0].version, before);
    }

    #[tokio::test]
    async fn test_desired_replicas_counts_peer_copies() {
        let h = Harness::new(ReplicaUpdateMode::LastWriterWins, &["a", "b", "c"]).await;
        h.seed_chunk("c1", 2).await;

        let outcome = h.job().run("c1").await.unwrap();
        let SyncOutcome::Replicated(peers) = outcome else {
            panic!("expected replication, got {:?}", outcome);
        };
        assert_eq!(peers.len(), 2);
        assert!(!peers.contains(&NodeId::new("a")));

        // The owner plus two peers.
        let replicas = h.replicas("c1").await;
        assert_eq!(replicas.len(), 3);
        assert_eq!(replicas[0], NodeId::new("a"));
    }

    #[tokio::test]
    async fn test_missing_local_chunk_aborts_before_pushing() {
        let h = Harness::new(ReplicaUpdateMode::LastWriterWins, &["a", "b", "c"]).await;
        h.seed_chunk("c1", 3).await;
        h.chunks.remove("c1").await.unwrap();

        assert!(h.job().run("c1").await.is_err());
        assert!(h.peers.pushes().is_empty());
        assert_eq!(h.replicas("c1").await, vec![NodeId::new("a")]);
    }

    #[tokio::test]
    async fn test_missing_chunk_record_aborts() {
        let h = Harness::new(ReplicaUpdateMode::LastWriterWins, &["a", "b"]).await;
        assert!(h.job().run("nope").await.is_err());
        assert!(h.peers.pushes().is_empty());
    }

    // ============================================================
    // COMMIT RACE TESTS
    // ============================================================

    #[tokio::test]
    async fn test_last_writer_wins_loses_concurrent_addition() {
        let h = Harness::new(ReplicaUpdateMode::LastWriterWins, &[]).await;
        h.seed_chunk("c1", 3).await;
        let job = h.job();

        // Both jobs read the same snapshot before either writes.
        let (first, v1) = h.records.load_chunk("c1").await.unwrap();
        let (second, v2) = h.records.load_chunk("c1").await.unwrap();
        assert_eq!(v1, v2);

        job.commit_replicas(first, v1, &[NodeId::new("b")]).await.unwrap();
        job.commit_replicas(second, v2, &[NodeId::new("c")]).await.unwrap();

        assert_eq!(h.replicas("c1").await, vec![NodeId::new("a"), NodeId::new("c")]);
    }

    #[tokio::test]
    async fn test_versioned_commit_keeps_both_additions() {
        let h = Harness::new(ReplicaUpdateMode::Versioned, &[]).await;
        h.seed_chunk("c1", 3).await;
        let job = h.job();

        let (first, v1) = h.records.load_chunk("c1").await.unwrap();
        let (second, v2) = h.records.load_chunk("c1").await.unwrap();

        job.commit_replicas(first, v1, &[NodeId::new("b")]).await.unwrap();
        job.commit_replicas(second, v2, &[NodeId::new("c")]).await.unwrap();

        assert_eq!(
            h.replicas("c1").await,
            vec![NodeId::new("a"), NodeId::new("b"), NodeId::new("c")]
        );
    }

    // ============================================================
    // PIPELINE TESTS
    // ============================================================

    #[tokio::test]
    async fn test_watcher_and_pool_replicate_once() {
        let h = Harness::new(ReplicaUpdateMode::LastWriterWins, &["a", "b"]).await;
        let (trigger, signal) = shutdown::channel();

        let (queue, rx) = SyncQueue::channel(16);
        let mut tasks = SyncPool::new(Arc::new(h.job()), 2).start(rx, signal.clone());

        let watcher = ChunkWatcher::new(NodeId::new("a"), h.records.clone(), queue);
        let events = watcher.subscribe().await.unwrap();
        tasks.push(tokio::spawn(watcher.run(events, signal)));

        h.seed_chunk("c1", 2).await;

        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while h.replicas("c1").await.len() < 2 {
            assert!(tokio::time::Instant::now() < deadline, "chunk never replicated");
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        // The job's own write must not start a second round.
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(h.peers.pushes().len(), 1);
        assert_eq!(h.replicas("c1").await, vec![NodeId::new("a"), NodeId::new("b")]);

        trigger.trigger();
        for task in tasks {
            task.await.unwrap();
        }
    }
}
