//! Storage Module Tests
//!
//! Validates local chunk persistence and replica placement.
//!
//! ## Test Scopes
//! - **ChunkStore**: append/write/read/remove on a temporary directory, id validation.
//! - **Selector**: self exclusion, sizing and a rough uniformity check.

#[cfg(test)]
mod tests {
    use crate::membership::types::NodeId;
    use crate::storage::chunkstore::ChunkStore;
    use crate::storage::selector::{select_replicas, select_replicas_with};
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::collections::{HashMap, HashSet};

    fn nodes(names: &[&str]) -> Vec<NodeId> {
        names.iter().map(|n| NodeId::new(*n)).collect()
    }

    // ============================================================
    // CHUNK STORE TESTS
    // ============================================================

    #[tokio::test]
    async fn test_open_creates_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("nested").join("chunks");

        let store = ChunkStore::open(&root).await.unwrap();
        assert!(root.is_dir());
        assert_eq!(store.root(), root.as_path());
    }

    #[tokio::test]
    async fn test_append_accumulates_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let store = ChunkStore::open(dir.path()).await.unwrap();

        store.append("c1", b"hello ").await.unwrap();
        store.append("c1", b"world").await.unwrap();

        assert_eq!(store.read("c1").await.unwrap(), b"hello world");
    }

    #[tokio::test]
    async fn test_write_truncates_existing_chunk() {
        let dir = tempfile::tempdir().unwrap();
        let store = ChunkStore::open(dir.path()).await.unwrap();

        store.write("c1", b"a much longer payload").await.unwrap();
        store.write("c1", b"short").await.unwrap();

        assert_eq!(store.read("c1").await.unwrap(), b"short");
    }

    #[tokio::test]
    async fn test_read_used_strips_padding() {
        let dir = tempfile::tempdir().unwrap();
        let store = ChunkStore::open(dir.path()).await.unwrap();

        let mut padded = b"hello".to_vec();
        padded.resize(16, 0);
        store.append("c1", &padded).await.unwrap();

        let bytes = store.read_used("c1", 16, 5).await.unwrap();
        assert_eq!(bytes, b"hello");

        let empty = store.read_used("c1", 16, 0).await.unwrap();
        assert!(empty.is_empty());
    }

    #[tokio::test]
    async fn test_read_used_rejects_short_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = ChunkStore::open(dir.path()).await.unwrap();
        store.write("c1", b"abc").await.unwrap();

        let err = store.read_used("c1", 16, 10).await.unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::UnexpectedEof);
    }

    #[tokio::test]
    async fn test_remove_deletes_chunk() {
        let dir = tempfile::tempdir().unwrap();
        let store = ChunkStore::open(dir.path()).await.unwrap();
        store.write("c1", b"data").await.unwrap();
        assert!(store.exists("c1").await);

        store.remove("c1").await.unwrap();
        assert!(!store.exists("c1").await);

        let err = store.remove("c1").await.unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_chunk_ids_cannot_escape_root() {
        let dir = tempfile::tempdir().unwrap();
        let store = ChunkStore::open(dir.path()).await.unwrap();

        for bad in ["", "../etc/passwd", "a/b", "a\\b", ".hidden", ".."] {
            let err = store.chunk_path(bad).unwrap_err();
            assert_eq!(err.kind(), std::io::ErrorKind::InvalidInput, "id {:?}", bad);
        }

        let uuid = uuid::Uuid::new_v4().to_string();
        assert!(store.chunk_path(&uuid).is_ok());
    }

    // ============================================================
    // SELECTOR TESTS
    // ============================================================

    #[test]
    fn test_count_of_one_or_less_selects_nothing() {
        let candidates = nodes(&["a", "b", "c"]);
        let local = NodeId::new("a");

        assert!(select_replicas(&candidates, &local, 0).is_empty());
        assert!(select_replicas(&candidates, &local, 1).is_empty());
    }

    #[test]
    fn test_never_selects_local_node() {
        let candidates = nodes(&["a", "b", "c", "d", "e"]);

        for local in &candidates {
            for count in 2..8 {
                for _ in 0..50 {
                    let picked = select_replicas(&candidates, local, count);
                    assert!(!picked.contains(local), "{} picked itself", local);
                }
            }
        }
    }

    #[test]
    fn test_selection_size_and_uniqueness() {
        let candidates = nodes(&["a", "b", "c", "d"]);
        let local = NodeId::new("b");

        for count in 2..7u32 {
            let picked = select_replicas(&candidates, &local, count);
            let expected = (count as usize).min(candidates.len() - 1);
            assert_eq!(picked.len(), expected);

            let unique: HashSet<&NodeId> = picked.iter().collect();
            assert_eq!(unique.len(), picked.len());
        }
    }

    #[test]
    fn test_local_absent_from_candidates() {
        let candidates = nodes(&["a", "c"]);
        let local = NodeId::new("b");

        let picked = select_replicas(&candidates, &local, 3);
        assert_eq!(picked.len(), 2);
    }

    #[test]
    fn test_empty_candidates() {
        let local = NodeId::new("a");
        assert!(select_replicas(&[], &local, 3).is_empty());
        assert!(select_replicas(&nodes(&["a"]), &local, 3).is_empty());
    }

    #[test]
    fn test_first_position_is_roughly_uniform() {
        // Candidates {A,B,C,D}, self B, count 3: every peer is always picked,
        // so look at who lands first to check the shuffle.
        let candidates = nodes(&["A", "B", "C", "D"]);
        let local = NodeId::new("B");
        let mut rng = StdRng::seed_from_u64(7);

        let trials = 3000;
        let mut first: HashMap<NodeId, usize> = HashMap::new();
        for _ in 0..trials {
            let picked = select_replicas_with(&mut rng, &candidates, &local, 3);
            assert_eq!(picked.len(), 3);
            assert!(!picked.contains(&local));
            *first.entry(picked[0].clone()).or_insert(0) += 1;
        }

        assert_eq!(first.len(), 3);
        for (node, hits) in &first {
            // Expect ~1000 each.
            assert!(
                (800..1200).contains(hits),
                "{} came first {} times out of {}",
                node,
                hits,
                trials
            );
        }
    }

    #[test]
    fn test_subset_frequency_when_count_below_peers() {
        let candidates = nodes(&["A", "B", "C", "D"]);
        let local = NodeId::new("B");
        let mut rng = StdRng::seed_from_u64(42);

        let trials = 3000;
        let mut hits: HashMap<NodeId, usize> = HashMap::new();
        for _ in 0..trials {
            for node in select_replicas_with(&mut rng, &candidates, &local, 2) {
                *hits.entry(node).or_insert(0) += 1;
            }
        }

        // Each of A, C, D appears in two thirds of the draws.
        assert_eq!(hits.len(), 3);
        for (node, count) in &hits {
            assert!((1800..2200).contains(count), "{} picked {} times", node, count);
        }
    }
}
