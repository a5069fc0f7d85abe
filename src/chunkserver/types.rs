use crate::membership::types::NodeId;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// A user-visible file: an ordered list of chunks.
///
/// Written once after every chunk of the upload is on disk and never mutated.
/// `total_size` is the sum of the chunks' `used_bytes`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileRecord {
    pub id: String,
    pub name: String,
    pub total_size: u64,
    pub desired_replicas: u32,
    pub created_at: u64,
    pub updated_at: u64,
    pub chunks: Vec<ChunkRef>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChunkRef {
    pub id: String,
    pub nominal_size: u64,
    pub used_bytes: u64,
}

/// Per-chunk metadata. `replicas` starts as the creating node and only grows.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChunkRecord {
    pub id: String,
    pub nominal_size: u64,
    pub used_bytes: u64,
    pub file_id: String,
    pub replicas: Vec<NodeId>,
}

impl ChunkRecord {
    /// True while `node` is the only holder, i.e. the chunk still needs replicating.
    pub fn is_sole_replica(&self, node: &NodeId) -> bool {
        self.replicas.len() == 1 && &self.replicas[0] == node
    }

    /// Appends nodes not already listed, keeping insertion order.
    /// Returns how many were added.
    pub fn add_replicas<'a>(&mut self, nodes: impl IntoIterator<Item = &'a NodeId>) -> usize {
        let mut added = 0;
        for node in nodes {
            if !self.replicas.contains(node) {
                self.replicas.push(node.clone());
                added += 1;
            }
        }
        added
    }

    pub fn chunk_ref(&self) -> ChunkRef {
        ChunkRef {
            id: self.id.clone(),
            nominal_size: self.nominal_size,
            used_bytes: self.used_bytes,
        }
    }
}

/// Seconds since the Unix epoch.
pub fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
