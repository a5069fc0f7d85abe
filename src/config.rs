//! Node Configuration
//!
//! A single `NodeConfig` value is built once at startup and shared as `Arc<NodeConfig>`
//! with every component that needs it. Nothing reads the environment after that point.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// 64 MiB.
pub const DEFAULT_CHUNK_CAPACITY: usize = 64 * 1024 * 1024;
/// Room for the framing and the file name on top of a full chunk payload.
pub const FRAME_OVERHEAD: usize = 4096;

pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8899";
pub const DEFAULT_NODE_NAME: &str = "chunkfs-node";
pub const DEFAULT_METADATA_ENDPOINT: &str = "127.0.0.1:2379";

pub const DEFAULT_FILE_PREFIX: &str = "files/";
pub const DEFAULT_CHUNK_PREFIX: &str = "chunks/";
pub const DEFAULT_WORKER_PREFIX: &str = "workers/";

const DEFAULT_LEASE_TTL: Duration = Duration::from_secs(10);
const DEFAULT_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(7);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("chunk capacity must be greater than zero")]
    ZeroChunkCapacity,

    #[error("node name must not be empty")]
    EmptyNodeName,

    #[error("keepalive interval {interval:?} must be shorter than the lease ttl {ttl:?}")]
    KeepaliveTooSlow { interval: Duration, ttl: Duration },

    #[error("{0} must be greater than zero")]
    ZeroValue(&'static str),

    #[error("key prefix for {0} must not be empty")]
    EmptyPrefix(&'static str),

    #[error("key prefixes {0:?} and {1:?} overlap")]
    OverlappingPrefixes(String, String),

    #[error("unknown replica update mode: {0}")]
    UnknownUpdateMode(String),
}

/// How a sync job writes the grown replica list back to the chunk record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ReplicaUpdateMode {
    /// Unconditional put of the record read at the start of the job.
    /// Two jobs touching the same chunk can overwrite each other's additions.
    #[default]
    LastWriterWins,
    /// Compare-and-swap on the version read at the start of the job, re-reading
    /// and merging on conflict.
    Versioned,
}

impl fmt::Display for ReplicaUpdateMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LastWriterWins => f.write_str("last-writer-wins"),
            Self::Versioned => f.write_str("versioned"),
        }
    }
}

impl FromStr for ReplicaUpdateMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "last-writer-wins" | "lww" => Ok(Self::LastWriterWins),
            "versioned" | "cas" => Ok(Self::Versioned),
            other => Err(ConfigError::UnknownUpdateMode(other.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Address the HTTP server binds to.
    pub listen_addr: String,
    /// Identity of this node in replica sets and under the worker prefix.
    pub node_name: String,
    /// Address other nodes dial. Defaults to the bound address.
    pub advertise_addr: Option<String>,
    pub metadata_endpoints: Vec<String>,
    pub data_dir: PathBuf,
    /// Bounds both on-disk padding and the per-message read buffer.
    pub chunk_capacity: usize,
    /// Recorded on every new file and handed to the replica selector as the number of
    /// peer copies to make. Values of 1 or less disable replication, so 2 means three
    /// copies in total.
    pub desired_replicas: u32,
    pub file_prefix: String,
    pub chunk_prefix: String,
    pub worker_prefix: String,
    pub lease_ttl: Duration,
    pub keepalive_interval: Duration,
    pub sync_workers: usize,
    pub sync_queue_depth: usize,
    pub replica_update: ReplicaUpdateMode,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
            node_name: DEFAULT_NODE_NAME.to_string(),
            advertise_addr: None,
            metadata_endpoints: vec![DEFAULT_METADATA_ENDPOINT.to_string()],
            data_dir: PathBuf::from("./data/chunks"),
            chunk_capacity: DEFAULT_CHUNK_CAPACITY,
            desired_replicas: 1,
            file_prefix: DEFAULT_FILE_PREFIX.to_string(),
            chunk_prefix: DEFAULT_CHUNK_PREFIX.to_string(),
            worker_prefix: DEFAULT_WORKER_PREFIX.to_string(),
            lease_ttl: DEFAULT_LEASE_TTL,
            keepalive_interval: DEFAULT_KEEPALIVE_INTERVAL,
            sync_workers: 4,
            sync_queue_depth: 1024,
            replica_update: ReplicaUpdateMode::default(),
        }
    }
}

impl NodeConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_capacity == 0 {
            return Err(ConfigError::ZeroChunkCapacity);
        }
        if self.node_name.trim().is_empty() {
            return Err(ConfigError::EmptyNodeName);
        }
        if self.keepalive_interval >= self.lease_ttl {
            return Err(ConfigError::KeepaliveTooSlow {
                interval: self.keepalive_interval,
                ttl: self.lease_ttl,
            });
        }
        if self.sync_workers == 0 {
            return Err(ConfigError::ZeroValue("sync_workers"));
        }
        if self.sync_queue_depth == 0 {
            return Err(ConfigError::ZeroValue("sync_queue_depth"));
        }

        let prefixes = [
            ("files", &self.file_prefix),
            ("chunks", &self.chunk_prefix),
            ("workers", &self.worker_prefix),
        ];
        for (name, prefix) in prefixes {
            if prefix.is_empty() {
                return Err(ConfigError::EmptyPrefix(name));
            }
        }
        for (i, (_, a)) in prefixes.iter().enumerate() {
            for (_, b) in prefixes.iter().skip(i + 1) {
                if a.starts_with(b.as_str()) || b.starts_with(a.as_str()) {
                    return Err(ConfigError::OverlappingPrefixes(
                        a.to_string(),
                        b.to_string(),
                    ));
                }
            }
        }

        Ok(())
    }

    /// Largest frame accepted on the streamed calls and largest push body.
    pub fn max_frame_len(&self) -> usize {
        self.chunk_capacity + FRAME_OVERHEAD
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = NodeConfig::default();
        assert_eq!(config.validate(), Ok(()));
        assert_eq!(config.listen_addr, "127.0.0.1:8899");
        assert_eq!(config.desired_replicas, 1);
        assert_eq!(config.replica_update, ReplicaUpdateMode::LastWriterWins);
    }

    #[test]
    fn test_keepalive_must_be_shorter_than_ttl() {
        let config = NodeConfig {
            lease_ttl: Duration::from_secs(5),
            keepalive_interval: Duration::from_secs(5),
            ..NodeConfig::default()
        };

        assert!(matches!(
            config.validate(),
            Err(ConfigError::KeepaliveTooSlow { .. })
        ));
    }

    #[test]
    fn test_overlapping_prefixes_rejected() {
        let config = NodeConfig {
            chunk_prefix: "files/chunks/".to_string(),
            ..NodeConfig::default()
        };

        assert!(matches!(
            config.validate(),
            Err(ConfigError::OverlappingPrefixes(_, _))
        ));
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let config = NodeConfig {
            chunk_capacity: 0,
            ..NodeConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ZeroChunkCapacity));
    }

    #[test]
    fn test_update_mode_parsing() {
        assert_eq!(
            "versioned".parse::<ReplicaUpdateMode>(),
            Ok(ReplicaUpdateMode::Versioned)
        );
        assert_eq!(
            "last-writer-wins".parse::<ReplicaUpdateMode>(),
            Ok(ReplicaUpdateMode::LastWriterWins)
        );
        assert!("quorum".parse::<ReplicaUpdateMode>().is_err());
        assert_eq!(ReplicaUpdateMode::Versioned.to_string(), "versioned");
    }
}
