use serde::{Deserialize, Serialize};

pub type LeaseId = i64;

/// A stored key with its value and bookkeeping.
///
/// `version` is the store-wide revision of the last write to this key. It only grows,
/// so it doubles as the token for compare-and-put.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct KeyValue {
    pub key: String,
    pub value: String,
    pub version: u64,
    pub lease: Option<LeaseId>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Lease {
    pub id: LeaseId,
    pub ttl_ms: u64,
}

/// A change observed under a watched prefix.
///
/// `Delete` carries the last value the key held before it was removed
/// (explicit delete or lease expiry).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum WatchEvent {
    Put(KeyValue),
    Delete(KeyValue),
}

impl WatchEvent {
    pub fn key(&self) -> &str {
        match self {
            WatchEvent::Put(kv) | WatchEvent::Delete(kv) => &kv.key,
        }
    }
}
