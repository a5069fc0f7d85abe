use super::types::{KeyValue, Lease, LeaseId, WatchEvent};
use crate::codec::CodecError;

use async_trait::async_trait;
use futures::stream::BoxStream;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("lease {0} not found or expired")]
    LeaseNotFound(LeaseId),

    #[error("watch fell behind by {0} events")]
    WatchLagged(u64),

    #[error("metadata store unavailable: {0}")]
    Unavailable(String),

    #[error("metadata store returned {status}: {message}")]
    Remote { status: u16, message: String },

    #[error("metadata transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("metadata framing error: {0}")]
    Codec(#[from] CodecError),
}

pub type MetadataResult<T> = std::result::Result<T, MetadataError>;

/// Events under a watched prefix, in the order the store applied them.
pub type WatchStream = BoxStream<'static, MetadataResult<WatchEvent>>;

/// The coordination store consumed by a chunk-server node.
#[async_trait]
pub trait MetadataStore: Send + Sync + 'static {
    /// Every record stored under exactly `key`. A healthy store returns zero or one;
    /// callers treat any other count as corrupt metadata.
    async fn get(&self, key: &str) -> MetadataResult<Vec<KeyValue>>;

    /// Every record whose key starts with `prefix`, sorted by key.
    async fn get_prefix(&self, prefix: &str) -> MetadataResult<Vec<KeyValue>>;

    /// Unconditional write. Returns the new version of the key.
    async fn put(&self, key: &str, value: String) -> MetadataResult<u64>;

    /// Write bound to a lease; the key disappears when the lease expires.
    async fn put_with_lease(&self, key: &str, value: String, lease: LeaseId)
    -> MetadataResult<u64>;

    /// Write only if the key is still at `expected_version` (0 means "absent").
    /// Returns whether the write happened.
    async fn compare_and_put(
        &self,
        key: &str,
        value: String,
        expected_version: u64,
    ) -> MetadataResult<bool>;

    /// Returns whether a key was removed.
    async fn delete(&self, key: &str) -> MetadataResult<bool>;

    async fn grant_lease(&self, ttl: Duration) -> MetadataResult<Lease>;

    /// Subscribe to changes under `prefix`. Only changes applied after the call
    /// returns are delivered.
    async fn watch_prefix(&self, prefix: &str) -> MetadataResult<WatchStream>;
}
