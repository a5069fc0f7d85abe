//! In-memory coordination store.
//!
//! Keys live in a `DashMap`, every write bumps a store-wide revision, and changes are
//! fanned out to watchers over a broadcast channel. Leases are timers: when a lease's
//! TTL elapses every key still bound to it is removed and a `Delete` event is emitted.

use super::store::{MetadataError, MetadataResult, MetadataStore, WatchStream};
use super::types::{KeyValue, Lease, LeaseId, WatchEvent};

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::StreamExt;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

const WATCH_BUFFER: usize = 4096;

#[derive(Clone)]
pub struct InMemoryMetadataStore {
    inner: Arc<Inner>,
}

struct Inner {
    entries: DashMap<String, KeyValue>,
    leases: DashMap<LeaseId, Duration>,
    revision: AtomicU64,
    next_lease: AtomicI64,
    events: broadcast::Sender<WatchEvent>,
}

impl InMemoryMetadataStore {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(WATCH_BUFFER);
        Self {
            inner: Arc::new(Inner {
                entries: DashMap::new(),
                leases: DashMap::new(),
                revision: AtomicU64::new(0),
                next_lease: AtomicI64::new(1),
                events,
            }),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.entries.is_empty()
    }

    pub fn active_leases(&self) -> usize {
        self.inner.leases.len()
    }
}

impl Default for InMemoryMetadataStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Inner {
    fn next_revision(&self) -> u64 {
        self.revision.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn publish(&self, event: WatchEvent) {
        // No receivers is not an error: nobody is watching yet.
        let _ = self.events.send(event);
    }

    fn write(&self, key: &str, value: String, lease: Option<LeaseId>) -> u64 {
        // The entry guard spans revision, insert and publish, so per-key events follow write order.
        let entry = self.entries.entry(key.to_string());
        let kv = KeyValue {
            key: key.to_string(),
            value,
            version: self.next_revision(),
            lease,
        };
        let version = kv.version;

        let _guard = entry.insert(kv.clone());
        self.publish(WatchEvent::Put(kv));
        version
    }

    /// Removes `key` when `matches` accepts its entry. The delete is published before
    /// the entry lock is released.
    fn remove_where(&self, key: &str, matches: impl Fn(&KeyValue) -> bool) -> Option<KeyValue> {
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(entry) if matches(entry.get()) => {
                self.next_revision();
                self.publish(WatchEvent::Delete(entry.get().clone()));
                Some(entry.remove())
            }
            _ => None,
        }
    }

    fn expire_lease(&self, lease: LeaseId) {
        if self.leases.remove(&lease).is_none() {
            return;
        }

        let bound: Vec<String> = self
            .entries
            .iter()
            .filter(|entry| entry.value().lease == Some(lease))
            .map(|entry| entry.key().clone())
            .collect();

        for key in bound {
            // The key may have been re-bound to a newer lease in the meantime.
            if self.remove_where(&key, |kv| kv.lease == Some(lease)).is_some() {
                tracing::debug!("Lease {} expired, removed {}", lease, key);
            }
        }
    }
}

#[async_trait]
impl MetadataStore for InMemoryMetadataStore {
    async fn get(&self, key: &str) -> MetadataResult<Vec<KeyValue>> {
        Ok(self
            .inner
            .entries
            .get(key)
            .map(|entry| vec![entry.value().clone()])
            .unwrap_or_default())
    }

    async fn get_prefix(&self, prefix: &str) -> MetadataResult<Vec<KeyValue>> {
        let mut kvs: Vec<KeyValue> = self
            .inner
            .entries
            .iter()
            .filter(|entry| entry.key().starts_with(prefix))
            .map(|entry| entry.value().clone())
            .collect();
        kvs.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(kvs)
    }

    async fn put(&self, key: &str, value: String) -> MetadataResult<u64> {
        Ok(self.inner.write(key, value, None))
    }

    async fn put_with_lease(
        &self,
        key: &str,
        value: String,
        lease: LeaseId,
    ) -> MetadataResult<u64> {
        if !self.inner.leases.contains_key(&lease) {
            return Err(MetadataError::LeaseNotFound(lease));
        }
        Ok(self.inner.write(key, value, Some(lease)))
    }

    async fn compare_and_put(
        &self,
        key: &str,
        value: String,
        expected_version: u64,
    ) -> MetadataResult<bool> {
        match self.inner.entries.entry(key.to_string()) {
            Entry::Occupied(mut entry) => {
                if entry.get().version != expected_version {
                    return Ok(false);
                }
                let kv = KeyValue {
                    key: key.to_string(),
                    value,
                    version: self.inner.next_revision(),
                    lease: entry.get().lease,
                };
                entry.insert(kv.clone());
                self.inner.publish(WatchEvent::Put(kv));
            }
            Entry::Vacant(entry) => {
                if expected_version != 0 {
                    return Ok(false);
                }
                let kv = KeyValue {
                    key: key.to_string(),
                    value,
                    version: self.inner.next_revision(),
                    lease: None,
                };
                let _guard = entry.insert(kv.clone());
                self.inner.publish(WatchEvent::Put(kv));
            }
        }
        Ok(true)
    }

    async fn delete(&self, key: &str) -> MetadataResult<bool> {
        Ok(self.inner.remove_where(key, |_| true).is_some())
    }

    async fn grant_lease(&self, ttl: Duration) -> MetadataResult<Lease> {
        let id = self.inner.next_lease.fetch_add(1, Ordering::SeqCst);
        self.inner.leases.insert(id, ttl);

        let inner: Weak<Inner> = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            if let Some(inner) = inner.upgrade() {
                inner.expire_lease(id);
            }
        });

        Ok(Lease {
            id,
            ttl_ms: ttl.as_millis() as u64,
        })
    }

    async fn watch_prefix(&self, prefix: &str) -> MetadataResult<WatchStream> {
        let rx = self.inner.events.subscribe();
        let prefix = prefix.to_string();

        let stream = futures::stream::unfold((rx, prefix), |(mut rx, prefix)| async move {
            loop {
                match rx.recv().await {
                    Ok(event) if event.key().starts_with(&prefix) => {
                        return Some((Ok(event), (rx, prefix)));
                    }
                    Ok(_) => continue,
                    Err(RecvError::Lagged(missed)) => {
                        return Some((Err(MetadataError::WatchLagged(missed)), (rx, prefix)));
                    }
                    Err(RecvError::Closed) => return None,
                }
            }
        });

        Ok(stream.boxed())
    }
}
