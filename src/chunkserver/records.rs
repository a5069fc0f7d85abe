//! Typed access to file and chunk records in the metadata store.
//!
//! Records are stored as JSON under `{file_prefix}{id}` and `{chunk_prefix}{id}`.
//! Lookups that must find exactly one record map zero records to `NotFound` and
//! anything else unexpected to `CorruptMetadata`.

use super::error::{ChunkServerError, Result};
use super::types::{ChunkRecord, FileRecord};
use crate::config::NodeConfig;
use crate::metadata::MetadataStore;

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;

pub struct MetadataRecords {
    store: Arc<dyn MetadataStore>,
    file_prefix: String,
    chunk_prefix: String,
}

impl MetadataRecords {
    pub fn new(config: &NodeConfig, store: Arc<dyn MetadataStore>) -> Self {
        Self {
            store,
            file_prefix: config.file_prefix.clone(),
            chunk_prefix: config.chunk_prefix.clone(),
        }
    }

    pub fn store(&self) -> &Arc<dyn MetadataStore> {
        &self.store
    }

    pub fn chunk_prefix(&self) -> &str {
        &self.chunk_prefix
    }

    pub fn file_key(&self, file_id: &str) -> String {
        format!("{}{}", self.file_prefix, file_id)
    }

    pub fn chunk_key(&self, chunk_id: &str) -> String {
        format!("{}{}", self.chunk_prefix, chunk_id)
    }

    pub fn decode_chunk(value: &str) -> serde_json::Result<ChunkRecord> {
        serde_json::from_str(value)
    }

    /// Loads the single record under `key` together with its version.
    async fn load_one<T: DeserializeOwned>(&self, key: &str) -> Result<(T, u64)> {
        let mut kvs = self
            .store
            .get(key)
            .await
            .map_err(|e| ChunkServerError::MetadataReadFailure(format!("get {}: {}", key, e)))?;

        match kvs.len() {
            0 => Err(ChunkServerError::NotFound(key.to_string())),
            1 => {
                let kv = kvs.remove(0);
                let record = serde_json::from_str(&kv.value).map_err(|e| {
                    ChunkServerError::CorruptMetadata(format!("undecodable record {}: {}", key, e))
                })?;
                Ok((record, kv.version))
            }
            n => Err(ChunkServerError::CorruptMetadata(format!(
                "{} records under {}",
                n, key
            ))),
        }
    }

    async fn put_record<T: Serialize>(&self, key: &str, record: &T) -> Result<u64> {
        let value = serde_json::to_string(record).map_err(|e| {
            ChunkServerError::MetadataSyncFailure(format!("serialize {}: {}", key, e))
        })?;
        self.store
            .put(key, value)
            .await
            .map_err(|e| ChunkServerError::MetadataSyncFailure(format!("put {}: {}", key, e)))
    }

    pub async fn load_file(&self, file_id: &str) -> Result<FileRecord> {
        let (file, _) = self.load_one(&self.file_key(file_id)).await?;
        Ok(file)
    }

    pub async fn load_chunk(&self, chunk_id: &str) -> Result<(ChunkRecord, u64)> {
        self.load_one(&self.chunk_key(chunk_id)).await
    }

    pub async fn put_file(&self, file: &FileRecord) -> Result<u64> {
        self.put_record(&self.file_key(&file.id), file).await
    }

    pub async fn put_chunk(&self, chunk: &ChunkRecord) -> Result<u64> {
        self.put_record(&self.chunk_key(&chunk.id), chunk).await
    }

    /// Writes `chunk` only if its record is still at `expected_version`.
    pub async fn compare_and_put_chunk(
        &self,
        chunk: &ChunkRecord,
        expected_version: u64,
    ) -> Result<bool> {
        let key = self.chunk_key(&chunk.id);
        let value = serde_json::to_string(chunk).map_err(|e| {
            ChunkServerError::MetadataSyncFailure(format!("serialize {}: {}", key, e))
        })?;
        self.store
            .compare_and_put(&key, value, expected_version)
            .await
            .map_err(|e| ChunkServerError::MetadataSyncFailure(format!("cas {}: {}", key, e)))
    }

    pub async fn delete_file(&self, file_id: &str) -> Result<bool> {
        let key = self.file_key(file_id);
        self.store
            .delete(&key)
            .await
            .map_err(|e| ChunkServerError::MetadataSyncFailure(format!("delete {}: {}", key, e)))
    }

    pub async fn delete_chunk(&self, chunk_id: &str) -> Result<bool> {
        let key = self.chunk_key(chunk_id);
        self.store
            .delete(&key)
            .await
            .map_err(|e| ChunkServerError::MetadataSyncFailure(format!("delete {}: {}", key, e)))
    }
}
