//! Metadata Service Protocol
//!
//! Endpoints and DTOs of the HTTP service that hosts an in-memory store for a
//! cluster of node processes. Every call is a JSON `POST`; the watch call answers
//! with a framed stream of `WatchEvent`s.

use super::types::{KeyValue, LeaseId};
use serde::{Deserialize, Serialize};

pub const ENDPOINT_RANGE: &str = "/kv/range";
pub const ENDPOINT_PUT: &str = "/kv/put";
pub const ENDPOINT_CAS: &str = "/kv/cas";
pub const ENDPOINT_DELETE: &str = "/kv/delete";
pub const ENDPOINT_WATCH: &str = "/kv/watch";
pub const ENDPOINT_LEASE_GRANT: &str = "/lease/grant";

/// Upper bound for a single watch frame. Values are metadata records, never chunk bytes.
pub const MAX_WATCH_FRAME: usize = 16 * 1024 * 1024;

#[derive(Debug, Serialize, Deserialize)]
pub struct RangeRequest {
    pub key: String,
    /// When set, `key` is treated as a prefix.
    #[serde(default)]
    pub prefix: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RangeResponse {
    pub kvs: Vec<KeyValue>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PutRequest {
    pub key: String,
    pub value: String,
    #[serde(default)]
    pub lease: Option<LeaseId>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PutResponse {
    pub version: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CasRequest {
    pub key: String,
    pub value: String,
    pub expected_version: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CasResponse {
    pub succeeded: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteRequest {
    pub key: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub deleted: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LeaseGrantRequest {
    pub ttl_ms: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WatchRequest {
    pub prefix: String,
}

/// Body of every non-2xx answer.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub message: String,
}
