//! Chunk Server Protocol
//!
//! Endpoints and messages of the node's HTTP surface.
//!
//! Uploads and downloads carry a framed stream of `FileChunkData` (see `crate::codec`);
//! everything else is JSON, except the replica push body which is the raw chunk bytes.

use serde::{Deserialize, Serialize};

// --- API Endpoints ---

/// `POST` streams a file in, `GET /files/{id}` streams it out, `DELETE` removes it.
pub const ENDPOINT_FILES: &str = "/files";
pub const ENDPOINT_FILE: &str = "/files/:id";
/// Replica push (`PUT`) and replica delete (`DELETE`) issued by other nodes.
pub const ENDPOINT_INTERNAL_CHUNK: &str = "/internal/chunks/:id";

pub fn file_path(file_id: &str) -> String {
    format!("{}/{}", ENDPOINT_FILES, file_id)
}

pub fn internal_chunk_path(chunk_id: &str) -> String {
    format!("/internal/chunks/{}", chunk_id)
}

// --- Data Transfer Objects ---

/// One message of an upload or download stream.
///
/// On upload every message becomes one chunk, so `payload` must not exceed the
/// chunk capacity. The file is named after the last message's `file_name`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileChunkData {
    pub payload: Vec<u8>,
    pub file_name: String,
}

/// Status reply for remove, push and delete-chunk, and the body of every error.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GenericResponse {
    pub code: i32,
    pub message: String,
}

impl GenericResponse {
    pub fn success() -> Self {
        Self {
            code: 0,
            message: "success".to_string(),
        }
    }
}
