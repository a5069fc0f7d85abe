//! Chunk Server Module
//!
//! The request-facing side of a node.
//!
//! ## Core Concepts
//! - **Ingestion**: an upload is a stream of messages; each message becomes one chunk,
//!   zero-padded to the chunk capacity on disk and recorded in the metadata store
//!   before the next message is read.
//! - **Reads** come from the local disk only, with padding stripped.
//! - **Removal** is best effort: every replica is asked to delete its copy and
//!   failures are only logged.
//! - **Replica pushes** from other nodes are stored verbatim without touching metadata.
//!
//! ## Submodules
//! - **`service`**: `ChunkServer`, the operations themselves.
//! - **`handlers`** / **`protocol`**: the axum router and its wire types.
//! - **`records`**: typed file/chunk records on top of the metadata store.
//! - **`client`**: HTTP client for the surface, and the peer transport used by replication.
//! - **`node`**: `ChunkNode`, which starts a complete node.

pub mod client;
pub mod error;
pub mod handlers;
pub mod node;
pub mod protocol;
pub mod records;
pub mod service;
pub mod types;

pub use client::{ChunkServerClient, HttpPeerClient, PeerClient};
pub use error::ChunkServerError;
pub use node::ChunkNode;
pub use service::ChunkServer;
pub use types::{ChunkRecord, ChunkRef, FileRecord};
