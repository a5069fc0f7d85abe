//! Distributed Chunk Store Node Library
//!
//! This library crate defines the modules that make up a single chunk-server node.
//! It serves as the foundation for the binary executable (`main.rs`).
//!
//! ## Architecture Modules
//! The node is composed of loosely coupled subsystems:
//!
//! - **`chunkserver`**: The request handlers (create, read, remove, push, delete chunk),
//!   the HTTP surface exposing them and the node bootstrap that wires everything together.
//! - **`replication`**: The watch-driven replication pipeline. A watcher observes newly
//!   written chunk metadata and feeds a bounded worker pool that pushes chunks to peers.
//! - **`membership`**: Lease-based liveness. Each node refreshes its own worker entry in
//!   the metadata store; the set of live workers is whatever has not expired.
//! - **`storage`**: Local chunk files on disk and the random, self-excluding replica selector.
//! - **`metadata`**: The coordination store API (get/put/delete, prefix scan, watch, leases)
//!   with an in-memory implementation, an HTTP service hosting it and an HTTP client.
//! - **`codec`**: Length-delimited bincode framing used by the streamed calls.

pub mod chunkserver;
pub mod codec;
pub mod config;
pub mod membership;
pub mod metadata;
pub mod replication;
pub mod shutdown;
pub mod storage;
