//! Local Storage Module
//!
//! Holds the bytes of chunks owned or replicated by this node and decides where
//! new replicas go.
//!
//! ## Core Concepts
//! - **Chunk files**: `ChunkStore` keeps one file per chunk id under the data directory.
//!   Files written by ingestion are zero-padded to the chunk capacity; the padding is
//!   stripped on read using the `used_bytes` of the chunk record.
//! - **Placement**: `select_replicas` draws peers uniformly at random from the live
//!   worker set, never choosing the local node.

pub mod chunkstore;
pub mod selector;

pub use chunkstore::ChunkStore;
pub use selector::{select_replicas, select_replicas_with};

#[cfg(test)]
mod tests;
