//! Metadata Store Module
//!
//! The node keeps no durable metadata of its own. File records, chunk records and
//! worker liveness entries all live in an external, strongly consistent key/value store
//! that this module consumes through the `MetadataStore` trait.
//!
//! ## Primitives
//! - **Key/Value**: get, prefix scan, put, compare-and-put on version, delete.
//! - **Leases**: a granted lease expires after its TTL and takes every key bound to it along.
//! - **Watch**: a prefix watch yields a `Put` or `Delete` event for every change under the prefix.
//!
//! ## Implementations
//! - **`memory`**: `InMemoryMetadataStore`, used by tests and by the `metastore` service.
//! - **`service`**: axum router exposing an `InMemoryMetadataStore` over HTTP.
//! - **`remote`**: `HttpMetadataStore`, the client side of that service.

pub mod memory;
pub mod protocol;
pub mod remote;
pub mod service;
pub mod store;
pub mod types;

pub use memory::InMemoryMetadataStore;
pub use remote::HttpMetadataStore;
pub use store::{MetadataError, MetadataResult, MetadataStore, WatchStream};
pub use types::{KeyValue, Lease, LeaseId, WatchEvent};
