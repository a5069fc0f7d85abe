//! Membership & Liveness Module
//!
//! Each node announces itself by keeping a worker entry alive in the metadata store.
//! There is no peer-to-peer failure detection: a node that stops refreshing simply
//! disappears once its lease runs out.
//!
//! ## Core Mechanisms
//! - **Lease refresh**: every keepalive interval a new lease is granted and the entry
//!   `{worker_prefix}{node}` is re-written under it with the advertised address.
//! - **Discovery**: the live worker set is a prefix scan of the worker namespace.

pub mod liveness;
pub mod types;

pub use liveness::LivenessService;
pub use types::{NodeId, WorkerEntry};
