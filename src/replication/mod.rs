//! Replication Module
//!
//! Replicates chunks created on this node to randomly selected peers, asynchronously
//! and at most once per chunk from this node.
//!
//! ## Architecture Overview
//! 1. **Watch**: `ChunkWatcher` follows every write under the chunk namespace.
//! 2. **Trigger**: a written chunk record whose only replica is this node is queued.
//!    The sync job's own write grows the replica set, so the resulting event is ignored.
//! 3. **Execution**: `SyncPool` workers drain the bounded `SyncQueue` and run a `SyncJob`
//!    per chunk: select peers, push the bytes, record who succeeded.
//!
//! ## Submodules
//! - **`watcher`**: the watch loop and the trigger rule.
//! - **`pool`**: bounded queue and worker tasks.
//! - **`sync`**: the per-chunk job and the replica-set commit.

pub mod pool;
pub mod sync;
pub mod watcher;

pub use pool::{SyncPool, SyncQueue};
pub use sync::{SyncJob, SyncOutcome};
pub use watcher::{ChunkWatcher, needs_sync};

#[cfg(test)]
mod tests;
