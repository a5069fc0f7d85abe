use crate::membership::types::NodeId;
use rand::Rng;
use rand::seq::SliceRandom;

/// Picks up to `count` replica targets from `candidates`, never `local`.
///
/// A `count` of one or less selects nothing: the local copy already is the single replica.
pub fn select_replicas(candidates: &[NodeId], local: &NodeId, count: u32) -> Vec<NodeId> {
    select_replicas_with(&mut rand::thread_rng(), candidates, local, count)
}

pub fn select_replicas_with<R: Rng + ?Sized>(
    rng: &mut R,
    candidates: &[NodeId],
    local: &NodeId,
    count: u32,
) -> Vec<NodeId> {
    if count <= 1 {
        return Vec::new();
    }

    let mut pool = candidates.to_vec();
    if let Some(pos) = pool.iter().position(|node| node == local) {
        pool.swap_remove(pos);
    }

    pool.shuffle(rng);
    pool.truncate(count as usize);
    pool
}
