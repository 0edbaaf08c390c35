//! Mining Power Utilization: how much of the chain each peer contributed,
//! relative to how much mining it actually did, all from that peer's own
//! vantage point.
//!
//! Unlike a global canonical-chain metric, these ratios are deliberately
//! computed per peer against that peer's own replica — an adversary and an
//! honest peer can (and during a successful selfish-mining run, do) end up
//! looking at different "longest chains".

use serde::Serialize;
use shared_types::PeerId;
use sim_chain::ChainReplica;
use std::collections::HashMap;

/// One peer's mining-power-utilization snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct PeerMpu {
    pub peer: PeerId,
    /// `(blocks this peer mined that ended up on its own longest chain) /
    /// (blocks this peer ever mined, on this peer's own view)`. `0` when
    /// the peer never mined anything.
    pub mpu_adv: f64,
    /// `(this peer's longest chain length) / (all blocks this peer knows
    /// about)`. `1.0` when every known block made it onto the chain (no
    /// orphaned or withheld work); lower when forks or private branches
    /// went nowhere.
    pub mpu_overall: f64,
    pub blocks_mined_on_chain: u64,
    pub blocks_mined_total: u64,
    pub chain_length: u64,
    pub known_blocks: u64,
}

/// Computes one [`PeerMpu`] snapshot per replica in `replicas`.
pub fn compute_all(replicas: &HashMap<PeerId, ChainReplica>) -> Vec<PeerMpu> {
    let mut table: Vec<PeerMpu> = replicas.values().map(compute_for).collect();
    table.sort_by(|a, b| a.peer.as_str().cmp(b.peer.as_str()));
    table
}

fn compute_for(replica: &ChainReplica) -> PeerMpu {
    let owner = replica.owner();
    let chain = replica.get_longest_chain();
    let chain_length = chain.len() as u64;
    let blocks_mined_on_chain = chain.iter().filter(|b| b.mined_by(owner)).count() as u64;

    let known_blocks_vec: Vec<_> = replica.get_blocks().collect();
    let known_blocks = known_blocks_vec.len() as u64;
    let blocks_mined_total = known_blocks_vec.iter().filter(|b| b.mined_by(owner)).count() as u64;

    let mpu_adv = if blocks_mined_total == 0 {
        0.0
    } else {
        blocks_mined_on_chain as f64 / blocks_mined_total as f64
    };
    let mpu_overall = if known_blocks == 0 {
        0.0
    } else {
        chain_length as f64 / known_blocks as f64
    };

    PeerMpu {
        peer: owner.clone(),
        mpu_adv,
        mpu_overall,
        blocks_mined_on_chain,
        blocks_mined_total,
        chain_length,
        known_blocks,
    }
}
