//! Overlay generation: who talks to whom, and how hashing power is spread
//! across the population.

use crate::error::NetworkError;
use rand::seq::SliceRandom;
use rand::Rng;
use shared_types::{PeerId, SimRng};
use std::collections::{HashMap, HashSet, VecDeque};

/// How many times to regenerate a disconnected overlay before giving up.
/// The original regenerated unboundedly; a bound here just turns a
/// theoretically-possible infinite loop into a reported error.
const MAX_OVERLAY_ATTEMPTS: u32 = 10_000;

/// Each peer's mining capacity as a share of the network's total hash
/// rate. The two always-present adversaries (`S01`, `S02`) hold their own
/// independent shares `z1`/`z2`; whatever's left over splits evenly across
/// the honest population.
#[derive(Debug, Clone)]
pub struct HashPowerPlan {
    pub z1: f64,
    pub z2: f64,
}

impl HashPowerPlan {
    pub fn new(z1: f64, z2: f64) -> Self {
        Self { z1, z2 }
    }

    pub fn cpu_power_for(&self, peer: &PeerId, honest_count: u32) -> f64 {
        match peer.as_str() {
            "S01" => self.z1,
            "S02" => self.z2,
            _ => {
                let honest_share = (1.0 - self.z1 - self.z2).max(0.0);
                honest_share / honest_count.max(1) as f64
            }
        }
    }
}

/// The two well-known adversary identities, matching the naming the rest
/// of the simulator expects when attributing a selfish-mining lead.
pub fn is_adversary(peer: &PeerId) -> bool {
    matches!(peer.as_str(), "S01" | "S02")
}

/// Generates `honest_count` honest peer ids plus the two always-present
/// adversary ids `S01` and `S02`.
pub fn peer_ids(honest_count: u32) -> Vec<PeerId> {
    let mut ids: Vec<PeerId> = (0..honest_count)
        .map(|i| PeerId::new(format!("h{i:03}")))
        .collect();
    ids.push(PeerId::new("S01"));
    ids.push(PeerId::new("S02"));
    ids
}

/// Samples `⌊peers.len() * z0⌋` peers, uniformly at random, to tag as
/// running on a slow network link.
pub fn tag_slow_peers(peers: &[PeerId], z0: f64, rng: &mut SimRng) -> HashSet<PeerId> {
    let count = ((peers.len() as f64) * z0).floor() as usize;
    let mut shuffled: Vec<PeerId> = peers.to_vec();
    shuffled.shuffle(rng);
    shuffled.into_iter().take(count).collect()
}

/// Builds a random overlay where every peer has `min_neighbors..=max_neighbors`
/// connections, regenerating from scratch whenever the result isn't fully
/// connected (disconnected components would let a minority partition
/// never learn about blocks on the other side, which the rest of the
/// simulator isn't built to model) or whenever some peer's fill loop ran
/// out of candidates with headroom before reaching its own target degree.
pub fn build_connected_overlay(
    peers: &[PeerId],
    min_neighbors: usize,
    max_neighbors: usize,
    rng: &mut SimRng,
) -> Result<HashMap<PeerId, Vec<PeerId>>, NetworkError> {
    for attempt in 0..MAX_OVERLAY_ATTEMPTS {
        let overlay = sample_overlay(peers, min_neighbors, max_neighbors, rng);
        if is_connected(&overlay, peers) && degrees_within_bounds(&overlay, min_neighbors, max_neighbors) {
            return Ok(overlay);
        }
        tracing::debug!(attempt, "generated overlay was disconnected or out of degree bounds, regenerating");
    }
    Err(NetworkError::OverlayDisconnected {
        peer_count: peers.len(),
        attempts: MAX_OVERLAY_ATTEMPTS,
    })
}

fn sample_overlay(
    peers: &[PeerId],
    min_neighbors: usize,
    max_neighbors: usize,
    rng: &mut SimRng,
) -> HashMap<PeerId, Vec<PeerId>> {
    let mut adjacency: HashMap<PeerId, HashSet<PeerId>> =
        peers.iter().map(|p| (p.clone(), HashSet::new())).collect();

    for peer in peers {
        let target = rng.gen_range(min_neighbors..=max_neighbors);
        let mut candidates: Vec<&PeerId> = peers.iter().filter(|p| *p != peer).collect();
        candidates.shuffle(rng);
        for candidate in candidates {
            if adjacency[peer].len() >= target {
                break;
            }
            if adjacency[peer].contains(candidate) {
                continue;
            }
            // A candidate a later peer already filled up to its own cap
            // must be skipped here too, or processing order alone could
            // push its final degree past `max_neighbors`.
            if adjacency[candidate].len() >= max_neighbors {
                continue;
            }
            adjacency.get_mut(peer).unwrap().insert(candidate.clone());
            adjacency.get_mut(candidate).unwrap().insert(peer.clone());
        }
    }

    adjacency
        .into_iter()
        .map(|(peer, neighbors)| (peer, neighbors.into_iter().collect()))
        .collect()
}

/// Whether every peer's final degree landed inside `[min_neighbors,
/// max_neighbors]`. The fill loop in [`sample_overlay`] enforces the
/// upper bound as it goes, but it can give up on a peer's lower bound if
/// every remaining candidate already hit its own cap first — this is
/// the check that catches that and sends the caller back to regenerate,
/// the same way a disconnected overlay does.
fn degrees_within_bounds(
    overlay: &HashMap<PeerId, Vec<PeerId>>,
    min_neighbors: usize,
    max_neighbors: usize,
) -> bool {
    overlay
        .values()
        .all(|neighbors| (min_neighbors..=max_neighbors).contains(&neighbors.len()))
}

fn is_connected(overlay: &HashMap<PeerId, Vec<PeerId>>, peers: &[PeerId]) -> bool {
    let Some(start) = peers.first() else {
        return true;
    };
    let mut seen = HashSet::new();
    let mut queue = VecDeque::new();
    queue.push_back(start.clone());
    seen.insert(start.clone());
    while let Some(current) = queue.pop_front() {
        for neighbor in overlay.get(&current).into_iter().flatten() {
            if seen.insert(neighbor.clone()) {
                queue.push_back(neighbor.clone());
            }
        }
    }
    seen.len() == peers.len()
}
