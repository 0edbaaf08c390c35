//! A peer's place in the overlay: who it's connected to, and the
//! forwarding policy that decides whether a message it just received gets
//! relayed onward.

use sim_chain::{BlockId, TxId};
use shared_types::PeerId;
use std::collections::HashSet;

/// Identifies a gossiped message for duplicate-forward suppression.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MessageId {
    Transaction(TxId),
    Block(BlockId),
}

impl MessageId {
    pub fn is_block(self) -> bool {
        matches!(self, MessageId::Block(_))
    }
}

/// A peer's view of its own neighborhood and forwarding history.
///
/// Honest peers flood every new message to every neighbor but the one it
/// arrived from. A selfish peer still floods transactions (it has no
/// reason to starve the network of fee-paying activity) but only relays
/// a block when its own chain replica's policy names that block in a
/// publish decision — it never echoes a block it merely heard about from
/// someone else, which would help the public chain catch up for free.
#[derive(Debug, Clone)]
pub struct Peer {
    pub id: PeerId,
    pub neighbors: Vec<PeerId>,
    pub is_selfish: bool,
    /// Whether this peer was tagged as running on a slow network link at
    /// overlay construction time (`Z0` of the run configuration).
    pub is_slow: bool,
    forwarded: HashSet<MessageId>,
}

impl Peer {
    pub fn new(id: PeerId, neighbors: Vec<PeerId>, is_selfish: bool, is_slow: bool) -> Self {
        Self {
            id,
            neighbors,
            is_selfish,
            is_slow,
            forwarded: HashSet::new(),
        }
    }

    /// A short human-readable tag for logs and exported JSON, e.g.
    /// `"selfish/slow"` or `"honest/fast"`.
    pub fn cpu_net_description(&self) -> String {
        format!(
            "{}/{}",
            if self.is_selfish { "selfish" } else { "honest" },
            if self.is_slow { "slow" } else { "fast" },
        )
    }

    /// Marks `msg` as seen, returning `true` the first time (when it's
    /// eligible for dispatch and forwarding) and `false` on every later
    /// duplicate. Callers must check this before acting on a received
    /// message at all: a message already forwarded is dropped outright,
    /// not just skipped for re-forwarding, so this is the one gate that
    /// covers both dispatch-to-replica and relay-to-neighbors.
    pub fn first_sighting(&mut self, msg: MessageId) -> bool {
        self.forwarded.insert(msg)
    }

    /// Who this peer should relay `msg` to, given it just arrived from
    /// `from` (absent for messages this peer originated itself) and
    /// whether the chain/mempool layer explicitly sanctioned forwarding a
    /// block (irrelevant for transactions, which always flood).
    ///
    /// Does not perform duplicate-forward suppression itself — callers
    /// must already have confirmed [`Peer::first_sighting`] for `msg`
    /// before calling this.
    pub fn forward_targets(
        &self,
        msg: MessageId,
        from: Option<&PeerId>,
        policy_sanctioned: bool,
    ) -> Vec<PeerId> {
        if self.is_selfish && msg.is_block() && !policy_sanctioned {
            return Vec::new();
        }
        self.neighbors
            .iter()
            .filter(|n| Some(*n) != from)
            .cloned()
            .collect()
    }
}
