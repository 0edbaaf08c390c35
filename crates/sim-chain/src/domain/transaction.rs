//! Transactions and their deterministic identity.

use serde::Serialize;
use shared_types::{Coins, PeerId, VirtualTime};
use std::fmt;

/// A transaction's identity: the peer that originated it (the sender for a
/// regular transfer, the miner for a coinbase) plus a per-origin sequence
/// number. Deterministic and collision-free without any randomness, so
/// identity stays reproducible given a fixed RNG seed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TxId {
    origin: PeerIdSeq,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
struct PeerIdSeq {
    // PeerId doesn't implement Copy (it wraps a String); TxId needs to be
    // cheaply copyable for use as a map/set key in hot branch walks, so we
    // intern the peer as an index assigned by the allocator instead.
    peer_index: u32,
    seq: u64,
}

/// Hands out collision-free transaction ids, one counter per peer.
#[derive(Debug, Default)]
pub struct TxIdAllocator {
    peer_indices: std::collections::HashMap<PeerId, u32>,
    next_peer_index: u32,
    next_seq: std::collections::HashMap<u32, u64>,
}

impl TxIdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&mut self, origin: &PeerId) -> TxId {
        let peer_index = *self
            .peer_indices
            .entry(origin.clone())
            .or_insert_with(|| {
                let idx = self.next_peer_index;
                self.next_peer_index += 1;
                idx
            });
        let seq = self.next_seq.entry(peer_index).or_insert(0);
        let id = TxId {
            origin: PeerIdSeq {
                peer_index,
                seq: *seq,
            },
        };
        *seq += 1;
        id
    }
}

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tx#{}-{}", self.origin.peer_index, self.origin.seq)
    }
}

/// A transaction: a transfer of `amount` from `sender` to `recipient`, or a
/// coinbase reward when `sender` is `None`.
#[derive(Clone, Debug, Serialize)]
pub struct Transaction {
    pub id: TxId,
    pub sender: Option<PeerId>,
    pub recipient: PeerId,
    pub amount: Coins,
    pub created_at: VirtualTime,
}

impl Transaction {
    pub fn new(
        id: TxId,
        sender: PeerId,
        recipient: PeerId,
        amount: Coins,
        created_at: VirtualTime,
    ) -> Self {
        Self {
            id,
            sender: Some(sender),
            recipient,
            amount,
            created_at,
        }
    }

    /// A synthesized mining reward, inserted by the chain replica at
    /// mine-success. Not counted against the pending transaction pool and
    /// never subject to balance validation against the spender.
    pub fn coinbase(id: TxId, miner: PeerId, reward: Coins, created_at: VirtualTime) -> Self {
        Self {
            id,
            sender: None,
            recipient: miner,
            amount: reward,
            created_at,
        }
    }

    pub fn is_coinbase(&self) -> bool {
        self.sender.is_none()
    }
}

impl PartialEq for Transaction {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Transaction {}
