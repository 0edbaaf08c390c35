//! Blocks and their deterministic identity.

use super::transaction::{Transaction, TxId};
use serde::Serialize;
use sha2::{Digest, Sha256};
use shared_types::{PeerId, VirtualTime};
use std::fmt;

/// A block's identity.
///
/// The original simulator let Python assign each block an id from
/// `id(obj)`, which is not reproducible across runs. Here a block is
/// identified either as the one distinguished genesis sentinel, or by the
/// `(miner, seq)` pair under which it was mined — `seq` is a per-miner
/// monotonic counter, so two blocks never collide and replaying the same
/// seed always produces the same ids.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum BlockId {
    Genesis,
    Mined { miner_index: u32, seq: u64 },
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockId::Genesis => write!(f, "genesis"),
            BlockId::Mined { miner_index, seq } => write!(f, "blk#{miner_index}-{seq}"),
        }
    }
}

/// Hands out collision-free block ids, one counter per miner, and resolves
/// a miner's `PeerId` to the stable index `BlockId` carries.
#[derive(Debug, Default)]
pub struct BlockIdAllocator {
    miner_indices: std::collections::HashMap<PeerId, u32>,
    next_miner_index: u32,
    next_seq: std::collections::HashMap<u32, u64>,
}

impl BlockIdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&mut self, miner: &PeerId) -> BlockId {
        let miner_index = self.index_of(miner);
        let seq = self.next_seq.entry(miner_index).or_insert(0);
        let id = BlockId::Mined {
            miner_index,
            seq: *seq,
        };
        *seq += 1;
        id
    }

    fn index_of(&mut self, miner: &PeerId) -> u32 {
        *self.miner_indices.entry(miner.clone()).or_insert_with(|| {
            let idx = self.next_miner_index;
            self.next_miner_index += 1;
            idx
        })
    }
}

/// A block in a replica's local view of the chain.
///
/// `parent` is `None` only for the genesis block. `is_private` marks a
/// block a selfish replica is withholding on its secret branch; it is
/// cleared the moment the block is published to the public chain.
#[derive(Clone, Debug, Serialize)]
pub struct Block {
    pub id: BlockId,
    pub parent: Option<BlockId>,
    pub transactions: Vec<Transaction>,
    pub created_at: VirtualTime,
    pub miner: Option<PeerId>,
    pub is_private: bool,
}

impl Block {
    pub fn genesis() -> Self {
        Self {
            id: BlockId::Genesis,
            parent: None,
            transactions: Vec::new(),
            created_at: VirtualTime::ZERO,
            miner: None,
            is_private: false,
        }
    }

    pub fn new(
        id: BlockId,
        parent: BlockId,
        transactions: Vec<Transaction>,
        created_at: VirtualTime,
        miner: PeerId,
        is_private: bool,
    ) -> Self {
        Self {
            id,
            parent: Some(parent),
            transactions,
            created_at,
            miner: Some(miner),
            is_private,
        }
    }

    /// Number of transactions plus the block itself, mirroring the
    /// original's notion of block "size" used for mpu accounting.
    pub fn size(&self) -> usize {
        self.transactions.len() + 1
    }

    pub fn is_genesis(&self) -> bool {
        matches!(self.id, BlockId::Genesis)
    }

    pub fn mined_by(&self, peer: &PeerId) -> bool {
        self.miner.as_ref() == Some(peer)
    }
}

/// Genesis's structural fingerprint: no parent, no transactions, a fixed
/// timestamp, so it's the same for every replica in every run.
pub fn genesis_fingerprint() -> String {
    fingerprint_of(BlockId::Genesis, None, VirtualTime::ZERO, &[])
}

/// The block's structural fingerprint: a hash of its own id, its parent's
/// fingerprint, its timestamp, and the ids of the transactions it carries.
///
/// Stands in for a proof-of-work hash without computing one: it exists so
/// two replicas that both validated the same block agree on a single
/// opaque key for it, and so identity stays reproducible given a fixed
/// RNG seed. Nothing here is treated as cryptographically binding.
pub fn fingerprint_of(
    id: BlockId,
    parent_fingerprint: Option<&str>,
    created_at: VirtualTime,
    transactions: &[TxId],
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(id.to_string().as_bytes());
    hasher.update(parent_fingerprint.unwrap_or("").as_bytes());
    hasher.update(created_at.as_millis().to_le_bytes());
    for tx in transactions {
        hasher.update(tx.to_string().as_bytes());
    }
    hex::encode(hasher.finalize())
}

impl PartialEq for Block {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Block {}
