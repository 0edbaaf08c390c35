//! Decision/outcome value types returned by a [`super::replica::ChainReplica`].
//!
//! The replica never touches a scheduler itself — it hands back one of
//! these so the caller (the network/driver layer, which does own the
//! scheduler) can decide what to schedule next. This keeps block-tree and
//! policy logic pure and unit-testable without a running event loop.

use super::block::{Block, BlockId};

/// A freshly generated mining candidate plus how long it takes to mine,
/// returned by `ChainReplica::generate_block`.
#[derive(Debug, Clone)]
pub struct MiningAttempt {
    pub candidate: Block,
    pub delay_millis: f64,
}

/// What happened when a `MineFinish` event landed.
#[derive(Debug, Clone)]
pub enum MineFinishOutcome {
    /// The replica still held the parent this attempt was mined against —
    /// the attempt succeeds and the candidate (with its coinbase reward
    /// appended) is admitted.
    Success(Block),
    /// The parent moved on while this attempt was in flight; the attempt
    /// is discarded without being admitted.
    Stale,
}

/// The result of admitting a block into a replica, whatever the source
/// (network receipt, local mining success, or orphan recovery).
#[derive(Debug, Clone, Default)]
pub struct AddBlockOutcome {
    /// Whether the block was added to this replica's block set at all
    /// (false for a rejected double-spend, unknown txn, or duplicate).
    pub admitted: bool,
    /// Blocks that should now be broadcast to peers, in the order they
    /// should go out. Empty when nothing newly became the public tip.
    pub publish: Vec<BlockId>,
    /// Set when the admitted block displaces the replica's current
    /// mining target: the caller must cancel any in-flight mining event
    /// and start this one instead.
    pub remine: Option<MiningAttempt>,
    /// Ids that were recovered from the orphan buffer as a side effect of
    /// this admission (their parent just arrived).
    pub recovered_orphans: Vec<BlockId>,
}

impl AddBlockOutcome {
    pub fn rejected() -> Self {
        Self::default()
    }
}
