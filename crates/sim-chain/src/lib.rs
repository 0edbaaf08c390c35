//! # Chain Replica
//!
//! One peer's local view of the block tree: validation, branch
//! bookkeeping, orphan recovery, the mining lifecycle, and the
//! honest/selfish policies that decide what to mine on next and when to
//! publish. Deliberately scheduler-agnostic — every operation here
//! returns a decision value rather than touching a clock or an event
//! queue, so the policy logic is exercised directly in unit tests without
//! a running simulation.

pub mod domain;
pub mod error;

pub use domain::block::{Block, BlockId, BlockIdAllocator};
pub use domain::outcome::{AddBlockOutcome, MineFinishOutcome, MiningAttempt};
pub use domain::replica::{ChainReplica, ReplicaMode};
pub use domain::selfish::{SelfishAction, SelfishMachine, SelfishState};
pub use domain::transaction::{Transaction, TxId, TxIdAllocator};
pub use error::ChainError;
