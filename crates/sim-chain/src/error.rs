//! Chain replica errors.

use shared_types::PeerId;
use thiserror::Error;

/// Failures a replica can hit while validating or admitting a block or
/// transaction. None of these are simulator-fatal: the caller decides
/// whether a rejection is logged and dropped, or buffers the block as an
/// orphan for later recovery.
#[derive(Debug, Error, PartialEq)]
pub enum ChainError {
    #[error("block references unknown parent")]
    UnknownParent,

    #[error("non-genesis block has no parent reference")]
    MissingParent,

    #[error("transaction {sender} -> {recipient} would overdraw the branch")]
    InsufficientBalance { sender: PeerId, recipient: PeerId },

    #[error("block already present in this replica")]
    DuplicateBlock,

    #[error("transaction already present in this block's branch")]
    DuplicateTransaction,
}

impl ChainError {
    /// Whether retrying later (e.g. once the missing parent arrives) could
    /// plausibly succeed, as opposed to a rejection that will never become
    /// valid no matter what else is admitted first.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ChainError::UnknownParent)
    }
}
