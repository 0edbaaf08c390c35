//! Event types and metadata.

use shared_types::VirtualTime;
use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

/// The closed set of event kinds the scheduler moves through the system.
///
/// Transaction and block events mirror their message's lifecycle
/// (create → send → receive → broadcast); mining events mirror a single
/// miner's in-flight attempt (start → finish → success | fail).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventType {
    TxnCreate,
    TxnSend,
    TxnReceive,
    TxnBroadcast,

    BlockCreate,
    BlockSend,
    BlockReceive,
    BlockBroadcast,
    BlockAccepted,

    MineStart,
    MineFinish,
    MineSuccess,
    MineFail,
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            EventType::TxnCreate => "TXN_CREATED",
            EventType::TxnSend => "TXN_SENT",
            EventType::TxnReceive => "TXN_RECEIVED",
            EventType::TxnBroadcast => "TXN_BROADCASTED",
            EventType::BlockCreate => "BLOCK_CREATED",
            EventType::BlockSend => "BLOCK_SENT",
            EventType::BlockReceive => "BLOCK_RECEIVED",
            EventType::BlockBroadcast => "BLOCK_BROADCASTED",
            EventType::BlockAccepted => "BLOCK_ACCEPTED",
            EventType::MineStart => "BLOCK_MINE_STARTED",
            EventType::MineFinish => "BLOCK_MINE_FINISHED",
            EventType::MineSuccess => "BLOCK_MINE_SUCCESSFUL",
            EventType::MineFail => "BLOCK_MINE_FAILED",
        };
        write!(f, "{label}")
    }
}

/// The read-only facts about a scheduled event, visible to run-hooks and
/// to log lines. Does not carry the action closure itself.
#[derive(Clone, Debug)]
pub struct EventMeta {
    pub kind: EventType,
    pub created_at: VirtualTime,
    pub actionable_at: VirtualTime,
    pub description: String,
}

/// A handle to a scheduled event, returned by [`crate::Scheduler::schedule`].
///
/// Cancellation is cooperative: it flips a shared flag that the scheduler
/// consults when the event reaches the head of the queue. A cancelled
/// event is never removed from the heap; it's simply skipped when popped.
/// Cancelling twice, or cancelling an event that already ran, is a no-op.
#[derive(Clone, Debug)]
pub struct EventHandle {
    cancelled: Rc<Cell<bool>>,
}

impl EventHandle {
    pub(crate) fn new(cancelled: Rc<Cell<bool>>) -> Self {
        Self { cancelled }
    }

    /// An inert handle for an event the scheduler declined to admit
    /// (e.g. dropped by the soft-stop filter). Cancelling it does nothing.
    pub fn inert() -> Self {
        Self {
            cancelled: Rc::new(Cell::new(true)),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.set(true);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.get()
    }
}

pub(crate) fn new_cancellation_flag() -> Rc<Cell<bool>> {
    Rc::new(Cell::new(false))
}
