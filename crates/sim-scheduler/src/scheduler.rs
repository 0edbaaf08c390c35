//! The discrete-event scheduler: a virtual clock driving a min-priority
//! queue of time-stamped actions.

use crate::event::{new_cancellation_flag, EventHandle, EventMeta, EventType};
use shared_types::VirtualTime;
use std::cell::{Cell, RefCell};
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;
use tracing::{debug, trace};

struct Entry {
    seq: u64,
    meta: EventMeta,
    cancelled: Rc<Cell<bool>>,
    action: Box<dyn FnOnce()>,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.meta.actionable_at == other.meta.actionable_at && self.seq == other.seq
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    /// Orders ascending by actionable time, then by insertion order. The
    /// insertion-order tiebreak is what makes two events scheduled for the
    /// same virtual instant run in FIFO-of-enqueue order (spec'd in
    /// §5 "Ordering guarantees").
    fn cmp(&self, other: &Self) -> Ordering {
        self.meta
            .actionable_at
            .cmp(&other.meta.actionable_at)
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

/// Owns the virtual clock, the event queue, and the soft/hard stop flags.
///
/// `stop_sim` (soft stop) is set once the driver's block quota is reached:
/// from that point, [`Scheduler::schedule`] silently drops every new event
/// except `BlockReceive`, so in-flight block deliveries still land while
/// new transaction/mining activity stops being admitted. `force_stop` (hard
/// stop) aborts [`Scheduler::run`] immediately, e.g. on a user interrupt.
pub struct Scheduler {
    clock: VirtualTime,
    queue: BinaryHeap<Reverse<Entry>>,
    hooks: Vec<Box<dyn FnMut(&EventMeta)>>,
    stop_sim: bool,
    force_stop: bool,
    next_seq: u64,
    /// Set by [`Self::link_interrupt_flag`] so an out-of-band signal (e.g.
    /// a SIGINT handler running on its own OS thread) can request a hard
    /// stop without ever touching the scheduler's own `Rc<RefCell<_>>` —
    /// a plain atomic load is checked alongside `force_stop` at every loop
    /// boundary in [`Self::run`]/[`Self::run_shared`].
    interrupt_flag: Option<Arc<AtomicBool>>,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            clock: VirtualTime::ZERO,
            queue: BinaryHeap::new(),
            hooks: Vec::new(),
            stop_sim: false,
            force_stop: false,
            next_seq: 0,
            interrupt_flag: None,
        }
    }

    /// Registers an external flag this scheduler polls for a hard stop in
    /// addition to its own `force_stop`. Intended for signal handlers that
    /// run on a thread with no safe way to reach back into this
    /// `Rc<RefCell<Scheduler>>`.
    pub fn link_interrupt_flag(&mut self, flag: Arc<AtomicBool>) {
        self.interrupt_flag = Some(flag);
    }

    fn interrupted(&self) -> bool {
        self.force_stop
            || self
                .interrupt_flag
                .as_ref()
                .is_some_and(|f| f.load(AtomicOrdering::SeqCst))
    }

    /// The current virtual clock reading.
    pub fn now(&self) -> VirtualTime {
        self.clock
    }

    pub fn is_soft_stopped(&self) -> bool {
        self.stop_sim
    }

    pub fn is_force_stopped(&self) -> bool {
        self.force_stop
    }

    /// Soft stop: after this, only `BlockReceive` events are admitted.
    pub fn request_soft_stop(&mut self) {
        self.stop_sim = true;
    }

    /// Hard stop: aborts `run()` as soon as the in-flight action returns.
    pub fn request_force_stop(&mut self) {
        self.force_stop = true;
    }

    /// Registers a hook invoked, in registration order, before every
    /// executed action (including ones the soft-stop filter would
    /// otherwise have excluded from running — the hook always sees what
    /// actually executes).
    pub fn register_hook(&mut self, hook: impl FnMut(&EventMeta) + 'static) {
        self.hooks.push(Box::new(hook));
    }

    /// Schedules `action` to run at `created_at + delay`, unless the
    /// soft-stop filter rejects it. Returns `None` when the event was
    /// dropped rather than admitted.
    pub fn schedule(
        &mut self,
        kind: EventType,
        created_at: VirtualTime,
        delay: VirtualTime,
        description: impl Into<String>,
        action: impl FnOnce() + 'static,
    ) -> Option<EventHandle> {
        if self.stop_sim && kind != EventType::BlockReceive {
            trace!(%kind, "event dropped by soft-stop filter");
            return None;
        }

        let actionable_at = created_at + delay;
        let meta = EventMeta {
            kind,
            created_at,
            actionable_at,
            description: description.into(),
        };
        let cancelled = new_cancellation_flag();
        let seq = self.next_seq;
        self.next_seq += 1;

        debug!(%kind, at = %actionable_at, "scheduled");
        self.queue.push(Reverse(Entry {
            seq,
            meta,
            cancelled: Rc::clone(&cancelled),
            action: Box::new(action),
        }));

        Some(EventHandle::new(cancelled))
    }

    /// Convenience for scheduling relative to the current clock.
    pub fn schedule_now(
        &mut self,
        kind: EventType,
        delay: VirtualTime,
        description: impl Into<String>,
        action: impl FnOnce() + 'static,
    ) -> Option<EventHandle> {
        let now = self.now();
        self.schedule(kind, now, delay, description, action)
    }

    /// Drains the queue, advancing the clock and firing each admitted,
    /// non-cancelled action in order. Stops early on a hard stop.
    /// Action panics are not caught — they unwind out of `run` exactly as
    /// an uncaught exception aborts the Python original's `run()`.
    pub fn run(&mut self) {
        while let Some(Reverse(entry)) = self.queue.pop() {
            if self.interrupted() {
                break;
            }
            if entry.cancelled.get() {
                continue;
            }

            self.clock = entry.meta.actionable_at;
            for hook in &mut self.hooks {
                hook(&entry.meta);
            }
            if self.interrupted() {
                break;
            }

            debug!(kind = %entry.meta.kind, at = %self.clock, "running");
            (entry.action)();
        }
    }

    /// Drains the queue the same way [`Self::run`] does, but through a
    /// shared handle rather than `&mut self`. An action that needs to
    /// schedule further events back onto this same scheduler (the normal
    /// case once the driver closures close over `Rc<RefCell<Scheduler>>`)
    /// can safely call `shared.borrow_mut()` from inside its own body,
    /// because this loop never holds a borrow across the call to
    /// `action()` itself.
    pub fn run_shared(shared: &Rc<RefCell<Scheduler>>) {
        loop {
            let entry = {
                let mut sched = shared.borrow_mut();
                if sched.interrupted() {
                    break;
                }
                loop {
                    match sched.queue.pop() {
                        None => break None,
                        Some(Reverse(entry)) if entry.cancelled.get() => continue,
                        Some(Reverse(entry)) => break Some(entry),
                    }
                }
            };
            let Some(entry) = entry else { break };

            {
                let mut sched = shared.borrow_mut();
                sched.clock = entry.meta.actionable_at;
                for hook in &mut sched.hooks {
                    hook(&entry.meta);
                }
                if sched.interrupted() {
                    break;
                }
            }

            debug!(kind = %entry.meta.kind, at = %entry.meta.actionable_at, "running");
            (entry.action)();
        }
    }

    /// Number of events still queued (cancelled entries included until
    /// they surface and get skipped).
    pub fn pending_count(&self) -> usize {
        self.queue.len()
    }
}
