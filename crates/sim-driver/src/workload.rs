//! Synthesizes the transaction workload: a Poisson stream of transfers
//! between randomly chosen peers, fed into the network exactly like any
//! other scheduled event.

use crate::world::World;
use rand::Rng;
use shared_types::VirtualTime;
use sim_chain::Transaction;
use sim_scheduler::EventType;

/// Schedules the run's entire transaction workload up front, each one at
/// an exponentially distributed offset from the one before it. Returns
/// the timestamp of the last transaction created, so the caller can time
/// the bootstrap block-generation event relative to it.
pub fn schedule_transactions(world: &World) -> VirtualTime {
    let (count, mean_interval) = {
        let state = world.state.borrow();
        (
            state.config.number_of_transactions,
            state.config.avg_txn_interval_time,
        )
    };

    let mut created_at = VirtualTime::ZERO;
    for _ in 0..count {
        let delay = {
            let mut state = world.state.borrow_mut();
            shared_types::exponential(&mut state.rng, mean_interval)
        };
        created_at = created_at + VirtualTime::from_millis(delay);

        let origin = {
            let mut state = world.state.borrow_mut();
            let peers: Vec<_> = state.replicas.keys().cloned().collect();
            let idx = state.rng.gen_range(0..peers.len());
            peers[idx].clone()
        };

        let world_for_action = world.clone();
        let origin_for_action = origin.clone();
        world.scheduler.borrow_mut().schedule(
            EventType::TxnCreate,
            VirtualTime::ZERO,
            created_at,
            format!("{origin} creates a transaction"),
            move || {
                let (id, recipient, amount) = world_for_action.random_transfer(&origin_for_action);
                let now = world_for_action.scheduler.borrow().now();
                let tx = Transaction::new(id, origin_for_action.clone(), recipient, amount, now);
                world_for_action.on_transaction_created(tx, origin_for_action.clone());
            },
        );
    }
    created_at
}
