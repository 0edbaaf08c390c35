//! Scenario 1: with no adversary in the mix, a small honest-only network
//! should settle on one chain every peer agrees on.

#[cfg(test)]
use sim_driver::{mpu, SimConfig, World};
#[cfg(test)]
use sim_scheduler::Scheduler;

#[cfg(test)]
fn honest_only_config() -> SimConfig {
    SimConfig {
        number_of_peers: 5,
        z0: 0.0,
        z1: 0.0,
        z2: 0.0,
        min_neighbors: 2,
        max_neighbors: 4,
        mean_network_delay_millis: 20.0,
        avg_txn_interval_time: 200.0,
        number_of_transactions: 10,
        initial_coins: 1000.0,
        avg_block_mining_time: 500.0,
        max_num_blocks: 20,
        random_seed: 42,
        ..SimConfig::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn honest_peers_converge_on_one_chain() {
        let config = honest_only_config();
        config.validate().expect("scenario config is well-formed");
        let world = World::new(config).expect("a small honest overlay always connects");

        world.bootstrap();
        Scheduler::run_shared(&world.scheduler);

        let now = world.scheduler.borrow().now();
        let mut state = world.state.borrow_mut();
        for replica in state.replicas.values_mut() {
            replica.panic_validate(now);
        }

        // Every peer's adversary hash-share is zero, so no replica runs
        // the selfish policy; all of them should settle on the same tip.
        let leaves: std::collections::HashSet<_> = state
            .replicas
            .values()
            .map(|r| r.longest_public_leaf())
            .collect();
        assert_eq!(leaves.len(), 1, "all honest peers should agree on one tip");

        let ratios = mpu::compute_all(&state.replicas);
        for snapshot in &ratios {
            assert!(
                (snapshot.mpu_overall - 1.0).abs() < 1e-9,
                "peer {} should have no orphaned work: {:?}",
                snapshot.peer,
                snapshot
            );
        }
    }
}
