//! # Simulation Driver
//!
//! Owns one simulation run end to end: builds the peer overlay and chain
//! replicas from a [`config::SimConfig`], drives the scheduler to
//! completion, and exports the resulting ledger and mining-power-
//! utilization summary.

pub mod config;
pub mod error;
pub mod export;
pub mod mpu;
pub mod workload;
pub mod world;

use sim_scheduler::Scheduler;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

pub use config::SimConfig;
pub use error::DriverError;
pub use world::World;

/// Runs one simulation to completion and writes its artifacts to `out_dir`.
pub fn run(config: SimConfig, out_dir: &Path, show_progress: bool) -> Result<(), DriverError> {
    config.validate()?;
    let max_blocks = config.max_num_blocks;
    let world = World::new(config)?;

    if show_progress {
        install_progress_bar(&world, max_blocks);
    }
    install_interrupt_handler(&world);

    world.bootstrap();
    Scheduler::run_shared(&world.scheduler);

    {
        let mut state = world.state.borrow_mut();
        let now = world.scheduler.borrow().now();
        for replica in state.replicas.values_mut() {
            replica.panic_validate(now);
        }
    }

    let state = world.state.borrow();
    let mpu_ratios = mpu::compute_all(&state.replicas);

    let peers = state
        .peers
        .values()
        .map(|peer| {
            let replica = state.replicas.get(&peer.id).expect("every peer has a replica");
            let longest_chain = replica.get_longest_chain().iter().map(|b| b.id).collect();
            let blocks = replica
                .get_blocks()
                .map(|b| export::BlockSnapshot {
                    id: b.id,
                    fingerprint: replica
                        .fingerprint_of(b.id)
                        .unwrap_or_default()
                        .to_string(),
                    parent: b.parent,
                    miner: b.miner.clone(),
                    created_at: b.created_at,
                    arrival_time: replica.arrival_time_of(b.id).unwrap_or(b.created_at),
                    is_private: b.is_private,
                })
                .collect();
            export::PeerSnapshot {
                peer: peer.id.clone(),
                description: peer.cpu_net_description(),
                cpu_power: replica.cpu_power(),
                longest_chain,
                blocks,
            }
        })
        .collect();

    let results = export::RunResults {
        finished_at: world.scheduler.borrow().now(),
        blocks_mined: state.blocks_mined,
        peers,
        mpu_ratios,
    };

    info!(
        blocks_mined = state.blocks_mined,
        peer_count = state.replicas.len(),
        "run complete"
    );

    if !state.config.save_results {
        info!("save_results is false, skipping export");
        return Ok(());
    }
    export::write_run_artifacts(out_dir, &state.config, &results)
}

/// Flips the scheduler's hard stop when the process receives SIGINT/Ctrl-C,
/// mirroring the Python original's `KeyboardInterrupt` → `force_stop` →
/// `finally` export path: the run loop unwinds at the next event boundary
/// and the panic-validate/export sequence in [`run`] still executes.
///
/// The signal fires on its own OS thread, which has no safe way to reach
/// into `world`'s `Rc<RefCell<_>>` state, so it only flips a plain
/// `AtomicBool` that [`Scheduler::run`]/[`Scheduler::run_shared`] poll
/// directly — never a hook re-entering the scheduler's own `RefCell`.
fn install_interrupt_handler(world: &World) {
    let interrupted = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&interrupted);
    if let Err(err) = ctrlc::set_handler(move || {
        flag.store(true, Ordering::SeqCst);
    }) {
        warn!(%err, "failed to install interrupt handler; Ctrl-C will kill the run without exporting");
        return;
    }
    world.scheduler.borrow_mut().link_interrupt_flag(interrupted);
}

fn install_progress_bar(world: &World, max_blocks: u64) {
    use indicatif::{ProgressBar, ProgressStyle};

    let bar = ProgressBar::new(max_blocks);
    bar.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} blocks mined",
        )
        .expect("valid template")
        .progress_chars("#>-"),
    );

    let state = world.state.clone();
    let mut last_seen = 0u64;
    world.scheduler.borrow_mut().register_hook(move |_meta| {
        let mined = state.borrow().blocks_mined;
        if mined > last_seen {
            bar.set_position(mined);
            last_seen = mined;
        }
        if mined >= max_blocks {
            bar.finish_and_clear();
        }
    });
}
