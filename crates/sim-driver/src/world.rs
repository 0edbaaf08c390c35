//! Wires the scheduler, the peer overlay, and every chain replica
//! together. `World` is the single piece of shared mutable state the
//! scheduled closures capture, exactly the way the scheduler's own event
//! queue is shared: everything lives behind `Rc<RefCell<_>>` so a
//! `MineFinish` closure firing years (in virtual time) after it was
//! scheduled can still reach back into the same replica it was mining
//! against.

use crate::config::SimConfig;
use crate::error::DriverError;
use rand::Rng;
use shared_types::{Coins, PeerId, SimRng, VirtualTime};
use sim_chain::{Block, BlockId, BlockIdAllocator, ChainReplica, TxId, TxIdAllocator, Transaction};
use sim_network::{is_adversary, tag_slow_peers, HashPowerPlan, LinkTable, MessageId, Peer};
use sim_scheduler::{EventHandle, EventType, Scheduler};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;
use tracing::{info, trace};

const COINBASE_REWARD: Coins = Coins(6.25);

/// Everything a scheduled closure needs to touch other than the
/// scheduler itself (which gets its own `Rc<RefCell<_>>` so
/// [`Scheduler::run_shared`] can let actions reschedule onto it without
/// tripping `RefCell`'s reentrancy guard).
pub struct WorldState {
    pub config: SimConfig,
    pub replicas: HashMap<PeerId, ChainReplica>,
    pub peers: HashMap<PeerId, Peer>,
    pub links: LinkTable,
    pub block_ids: BlockIdAllocator,
    pub tx_ids: TxIdAllocator,
    pub rng: SimRng,
    pub blocks_mined: u64,
    /// In-flight mining event per peer, so a rebase can cancel the old
    /// one before scheduling the new attempt.
    pub mining_events: HashMap<PeerId, EventHandle>,
}

/// The full, shareable simulation. Cloning a `World` clones the `Rc`s, so
/// every scheduled closure gets its own cheap handle onto the same state.
#[derive(Clone)]
pub struct World {
    pub scheduler: Rc<RefCell<Scheduler>>,
    pub state: Rc<RefCell<WorldState>>,
}

impl World {
    pub fn new(config: SimConfig) -> Result<Self, DriverError> {
        let mut rng = shared_types::rng::seeded_rng(config.random_seed);
        let honest_count = config.number_of_peers.saturating_sub(2);
        let peer_list = sim_network::peer_ids(honest_count);
        let overlay = sim_network::build_connected_overlay(
            &peer_list,
            config.min_neighbors,
            config.max_neighbors,
            &mut rng,
        )?;
        let slow_peers: HashSet<PeerId> = tag_slow_peers(&peer_list, config.z0, &mut rng);
        let plan = HashPowerPlan::new(config.z1, config.z2);

        let mut replicas = HashMap::new();
        let mut peers = HashMap::new();
        for peer_id in &peer_list {
            let neighbors = overlay.get(peer_id).cloned().unwrap_or_default();
            let known_peers: Vec<PeerId> =
                peer_list.iter().filter(|p| *p != peer_id).cloned().collect();
            let cpu_power = plan.cpu_power_for(peer_id, honest_count);
            let selfish = is_adversary(peer_id);
            let is_slow = slow_peers.contains(peer_id);

            replicas.insert(
                peer_id.clone(),
                ChainReplica::new(
                    peer_id.clone(),
                    known_peers,
                    cpu_power,
                    config.avg_block_mining_time,
                    Coins(config.initial_coins),
                    selfish,
                ),
            );
            peers.insert(
                peer_id.clone(),
                Peer::new(peer_id.clone(), neighbors, selfish, is_slow),
            );
        }

        let links = LinkTable::new(config.mean_network_delay_millis);
        let state = WorldState {
            config,
            replicas,
            peers,
            links,
            block_ids: BlockIdAllocator::new(),
            tx_ids: TxIdAllocator::new(),
            rng,
            blocks_mined: 0,
            mining_events: HashMap::new(),
        };

        Ok(World {
            scheduler: Rc::new(RefCell::new(Scheduler::new())),
            state: Rc::new(RefCell::new(state)),
        })
    }

    pub fn peer_ids(&self) -> Vec<PeerId> {
        self.state.borrow().replicas.keys().cloned().collect()
    }

    /// Kicks off the run: the two adversaries start mining immediately
    /// against genesis, the transaction workload is scheduled up front,
    /// and a single randomly chosen peer gets one scheduled
    /// block-generation event two thirds of the way into that workload —
    /// the only external nudge an honest peer needs, since from then on
    /// `mine_success`/`receive_block` cascade mining to whichever replica
    /// adopts a longer chain. Called once before `Scheduler::run_shared`.
    pub fn bootstrap(&self) {
        for peer_id in self.peer_ids() {
            if is_adversary(&peer_id) {
                self.start_mining(&peer_id);
            }
        }

        let last_txn_at = crate::workload::schedule_transactions(self);
        let seed_peer = {
            let mut state = self.state.borrow_mut();
            let peers: Vec<_> = state.replicas.keys().cloned().collect();
            let idx = state.rng.gen_range(0..peers.len());
            peers[idx].clone()
        };
        let seed_at = VirtualTime::from_millis(last_txn_at.as_millis() * 2.0 / 3.0);

        let world = self.clone();
        self.scheduler.borrow_mut().schedule(
            EventType::MineStart,
            VirtualTime::ZERO,
            seed_at,
            format!("{seed_peer} starts the honest mining cascade"),
            move || world.start_mining(&seed_peer),
        );
    }

    /// Starts a fresh mining attempt for `peer_id` against its replica's
    /// current tip, cancelling whatever attempt was already in flight.
    pub fn start_mining(&self, peer_id: &PeerId) {
        let mut state = self.state.borrow_mut();
        if let Some(handle) = state.mining_events.remove(peer_id) {
            handle.cancel();
        }
        let next_id = state.block_ids.allocate(peer_id);
        let now = self.scheduler.borrow().now();
        let attempt = {
            let replica = state.replicas.get_mut(peer_id).expect("known peer");
            replica.generate_block(now, &mut state.rng, next_id)
        };
        drop(state);
        self.schedule_mine_finish(peer_id.clone(), attempt.candidate, attempt.delay_millis);
    }

    fn schedule_mine_finish(&self, peer_id: PeerId, candidate: Block, delay_millis: f64) {
        let world = self.clone();
        let now = self.scheduler.borrow().now();
        let description = format!("{peer_id} finishes mining {}", candidate.id);
        let scheduled_for = peer_id.clone();
        let handle = self.scheduler.borrow_mut().schedule(
            EventType::MineFinish,
            now,
            VirtualTime::from_millis(delay_millis),
            description,
            move || world.on_mine_finish(&peer_id, candidate),
        );
        if let Some(handle) = handle {
            let mut state = self.state.borrow_mut();
            if let Some(stale) = state.mining_events.insert(scheduled_for, handle) {
                stale.cancel();
            }
        }
    }

    fn on_mine_finish(&self, peer_id: &PeerId, candidate: Block) {
        use sim_chain::MineFinishOutcome;

        let now = self.scheduler.borrow().now();
        let mut state = self.state.borrow_mut();
        let attempt = sim_chain::MiningAttempt {
            candidate,
            delay_millis: 0.0,
        };
        let outcome = {
            let replica = state.replicas.get(peer_id).expect("known peer");
            replica.mine_finish(attempt)
        };

        match outcome {
            MineFinishOutcome::Stale => {
                trace!(%peer_id, "mining attempt went stale, restarting");
                drop(state);
                self.start_mining(peer_id);
            }
            MineFinishOutcome::Success(mut block) => {
                let reward_id = state.tx_ids.allocate(peer_id);
                block
                    .transactions
                    .push(Transaction::coinbase(reward_id, peer_id.clone(), COINBASE_REWARD, now));
                state.blocks_mined += 1;
                let done = state.blocks_mined > state.config.max_num_blocks;

                let next_id = state.block_ids.allocate(peer_id);
                let outcome = {
                    let replica = state.replicas.get_mut(peer_id).expect("known peer");
                    replica.mine_success(block, now, &mut state.rng, next_id)
                };
                info!(%peer_id, lead = ?selfish_lead(&state, peer_id), "mined a block");
                drop(state);

                for id in &outcome.publish {
                    self.broadcast_block(peer_id, *id, None);
                }
                if let Some(attempt) = outcome.remine {
                    self.schedule_mine_finish(peer_id.clone(), attempt.candidate, attempt.delay_millis);
                }
                if done {
                    let already_stopping = self.scheduler.borrow().is_soft_stopped();
                    self.scheduler.borrow_mut().request_soft_stop();
                    if !already_stopping {
                        self.flush_adversaries();
                    }
                }
            }
        }
    }

    /// Once the block quota is hit and soft-stop is requested, every
    /// adversary's still-withheld private branch must be settled onto the
    /// public chain rather than left to rot — otherwise an adversary that
    /// happened to be mid-lead when the run ended would have its work
    /// silently discarded from the final tally instead of counted.
    fn flush_adversaries(&self) {
        for peer_id in self.peer_ids() {
            let flushed = {
                let mut state = self.state.borrow_mut();
                state
                    .replicas
                    .get_mut(&peer_id)
                    .map(|r| r.flush_blocks())
                    .unwrap_or_default()
            };
            for id in flushed {
                self.broadcast_block(&peer_id, id, None);
            }
        }
    }

    /// Sends `id` from `peer_id` to every eligible neighbor (all
    /// neighbors but `from`, filtered by the selfish-forwarding policy).
    /// A block already forwarded once by this peer is dropped rather than
    /// re-sent.
    pub fn broadcast_block(&self, peer_id: &PeerId, id: BlockId, from: Option<PeerId>) {
        let mut state = self.state.borrow_mut();
        let is_first = {
            let block_owner_peer = state.peers.get_mut(peer_id).expect("known peer");
            block_owner_peer.first_sighting(MessageId::Block(id))
        };
        if !is_first {
            return;
        }
        let targets = {
            let block_owner_peer = state.peers.get_mut(peer_id).expect("known peer");
            block_owner_peer.forward_targets(MessageId::Block(id), from.as_ref(), true)
        };
        let block = state
            .replicas
            .get(peer_id)
            .and_then(|r| r.get_block(id))
            .cloned();
        drop(state);
        let Some(block) = block else { return };

        for target in targets {
            self.send_block(peer_id, &target, block.clone());
        }
    }

    fn send_block(&self, from: &PeerId, to: &PeerId, block: Block) {
        let world = self.clone();
        let (arrival, now) = {
            let mut state = self.state.borrow_mut();
            let now = self.scheduler.borrow().now();
            let slow = either_endpoint_slow(&state, from, to);
            (state.links.deliver_at(from, to, now, slow, &mut state.rng), now)
        };
        let delay = arrival - now;
        let from = from.clone();
        let to = to.clone();
        self.scheduler.borrow_mut().schedule(
            EventType::BlockReceive,
            now,
            delay,
            format!("{to} receives block {}", block.id),
            move || world.on_block_received(&to, block, &from),
        );
    }

    fn on_block_received(&self, peer_id: &PeerId, block: Block, from: &PeerId) {
        let now = self.scheduler.borrow().now();
        let mut state = self.state.borrow_mut();
        let next_id = state.block_ids.allocate(peer_id);
        let outcome = {
            let replica = state.replicas.get_mut(peer_id).expect("known peer");
            replica.receive_block(block, now, &mut state.rng, next_id)
        };
        drop(state);

        if !outcome.admitted {
            return;
        }
        for id in &outcome.publish {
            self.broadcast_block(peer_id, *id, Some(from.clone()));
        }
        if let Some(attempt) = outcome.remine {
            self.schedule_mine_finish(peer_id.clone(), attempt.candidate, attempt.delay_millis);
        }
    }

    pub fn on_transaction_created(&self, tx: Transaction, origin: PeerId) {
        let neighbors = {
            let state = self.state.borrow();
            state.peers.get(&origin).map(|p| p.neighbors.clone()).unwrap_or_default()
        };
        {
            let mut state = self.state.borrow_mut();
            if let Some(replica) = state.replicas.get_mut(&origin) {
                replica.add_transaction(tx.clone());
            }
        }
        for neighbor in neighbors {
            self.send_transaction(&origin, &neighbor, tx.clone());
        }
    }

    fn send_transaction(&self, from: &PeerId, to: &PeerId, tx: Transaction) {
        let world = self.clone();
        let (arrival, now) = {
            let mut state = self.state.borrow_mut();
            let now = self.scheduler.borrow().now();
            let slow = either_endpoint_slow(&state, from, to);
            (state.links.deliver_at(from, to, now, slow, &mut state.rng), now)
        };
        let delay = arrival - now;
        let from = from.clone();
        let to = to.clone();
        self.scheduler.borrow_mut().schedule(
            EventType::TxnReceive,
            now,
            delay,
            format!("{to} receives txn {}", tx.id),
            move || world.on_transaction_received(&to, tx, &from),
        );
    }

    /// A message already forwarded by this peer is dropped outright: not
    /// dispatched to the chain replica, not relayed onward. One gate
    /// covers both, since a transaction's mempool entry and its
    /// propagation are the same event arriving over and over on the
    /// 4-6-degree overlay's redundant paths.
    fn on_transaction_received(&self, peer_id: &PeerId, tx: Transaction, from: &PeerId) {
        let mut state = self.state.borrow_mut();
        let is_first = {
            let peer = state.peers.get_mut(peer_id).expect("known peer");
            peer.first_sighting(MessageId::Transaction(tx.id))
        };
        if !is_first {
            return;
        }
        if let Some(replica) = state.replicas.get_mut(peer_id) {
            replica.add_transaction(tx.clone());
        }
        let targets = {
            let peer = state.peers.get_mut(peer_id).expect("known peer");
            peer.forward_targets(MessageId::Transaction(tx.id), Some(from), true)
        };
        drop(state);
        for target in targets {
            self.send_transaction(peer_id, &target, tx.clone());
        }
    }

    /// Picks a random sender/recipient pair and an amount for the
    /// transaction workload generator.
    pub fn random_transfer(&self, origin: &PeerId) -> (TxId, PeerId, Coins) {
        let mut state = self.state.borrow_mut();
        let recipient = {
            let candidates = self.peer_ids_excluding(&state, origin);
            let idx = state.rng.gen_range(0..candidates.len());
            candidates[idx].clone()
        };
        let amount = Coins(state.rng.gen_range(1.0..50.0));
        let id = state.tx_ids.allocate(origin);
        (id, recipient, amount)
    }

    fn peer_ids_excluding(&self, state: &WorldState, origin: &PeerId) -> Vec<PeerId> {
        state
            .replicas
            .keys()
            .filter(|p| *p != origin)
            .cloned()
            .collect()
    }
}

/// A link is slow-tagged if either endpoint was sampled into `Z0`'s
/// slow-network share at overlay construction time.
fn either_endpoint_slow(state: &WorldState, from: &PeerId, to: &PeerId) -> bool {
    let from_slow = state.peers.get(from).map(|p| p.is_slow).unwrap_or(false);
    let to_slow = state.peers.get(to).map(|p| p.is_slow).unwrap_or(false);
    from_slow || to_slow
}

fn selfish_lead(state: &WorldState, peer_id: &PeerId) -> Option<u32> {
    match state.replicas.get(peer_id)?.mode() {
        sim_chain::ReplicaMode::Selfish(machine) => Some(machine.state().lead()),
        sim_chain::ReplicaMode::Honest => None,
    }
}
