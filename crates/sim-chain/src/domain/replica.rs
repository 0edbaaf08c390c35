//! The chain replica: one peer's local view of the block tree, its
//! pending transaction pool, and the honest/selfish policy that decides
//! what to mine on and when to publish.

use super::block::{self, Block, BlockId};
use super::outcome::{AddBlockOutcome, MineFinishOutcome, MiningAttempt};
use super::selfish::SelfishMachine;
use super::transaction::{Transaction, TxId};
use crate::error::ChainError;
use shared_types::{Coins, PeerId, SimRng, VirtualTime};
use std::collections::{HashMap, HashSet};

/// Which strategy this replica's owner is running. Modeled as a tagged
/// variant rather than a trait object: the two strategies share almost
/// all of their bookkeeping (the block tree, validation, branch walks)
/// and differ only in how they react to a newly admitted block, so a
/// `match` on a plain enum reads more plainly here than a vtable would.
#[derive(Debug, Clone)]
pub enum ReplicaMode {
    Honest,
    Selfish(SelfishMachine),
}

impl ReplicaMode {
    pub fn is_selfish(&self) -> bool {
        matches!(self, ReplicaMode::Selfish(_))
    }
}

/// A single peer's replica of the chain: the block tree it has validated,
/// the transactions it's heard about but not yet mined, and the mining
/// policy driving what it works on next.
#[derive(Debug, Clone)]
pub struct ChainReplica {
    owner: PeerId,
    known_peers: Vec<PeerId>,
    cpu_power: f64,
    avg_block_mining_time: f64,
    initial_balance: Coins,

    blocks: HashMap<BlockId, Block>,
    arrival_time: HashMap<BlockId, VirtualTime>,
    fingerprints: HashMap<BlockId, String>,
    mempool: Vec<Transaction>,
    orphan_buffer: Vec<Block>,

    longest_leaf: BlockId,
    longest_length: u64,
    current_parent: BlockId,

    mode: ReplicaMode,
}

impl ChainReplica {
    pub fn new(
        owner: PeerId,
        known_peers: Vec<PeerId>,
        cpu_power: f64,
        avg_block_mining_time: f64,
        initial_balance: Coins,
        selfish: bool,
    ) -> Self {
        let mut blocks = HashMap::new();
        blocks.insert(BlockId::Genesis, Block::genesis());
        let mut arrival_time = HashMap::new();
        arrival_time.insert(BlockId::Genesis, VirtualTime::ZERO);
        let mut fingerprints = HashMap::new();
        fingerprints.insert(BlockId::Genesis, block::genesis_fingerprint());

        Self {
            owner,
            known_peers,
            cpu_power,
            avg_block_mining_time,
            initial_balance,
            blocks,
            arrival_time,
            fingerprints,
            mempool: Vec::new(),
            orphan_buffer: Vec::new(),
            longest_leaf: BlockId::Genesis,
            longest_length: 1,
            current_parent: BlockId::Genesis,
            mode: if selfish {
                ReplicaMode::Selfish(SelfishMachine::new(BlockId::Genesis))
            } else {
                ReplicaMode::Honest
            },
        }
    }

    pub fn owner(&self) -> &PeerId {
        &self.owner
    }

    pub fn mode(&self) -> &ReplicaMode {
        &self.mode
    }

    pub fn cpu_power(&self) -> f64 {
        self.cpu_power
    }

    /// The block this replica is presently mining against: the public
    /// longest-chain tip for an honest replica, the secret branch tip for
    /// a selfish one.
    pub fn current_parent(&self) -> BlockId {
        self.current_parent
    }

    pub fn longest_public_leaf(&self) -> BlockId {
        self.longest_leaf
    }

    pub fn longest_public_length(&self) -> u64 {
        self.longest_length
    }

    pub fn get_block(&self, id: BlockId) -> Option<&Block> {
        self.blocks.get(&id)
    }

    pub fn get_blocks(&self) -> impl Iterator<Item = &Block> {
        self.blocks.values()
    }

    pub fn arrival_time_of(&self, id: BlockId) -> Option<VirtualTime> {
        self.arrival_time.get(&id).copied()
    }

    pub fn fingerprint_of(&self, id: BlockId) -> Option<&str> {
        self.fingerprints.get(&id).map(String::as_str)
    }

    pub fn add_transaction(&mut self, tx: Transaction) {
        self.mempool.push(tx);
    }

    pub fn pending_transaction_count(&self) -> usize {
        self.mempool.len()
    }

    // ---- branch walks -----------------------------------------------

    /// Number of blocks from genesis to `id` inclusive, or 0 if `id` isn't
    /// part of this replica's known block set.
    pub fn branch_length(&self, id: BlockId) -> u64 {
        self.walk_ancestors(id).count() as u64
    }

    /// Every peer's coin balance after replaying the branch ending at
    /// `id`, seeded from each known peer's starting balance.
    pub fn branch_balance(&self, id: BlockId) -> HashMap<PeerId, Coins> {
        let mut balances: HashMap<PeerId, Coins> = self
            .known_peers
            .iter()
            .cloned()
            .chain(std::iter::once(self.owner.clone()))
            .map(|p| (p, self.initial_balance))
            .collect();

        let chain: Vec<&Block> = self.walk_ancestors(id).collect();
        for block in chain.into_iter().rev() {
            for tx in &block.transactions {
                if let Some(sender) = &tx.sender {
                    let entry = balances.entry(sender.clone()).or_insert(Coins::ZERO);
                    *entry = *entry - tx.amount;
                }
                let entry = balances
                    .entry(tx.recipient.clone())
                    .or_insert(Coins::ZERO);
                *entry = *entry + tx.amount;
            }
        }
        balances
    }

    /// Every non-coinbase transaction id along the branch from genesis to
    /// `id`. A coinbase reward is synthesized fresh at every mine-success
    /// and is never subject to the "at most once per branch" rule, so it's
    /// excluded here.
    pub fn branch_transactions(&self, id: BlockId) -> HashSet<TxId> {
        self.walk_ancestors(id)
            .flat_map(|block| &block.transactions)
            .filter(|tx| !tx.is_coinbase())
            .map(|tx| tx.id)
            .collect()
    }

    /// The full chain from genesis to `id`, genesis first. Used by
    /// reporting code that needs to attribute each block to its miner
    /// rather than just count blocks.
    pub fn chain_to(&self, id: BlockId) -> Vec<&Block> {
        let mut chain: Vec<&Block> = self.walk_ancestors(id).collect();
        chain.reverse();
        chain
    }

    /// Walks `id` back to genesis, nearest block first.
    fn walk_ancestors(&self, id: BlockId) -> impl Iterator<Item = &Block> {
        std::iter::successors(self.blocks.get(&id), |block| {
            block.parent.and_then(|p| self.blocks.get(&p))
        })
    }

    // ---- validation ---------------------------------------------------

    /// Checks `tx` against a single balance snapshot (the running tally a
    /// caller is threading through a multi-transaction block, or a fresh
    /// [`Self::branch_balance`] for a one-off check). Coinbase
    /// transactions always pass: they mint a reward rather than spend one.
    fn validate_transaction(&self, tx: &Transaction, balances: &HashMap<PeerId, Coins>) -> bool {
        let Some(sender) = &tx.sender else {
            return true; // coinbase
        };
        let balance = balances.get(sender).copied().unwrap_or(Coins::ZERO);
        !(balance - tx.amount).is_negative()
    }

    /// Checks that `block`'s parent is known and every transaction in it
    /// is valid against the branch it extends. Buffers the block as an
    /// orphan (and returns `UnknownParent`) when the parent hasn't
    /// arrived yet, so a later call to [`Self::recover_orphans`] can
    /// retry it.
    pub fn validate_block(&mut self, block: Block) -> Result<Block, ChainError> {
        if self.blocks.contains_key(&block.id) {
            return Err(ChainError::DuplicateBlock);
        }
        let Some(parent) = block.parent else {
            return Err(ChainError::MissingParent); // only genesis has no parent
        };
        if !self.blocks.contains_key(&parent) {
            self.orphan_buffer.push(block);
            return Err(ChainError::UnknownParent);
        }

        let mut running = self.branch_balance(parent);
        let mut seen = self.branch_transactions(parent);
        for tx in &block.transactions {
            if !tx.is_coinbase() {
                if seen.contains(&tx.id) {
                    return Err(ChainError::DuplicateTransaction);
                }
                seen.insert(tx.id);
            }
            if let Some(sender) = &tx.sender {
                if !self.validate_transaction(tx, &running) {
                    return Err(ChainError::InsufficientBalance {
                        sender: sender.clone(),
                        recipient: tx.recipient.clone(),
                    });
                }
                let entry = running.entry(sender.clone()).or_insert(Coins::ZERO);
                *entry = *entry - tx.amount;
            }
            let entry = running.entry(tx.recipient.clone()).or_insert(Coins::ZERO);
            *entry = *entry + tx.amount;
        }
        Ok(block)
    }

    // ---- admission ------------------------------------------------------

    /// Inserts an already-validated block, drops its transactions from
    /// the mempool, and tries to recover any orphans that were waiting on
    /// it. Updates the public longest-chain bookkeeping unconditionally —
    /// callers decide separately whether that change should move
    /// `current_parent`.
    fn admit(&mut self, block: Block, now: VirtualTime) -> Vec<BlockId> {
        let id = self.insert_block(block, now);
        let mut recovered = vec![id];
        recovered.extend(self.recover_orphans(now));
        recovered
    }

    fn insert_block(&mut self, block: Block, now: VirtualTime) -> BlockId {
        let id = block.id;
        let mined_ids: Vec<_> = block.transactions.iter().map(|t| t.id).collect();
        self.mempool.retain(|tx| !mined_ids.contains(&tx.id));

        let length = self.branch_length_of_inserted(&block);
        let parent_fingerprint = block.parent.and_then(|p| self.fingerprints.get(&p).cloned());
        let fingerprint =
            block::fingerprint_of(id, parent_fingerprint.as_deref(), block.created_at, &mined_ids);
        let is_private = block.is_private;
        self.blocks.insert(id, block);
        self.arrival_time.insert(id, now);
        self.fingerprints.insert(id, fingerprint);

        // A private block is withheld from the rest of the network; it
        // must never move the tip this replica reports as public until
        // the selfish policy actually publishes it (see `publish_block`).
        if !is_private {
            self.consider_public_tip(id, length);
        }
        id
    }

    fn consider_public_tip(&mut self, id: BlockId, length: u64) {
        if length > self.longest_length {
            self.longest_length = length;
            self.longest_leaf = id;
        }
    }

    /// Flips a previously private block's flag and lets it compete for
    /// the public tip, now that the selfish policy has decided to
    /// release it.
    fn publish_block(&mut self, id: BlockId) {
        if let Some(block) = self.blocks.get_mut(&id) {
            block.is_private = false;
        }
        let length = self.branch_length(id);
        self.consider_public_tip(id, length);
    }

    /// Drops a block the selfish policy abandoned (its branch fell
    /// behind the public chain) out of local storage entirely.
    fn discard_block(&mut self, id: BlockId) {
        self.blocks.remove(&id);
        self.arrival_time.remove(&id);
    }

    fn apply_selfish_action(&mut self, action: super::selfish::SelfishAction) -> Vec<BlockId> {
        for id in &action.discard {
            self.discard_block(*id);
        }
        for id in &action.publish {
            self.publish_block(*id);
        }
        action.publish
    }

    fn branch_length_of_inserted(&self, block: &Block) -> u64 {
        match block.parent {
            None => 1,
            Some(parent) => self.branch_length(parent) + 1,
        }
    }

    /// Repeatedly scans the orphan buffer for blocks whose parent has
    /// since arrived, admitting them and reconsidering the public tip
    /// each time, until a full pass admits nothing new.
    pub fn recover_orphans(&mut self, now: VirtualTime) -> Vec<BlockId> {
        let mut recovered = Vec::new();
        loop {
            let pending = std::mem::take(&mut self.orphan_buffer);
            if pending.is_empty() {
                break;
            }
            let mut made_progress = false;
            for block in pending {
                match self.validate_block(block) {
                    Ok(valid) => {
                        made_progress = true;
                        recovered.push(self.insert_block(valid, now));
                    }
                    Err(ChainError::UnknownParent) => {
                        // re-buffered by validate_block
                    }
                    Err(_) => {
                        // permanently invalid; drop it
                    }
                }
            }
            if !made_progress {
                break;
            }
        }
        recovered
    }

    /// Final end-of-run sweep over whatever never got resolved, applied
    /// in arrival order so the outcome doesn't depend on buffer order.
    pub fn panic_validate(&mut self, now: VirtualTime) {
        self.orphan_buffer
            .sort_by(|a, b| a.created_at.cmp(&b.created_at));
        self.recover_orphans(now);
    }

    /// A network block arrives. Dispatches to the honest or selfish
    /// reaction and, when the admission changes what this replica should
    /// be mining on, hands back a fresh [`MiningAttempt`] for the caller
    /// to schedule in place of whatever mining event is in flight.
    pub fn receive_block(
        &mut self,
        block: Block,
        now: VirtualTime,
        rng: &mut SimRng,
        next_id: BlockId,
    ) -> AddBlockOutcome {
        let block = match self.validate_block(block) {
            Ok(block) => block,
            Err(_) => return AddBlockOutcome::rejected(),
        };
        let id = block.id;
        let previous_parent = self.current_parent;
        let recovered = self.admit(block, now);

        if !self.mode.is_selfish() {
            self.current_parent = self.longest_leaf;
            let rebased = self.current_parent != previous_parent;
            return AddBlockOutcome {
                admitted: true,
                publish: vec![id],
                remine: rebased.then(|| self.generate_block(now, rng, next_id)),
                recovered_orphans: recovered,
            };
        }

        let action = self.dispatch_selfish(id, false);
        let published = self.apply_selfish_action(action);
        self.current_parent = self.secret_leaf();
        let rebased = self.current_parent != previous_parent;
        AddBlockOutcome {
            admitted: true,
            publish: published,
            remine: rebased.then(|| self.generate_block(now, rng, next_id)),
            recovered_orphans: recovered,
        }
    }

    fn secret_leaf(&self) -> BlockId {
        match &self.mode {
            ReplicaMode::Selfish(machine) => machine.secret_leaf(),
            ReplicaMode::Honest => self.longest_leaf,
        }
    }

    /// Recomputes the current lead and runs it through the selfish
    /// policy's transition table. Only valid to call in `Selfish` mode.
    fn dispatch_selfish(
        &mut self,
        new_block: BlockId,
        mined_by_self: bool,
    ) -> super::selfish::SelfishAction {
        let secret_leaf = self.secret_leaf();
        let lead = self.branch_length(secret_leaf) as i64 - self.longest_length as i64;
        let public_leaf = self.longest_leaf;
        match &mut self.mode {
            ReplicaMode::Selfish(machine) => {
                machine.on_block_admitted(new_block, mined_by_self, public_leaf, lead)
            }
            ReplicaMode::Honest => unreachable!("dispatch_selfish requires Selfish mode"),
        }
    }

    // ---- mining lifecycle ----------------------------------------------

    /// Starts a new mining attempt on the current tip, selecting the
    /// stably-sorted, balance-valid prefix of the pending pool as the
    /// candidate's transactions.
    pub fn generate_block(
        &mut self,
        now: VirtualTime,
        rng: &mut SimRng,
        id: BlockId,
    ) -> MiningAttempt {
        let mut candidates = self.mempool.clone();
        candidates.sort_by(|a, b| a.created_at.cmp(&b.created_at));

        let mut running = self.branch_balance(self.current_parent);
        let mut already_on_branch = self.branch_transactions(self.current_parent);
        let mut selected = Vec::new();
        for tx in candidates {
            // A rebase onto a different branch than the one that last
            // pruned the mempool can leave a transaction pending here even
            // though the new parent's branch already carries it (two
            // competing miners both picked the same pending transfer).
            if already_on_branch.contains(&tx.id) {
                continue;
            }
            if !self.validate_transaction(&tx, &running) {
                continue;
            }
            already_on_branch.insert(tx.id);
            if let Some(sender) = &tx.sender {
                let entry = running.entry(sender.clone()).or_insert(Coins::ZERO);
                *entry = *entry - tx.amount;
            }
            let entry = running
                .entry(tx.recipient.clone())
                .or_insert(Coins::ZERO);
            *entry = *entry + tx.amount;
            selected.push(tx);
        }

        let candidate = Block::new(
            id,
            self.current_parent,
            selected,
            now,
            self.owner.clone(),
            self.mode.is_selfish(),
        );
        let mean = if self.cpu_power <= 0.0 {
            0.0
        } else {
            self.avg_block_mining_time / self.cpu_power
        };
        let delay_millis = shared_types::exponential(rng, mean);
        MiningAttempt {
            candidate,
            delay_millis,
        }
    }

    /// A `MineFinish` event landed. Succeeds only if the attempt's parent
    /// is still what this replica is mining against — otherwise the
    /// attempt is stale and must be discarded without admission.
    pub fn mine_finish(&self, attempt: MiningAttempt) -> MineFinishOutcome {
        if attempt.candidate.parent == Some(self.current_parent) {
            MineFinishOutcome::Success(attempt.candidate)
        } else {
            MineFinishOutcome::Stale
        }
    }

    /// Admits a block this replica mined itself, with its coinbase reward
    /// already appended by the caller.
    pub fn mine_success(
        &mut self,
        block: Block,
        now: VirtualTime,
        rng: &mut SimRng,
        next_id: BlockId,
    ) -> AddBlockOutcome {
        let id = block.id;
        let recovered = self.admit(block, now);

        if !self.mode.is_selfish() {
            self.current_parent = self.longest_leaf;
            return AddBlockOutcome {
                admitted: true,
                publish: vec![id],
                remine: Some(self.generate_block(now, rng, next_id)),
                recovered_orphans: recovered,
            };
        }

        if let ReplicaMode::Selfish(machine) = &mut self.mode {
            machine.record_self_mined(id);
        }
        let action = self.dispatch_selfish(id, true);
        let published = self.apply_selfish_action(action);
        self.current_parent = self.secret_leaf();
        AddBlockOutcome {
            admitted: true,
            publish: published,
            remine: Some(self.generate_block(now, rng, next_id)),
            recovered_orphans: recovered,
        }
    }

    /// Publishes every block this replica is still withholding (a
    /// no-op in `Honest` mode), clearing the policy's privacy state.
    /// Used when the run is winding down and private blocks would
    /// otherwise never be counted on the public chain.
    pub fn flush_blocks(&mut self) -> Vec<BlockId> {
        let ids = match &mut self.mode {
            ReplicaMode::Honest => return Vec::new(),
            ReplicaMode::Selfish(machine) => machine.flush(),
        };
        for id in &ids {
            self.publish_block(*id);
        }
        self.current_parent = self.longest_leaf;
        ids
    }

    /// The longer of the public chain and this replica's own secret
    /// branch (ties favor the public chain), genesis first. For an
    /// honest replica this is always just the public chain.
    pub fn get_longest_chain(&self) -> Vec<&Block> {
        match &self.mode {
            ReplicaMode::Honest => self.chain_to(self.longest_leaf),
            ReplicaMode::Selfish(machine) => {
                let secret_leaf = machine.secret_leaf();
                if self.branch_length(secret_leaf) > self.longest_length {
                    self.chain_to(secret_leaf)
                } else {
                    self.chain_to(self.longest_leaf)
                }
            }
        }
    }
}
