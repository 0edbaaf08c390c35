//! Scenarios 2 and 3: two chain replicas, one selfish and one honest,
//! wired together by hand (no scheduler, no network) so block delivery
//! order is fully controlled. This is the level the selfish policy's
//! transition table can't be exercised at from a single replica's unit
//! tests: it takes a second, independent view of the chain to tell
//! whether a block the adversary published actually won the race on the
//! other side.

#[cfg(test)]
use shared_types::{Coins, PeerId, SimRng, VirtualTime};

#[cfg(test)]
use sim_chain::{AddBlockOutcome, Block, BlockId, BlockIdAllocator, ChainReplica};

#[cfg(test)]
struct Network {
    adversary: ChainReplica,
    honest: ChainReplica,
    blocks: BlockIdAllocator,
    rng: SimRng,
    now: VirtualTime,
}

#[cfg(test)]
impl Network {
    fn new(adversary_cpu: f64, honest_cpu: f64, seed: u64) -> Self {
        let adversary = ChainReplica::new(
            PeerId::new("S01"),
            vec![PeerId::new("h000")],
            adversary_cpu,
            1000.0,
            Coins(1000.0),
            true,
        );
        let honest = ChainReplica::new(
            PeerId::new("h000"),
            vec![PeerId::new("S01")],
            honest_cpu,
            1000.0,
            Coins(1000.0),
            false,
        );
        Self {
            adversary,
            honest,
            blocks: BlockIdAllocator::new(),
            rng: shared_types::rng::seeded_rng(seed),
            now: VirtualTime::ZERO,
        }
    }

    fn tick(&mut self) -> VirtualTime {
        self.now = self.now + VirtualTime::from_millis(1.0);
        self.now
    }

    /// The adversary mines one more block on its own secret tip, kept
    /// private by construction.
    fn adversary_mines(&mut self) -> (BlockId, Block, AddBlockOutcome) {
        let now = self.tick();
        let id = self.blocks.allocate(self.adversary.owner());
        let attempt = self.adversary.generate_block(now, &mut self.rng, id);
        let mined = attempt.candidate.clone();
        let next = self.blocks.allocate(self.adversary.owner());
        let outcome = self.adversary.mine_success(attempt.candidate, now, &mut self.rng, next);
        (id, mined, outcome)
    }

    /// The honest replica mines one more block on the public tip it knows
    /// about.
    fn honest_mines(&mut self) -> (BlockId, Block, AddBlockOutcome) {
        let now = self.tick();
        let id = self.blocks.allocate(self.honest.owner());
        let attempt = self.honest.generate_block(now, &mut self.rng, id);
        let mined = attempt.candidate.clone();
        let next = self.blocks.allocate(self.honest.owner());
        let outcome = self.honest.mine_success(attempt.candidate, now, &mut self.rng, next);
        (id, mined, outcome)
    }

    fn deliver_to_adversary(&mut self, block: Block) -> AddBlockOutcome {
        let next = self.blocks.allocate(self.adversary.owner());
        self.adversary.receive_block(block, self.now, &mut self.rng, next)
    }

    fn deliver_to_honest(&mut self, block: Block) -> AddBlockOutcome {
        let next = self.blocks.allocate(self.honest.owner());
        self.honest.receive_block(block, self.now, &mut self.rng, next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selfish_lead_two_publishes_both_blocks_and_wins_the_race() {
        let mut net = Network::new(0.4, 0.6, 1);

        let (a1_id, _a1, _) = net.adversary_mines();
        let (a2_id, _a2, _) = net.adversary_mines();
        assert_eq!(net.adversary.longest_public_length(), 1, "both blocks stay private");

        let (_h1_id, h1, _) = net.honest_mines();
        assert_eq!(net.honest.longest_public_length(), 2);

        // The adversary hears about the honest block: lead was 2, the
        // public tip just grew to match one of the two private blocks, so
        // lead is now 1 — state Two publishes both at once.
        let outcome = net.deliver_to_adversary(h1);
        assert_eq!(outcome.publish, vec![a1_id, a2_id]);

        // Propagate the adversary's two blocks, now flipped public by the
        // publish above, to the honest replica: its own one-block branch
        // loses the race.
        let a1_public = net.adversary.get_block(a1_id).cloned().unwrap();
        let a2_public = net.adversary.get_block(a2_id).cloned().unwrap();
        net.deliver_to_honest(a1_public);
        net.deliver_to_honest(a2_public);
        assert_eq!(net.honest.longest_public_length(), 3);
        assert_eq!(net.honest.longest_public_leaf(), a2_id);
    }

    #[test]
    fn a_two_block_public_jump_drops_the_lead_below_zero_and_discards_the_private_branch() {
        let mut net = Network::new(0.2, 0.8, 2);

        let (a1_id, _a1, _) = net.adversary_mines();
        assert_eq!(net.adversary.longest_public_length(), 1, "stays private, lead 1");

        let (_h1_id, h1, _) = net.honest_mines();
        let (_h2_id, h2, _) = net.honest_mines();

        // H2 arrives before its parent H1: buffered as an orphan, nothing
        // admitted yet.
        let outcome = net.deliver_to_adversary(h2);
        assert!(!outcome.admitted);

        // H1 arrives: admitting it also recovers H2 in the same turn, so
        // the public tip jumps by two blocks in one admission and the
        // lead goes straight from 1 to -1.
        let outcome = net.deliver_to_adversary(h1);
        assert!(outcome.admitted);
        assert_eq!(outcome.recovered_orphans.len(), 2);
        assert!(outcome.publish.is_empty(), "a discarded branch is never published");

        assert_eq!(net.adversary.longest_public_length(), 3);
        assert_ne!(net.adversary.longest_public_leaf(), a1_id);
        if let sim_chain::ReplicaMode::Selfish(machine) = net.adversary.mode() {
            assert_eq!(machine.state(), sim_chain::SelfishState::Zero);
            assert_eq!(machine.secret_leaf(), net.adversary.longest_public_leaf());
            assert!(machine.secret_blocks().next().is_none());
        } else {
            panic!("adversary replica must run the selfish policy");
        }
    }
}
