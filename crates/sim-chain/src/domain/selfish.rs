//! The selfish-mining policy: a private branch withheld from the network
//! and released strategically to keep the attacker's lead over the public
//! chain while it remains profitable to do so.
//!
//! The original simulator tracked this as a single numeric "state" that
//! took the values `0`, `0.5`, `1`, `2`, or an integer lead count — the
//! `0.5` value existed purely to distinguish the post-publish race from
//! state `0` proper, which is exactly the kind of float-as-enum encoding
//! that invites an equality bug the moment another float creeps in. Here
//! the same five situations are five named variants instead.
//!
//! Every admitted block — whether mined locally or received from the
//! network — runs through the same dispatch, [`SelfishMachine::on_block_admitted`],
//! matching the original's `_update_lead`: it always checks the lead
//! first (a lead that went negative discards the whole private branch,
//! regardless of prior state) and only then falls into the per-state
//! transition.

use super::block::BlockId;
use std::collections::VecDeque;

/// Where the attacker's private branch stands relative to the public
/// chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SelfishState {
    /// No private lead; the secret branch is empty (or just adopted the
    /// public tip).
    Zero,
    /// Just published a single block to tie the public chain after
    /// holding a one-block lead; racing to extend it before anyone else
    /// does.
    ZeroPrime,
    /// One block ahead, fully withheld.
    One,
    /// Two blocks ahead, fully withheld.
    Two,
    /// `n` blocks ahead (`n >= 3`), fully withheld.
    Lead(u32),
}

impl SelfishState {
    /// The current lead as a plain count, for logging and for the mpu
    /// calculations in the driver crate.
    pub fn lead(self) -> u32 {
        match self {
            SelfishState::Zero | SelfishState::ZeroPrime => 0,
            SelfishState::One => 1,
            SelfishState::Two => 2,
            SelfishState::Lead(n) => n,
        }
    }

    fn at_lead(n: u32) -> SelfishState {
        match n {
            0 => SelfishState::Zero,
            1 => SelfishState::One,
            2 => SelfishState::Two,
            n => SelfishState::Lead(n),
        }
    }
}

/// What the caller should do after a selfish-policy transition.
#[derive(Debug, Clone, Default)]
pub struct SelfishAction {
    /// Blocks to move from the secret branch onto the public one, oldest
    /// first.
    pub publish: Vec<BlockId>,
    /// Blocks to drop entirely: a private branch that fell behind the
    /// public chain is abandoned, not published.
    pub discard: Vec<BlockId>,
}

/// The attacker's private branch and its position in the state machine.
///
/// `secret_blocks` is a contiguous run of withheld blocks ending at
/// `secret_leaf`; publishing and discarding always act on the front (or
/// all) of it, so a `VecDeque` avoids the `Vec::remove(0)` shuffle.
#[derive(Debug, Clone)]
pub struct SelfishMachine {
    state: SelfishState,
    secret_blocks: VecDeque<BlockId>,
    secret_leaf: BlockId,
}

impl SelfishMachine {
    pub fn new(genesis: BlockId) -> Self {
        Self {
            state: SelfishState::Zero,
            secret_blocks: VecDeque::new(),
            secret_leaf: genesis,
        }
    }

    pub fn state(&self) -> SelfishState {
        self.state
    }

    pub fn secret_leaf(&self) -> BlockId {
        self.secret_leaf
    }

    pub fn secret_blocks(&self) -> impl Iterator<Item = &BlockId> {
        self.secret_blocks.iter()
    }

    /// The replica admitted its own mining attempt: the new block always
    /// extends the secret tip, whatever state the machine was in. Called
    /// before [`Self::on_block_admitted`], matching the original's
    /// `_mine_success_handler`, which appends to `secret_blocks` before
    /// `_update_lead` ever runs.
    pub fn record_self_mined(&mut self, new_block: BlockId) {
        self.secret_blocks.push_back(new_block);
        self.secret_leaf = new_block;
    }

    /// Publishes every withheld block unconditionally and resets to the
    /// empty-lead state. Used when a run is ending and the attacker's
    /// remaining private branch must be settled rather than sit
    /// forfeited forever.
    pub fn flush(&mut self) -> Vec<BlockId> {
        let ids = self.secret_blocks.drain(..).collect();
        self.state = SelfishState::Zero;
        ids
    }

    /// Runs the full selfish-mining transition table against whichever
    /// block was just admitted (self-mined or received), given the
    /// freshly recomputed `lead` (`branch_length(secret_leaf) -
    /// branch_length(public_leaf)`, all of it already reflecting this
    /// admission).
    pub fn on_block_admitted(
        &mut self,
        new_block: BlockId,
        mined_by_self: bool,
        public_leaf: BlockId,
        lead: i64,
    ) -> SelfishAction {
        if lead < 0 {
            let discard = self.secret_blocks.drain(..).collect();
            self.secret_leaf = public_leaf;
            self.state = SelfishState::Zero;
            return SelfishAction {
                publish: Vec::new(),
                discard,
            };
        }

        match self.state {
            SelfishState::Zero => {
                self.secret_leaf = new_block;
                self.state = if mined_by_self {
                    SelfishState::One
                } else {
                    SelfishState::Zero
                };
                SelfishAction::default()
            }
            SelfishState::ZeroPrime if mined_by_self => {
                let released = self
                    .secret_blocks
                    .pop_front()
                    .expect("mining a block at 0' always pushed exactly one onto secret_blocks");
                self.secret_leaf = released;
                self.state = SelfishState::Zero;
                SelfishAction {
                    publish: vec![released],
                    discard: Vec::new(),
                }
            }
            SelfishState::ZeroPrime => {
                self.secret_leaf = new_block;
                self.state = SelfishState::Zero;
                SelfishAction::default()
            }
            SelfishState::One if !mined_by_self && lead == 0 => {
                let published = self.secret_blocks.drain(..).collect();
                self.state = SelfishState::ZeroPrime;
                SelfishAction {
                    publish: published,
                    discard: Vec::new(),
                }
            }
            SelfishState::Two if !mined_by_self && lead == 1 => {
                let published = self.secret_blocks.drain(..).collect();
                self.state = SelfishState::Zero;
                SelfishAction {
                    publish: published,
                    discard: Vec::new(),
                }
            }
            state if state.lead() >= 3 => {
                if mined_by_self {
                    self.state = SelfishState::at_lead(state.lead() + 1);
                    SelfishAction::default()
                } else {
                    let released = self
                        .secret_blocks
                        .pop_front()
                        .expect("lead >= 3 implies a withheld block exists");
                    self.state = SelfishState::at_lead(state.lead() - 1);
                    SelfishAction {
                        publish: vec![released],
                        discard: Vec::new(),
                    }
                }
            }
            _ => {
                // Any (state, lead, mined_by_self) combination the
                // explicit rows above don't cover — e.g. a batch of
                // recovered orphans moving the public tip by more than
                // one block at once. The state machine is total: fall
                // back to the lead itself.
                self.state = SelfishState::at_lead(lead as u32);
                SelfishAction::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mined(seq: u64) -> BlockId {
        BlockId::Mined {
            miner_index: 0,
            seq,
        }
    }

    fn self_mine(m: &mut SelfishMachine, id: BlockId, public_leaf: BlockId, lead: i64) -> SelfishAction {
        m.record_self_mined(id);
        m.on_block_admitted(id, true, public_leaf, lead)
    }

    #[test]
    fn mining_from_zero_goes_to_one() {
        let mut m = SelfishMachine::new(BlockId::Genesis);
        self_mine(&mut m, mined(0), BlockId::Genesis, 1);
        assert_eq!(m.state(), SelfishState::One);
        assert_eq!(m.secret_leaf(), mined(0));
    }

    #[test]
    fn public_catch_up_from_one_publishes_and_races() {
        let mut m = SelfishMachine::new(BlockId::Genesis);
        self_mine(&mut m, mined(0), BlockId::Genesis, 1);
        let action = m.on_block_admitted(mined(99), false, mined(99), 0);
        assert_eq!(m.state(), SelfishState::ZeroPrime);
        assert_eq!(action.publish, vec![mined(0)]);
        assert!(m.secret_blocks().next().is_none());
    }

    #[test]
    fn winning_the_race_publishes_and_returns_to_zero() {
        let mut m = SelfishMachine::new(BlockId::Genesis);
        self_mine(&mut m, mined(0), BlockId::Genesis, 1);
        m.on_block_admitted(mined(99), false, mined(99), 0);
        let action = self_mine(&mut m, mined(1), mined(99), 1);
        assert_eq!(m.state(), SelfishState::Zero);
        assert_eq!(action.publish, vec![mined(1)]);
    }

    #[test]
    fn losing_the_race_returns_to_zero_with_nothing_published() {
        let mut m = SelfishMachine::new(BlockId::Genesis);
        self_mine(&mut m, mined(0), BlockId::Genesis, 1);
        m.on_block_admitted(mined(99), false, mined(99), 0);
        let action = m.on_block_admitted(mined(100), false, mined(100), -1);
        assert_eq!(m.state(), SelfishState::Zero);
        assert!(action.publish.is_empty());
    }

    #[test]
    fn lead_two_publishes_both_blocks_at_once() {
        let mut m = SelfishMachine::new(BlockId::Genesis);
        self_mine(&mut m, mined(0), BlockId::Genesis, 1);
        self_mine(&mut m, mined(1), BlockId::Genesis, 2);
        assert_eq!(m.state(), SelfishState::Two);

        let action = m.on_block_admitted(mined(200), false, mined(200), 1);
        assert_eq!(m.state(), SelfishState::Zero);
        assert_eq!(action.publish, vec![mined(0), mined(1)]);
        assert!(m.secret_blocks().next().is_none());
    }

    #[test]
    fn big_lead_releases_one_block_at_a_time() {
        let mut m = SelfishMachine::new(BlockId::Genesis);
        self_mine(&mut m, mined(0), BlockId::Genesis, 1);
        self_mine(&mut m, mined(1), BlockId::Genesis, 2);
        self_mine(&mut m, mined(2), BlockId::Genesis, 3);
        assert_eq!(m.state(), SelfishState::Lead(3));

        let a1 = m.on_block_admitted(mined(200), false, mined(200), 2);
        assert_eq!(m.state(), SelfishState::Two);
        assert_eq!(a1.publish, vec![mined(0)]);

        let a2 = m.on_block_admitted(mined(201), false, mined(201), 1);
        assert_eq!(a2.publish, vec![mined(1)]);
        assert_eq!(m.state(), SelfishState::One);
    }

    #[test]
    fn lead_survives_many_self_blocks() {
        let mut m = SelfishMachine::new(BlockId::Genesis);
        for i in 0..5 {
            self_mine(&mut m, mined(i), BlockId::Genesis, i as i64 + 1);
        }
        assert_eq!(m.state().lead(), 5);
    }

    #[test]
    fn negative_lead_discards_the_whole_private_branch() {
        let mut m = SelfishMachine::new(BlockId::Genesis);
        self_mine(&mut m, mined(0), BlockId::Genesis, 1);
        let action = m.on_block_admitted(mined(50), false, mined(50), -1);
        assert_eq!(m.state(), SelfishState::Zero);
        assert_eq!(action.discard, vec![mined(0)]);
        assert_eq!(m.secret_leaf(), mined(50));
        assert!(m.secret_blocks().next().is_none());
    }

    #[test]
    fn negative_lead_overrides_any_prior_state() {
        let mut m = SelfishMachine::new(BlockId::Genesis);
        self_mine(&mut m, mined(0), BlockId::Genesis, 1);
        self_mine(&mut m, mined(1), BlockId::Genesis, 2);
        self_mine(&mut m, mined(2), BlockId::Genesis, 3);
        let action = m.on_block_admitted(mined(300), false, mined(300), -2);
        assert_eq!(m.state(), SelfishState::Zero);
        assert_eq!(action.discard.len(), 3);
    }
}
