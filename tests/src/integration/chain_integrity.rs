//! Block-tree invariants exercised across a whole admission sequence
//! rather than a single call: orphans arriving out of order, and a
//! double-spend caught before it ever reaches any chain.

#[cfg(test)]
use shared_types::{Coins, PeerId, VirtualTime};

#[cfg(test)]
use sim_chain::{Block, BlockId, BlockIdAllocator, ChainReplica, Transaction, TxIdAllocator};

#[cfg(test)]
fn honest_replica(owner: &str, peers: &[&str]) -> ChainReplica {
    ChainReplica::new(
        PeerId::new(owner),
        peers.iter().map(|p| PeerId::new(*p)).collect(),
        1.0,
        1000.0,
        Coins(100.0),
        false,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_order_blocks_are_buffered_and_recovered_together() {
        let mut replica = honest_replica("h000", &["h001"]);
        let mut alloc = BlockIdAllocator::new();
        let miner = PeerId::new("h001");
        let mut rng = shared_types::rng::seeded_rng(7);

        let b1_id = alloc.allocate(&miner);
        let b1 = Block::new(
            b1_id,
            BlockId::Genesis,
            Vec::new(),
            VirtualTime::from_millis(1.0),
            miner.clone(),
            false,
        );
        let b2_id = alloc.allocate(&miner);
        let b2 = Block::new(
            b2_id,
            b1_id,
            Vec::new(),
            VirtualTime::from_millis(2.0),
            miner.clone(),
            false,
        );

        // B2 arrives first: its parent is unknown, so it's buffered, not admitted.
        let next = alloc.allocate(&PeerId::new("h000"));
        let outcome = replica.receive_block(b2, VirtualTime::from_millis(2.0), &mut rng, next);
        assert!(!outcome.admitted);
        assert!(replica.get_block(b2_id).is_none());

        // B1 arrives: admitting it must pull B2 out of the orphan buffer in the same turn.
        let next = alloc.allocate(&PeerId::new("h000"));
        let outcome = replica.receive_block(b1, VirtualTime::from_millis(1.0), &mut rng, next);
        assert!(outcome.admitted);
        assert!(outcome.recovered_orphans.contains(&b1_id));
        assert!(outcome.recovered_orphans.contains(&b2_id));

        assert!(replica.get_block(b1_id).is_some());
        assert!(replica.get_block(b2_id).is_some());
        assert_eq!(replica.longest_public_leaf(), b2_id);
        assert_eq!(replica.longest_public_length(), 3);
    }

    #[test]
    fn a_block_overdrawing_its_sender_is_rejected_at_validation() {
        let mut replica = honest_replica("h000", &["h001", "h002"]);
        let mut alloc = BlockIdAllocator::new();
        let mut tx_alloc = TxIdAllocator::new();
        let sender = PeerId::new("h001");
        let miner = PeerId::new("h002");

        // Two transfers from h001 that together exceed its 100-coin balance.
        let overdraft = vec![
            Transaction::new(
                tx_alloc.allocate(&sender),
                sender.clone(),
                PeerId::new("h000"),
                Coins(60.0),
                VirtualTime::from_millis(1.0),
            ),
            Transaction::new(
                tx_alloc.allocate(&sender),
                sender.clone(),
                PeerId::new("h002"),
                Coins(60.0),
                VirtualTime::from_millis(1.0),
            ),
        ];

        let block_id = alloc.allocate(&miner);
        let block = Block::new(
            block_id,
            BlockId::Genesis,
            overdraft,
            VirtualTime::from_millis(1.0),
            miner,
            false,
        );

        let err = replica.validate_block(block).unwrap_err();
        assert!(matches!(err, sim_chain::ChainError::InsufficientBalance { .. }));
        assert!(replica.get_block(block_id).is_none());
        assert_eq!(replica.longest_public_length(), 1);
    }
}
