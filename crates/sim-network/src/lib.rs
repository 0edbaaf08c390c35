//! # Peer Overlay
//!
//! The network layer sitting between the scheduler and each peer's chain
//! replica: who is connected to whom, how long a message takes to cross
//! an edge, and which of a peer's neighbors should hear about a message
//! it just received.

pub mod error;
pub mod link;
pub mod peer;
pub mod topology;

pub use error::NetworkError;
pub use link::LinkTable;
pub use peer::{MessageId, Peer};
pub use topology::{
    build_connected_overlay, is_adversary, peer_ids, tag_slow_peers, HashPowerPlan,
};
