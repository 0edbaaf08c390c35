//! # Shared Types
//!
//! Cross-crate value types used by the scheduler, chain, and network
//! crates: peer identity, virtual time, coin amounts, and the seeded RNG
//! that keeps a run reproducible.

pub mod coins;
pub mod peer_id;
pub mod rng;
pub mod time;

pub use coins::Coins;
pub use peer_id::PeerId;
pub use rng::{exponential, SimRng};
pub use time::VirtualTime;
