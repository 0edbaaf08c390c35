//! Network-layer failures.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("could not build a connected overlay within degree bounds for {peer_count} peers after {attempts} regeneration attempts")]
    OverlayDisconnected { peer_count: usize, attempts: u32 },
}
