//! Driver-level errors: everything that can go wrong setting up or
//! exporting a run, as opposed to the in-run chain/network errors those
//! crates already define.

use crate::config::ConfigError;
use sim_network::NetworkError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("failed to write export file {path}: {source}")]
    WriteExport {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize export data: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to build the peer overlay: {0}")]
    Network(#[from] NetworkError),
}
